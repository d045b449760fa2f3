//! Polls the rule file and re-runs validation once edits settle.

pub mod errors;
pub mod machine;
pub mod signature;
pub mod watcher;

pub use errors::WatchError;
pub use machine::{Debouncer, WatchAction, WatchState};
pub use signature::{read_signature, FileSignature};
pub use watcher::{
    ChangeHandler, ChangeWatcher, ValidateOnChange, WatchConfig, WatchStats, DEFAULT_INTERVAL,
    DEFAULT_SETTLE, MIN_INTERVAL,
};

#[cfg(test)]
mod tests;
