//! Rule file generation from the BigCommerce catalog.
//!
//! [`Generator`] is pure: a product listing and the current table in, a new
//! table out. [`sync_rules`] fetches the listing, generates, and replaces the
//! rule file.

pub mod errors;
pub mod generate;
pub mod sync;

pub use errors::SyncError;
pub use generate::{Generator, SyncOptions, DEFAULT_PER_PRODUCT};
pub use sync::{sync_rules, SyncOutcome, SyncReport};

#[cfg(test)]
mod tests;
