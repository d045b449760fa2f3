use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("cannot stat {path}: {reason}")]
    Stat { path: String, reason: String },
}
