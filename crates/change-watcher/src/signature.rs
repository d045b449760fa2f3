use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

use crate::errors::WatchError;

/// What the watcher compares between polls: size plus modification time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileSignature {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// `Ok(None)` when the file does not exist.
pub fn read_signature(path: &Path) -> Result<Option<FileSignature>, WatchError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(FileSignature {
            len: meta.len(),
            modified: meta.modified().ok(),
        })),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(WatchError::Stat {
            path: path.display().to_string(),
            reason: err.to_string(),
        }),
    }
}
