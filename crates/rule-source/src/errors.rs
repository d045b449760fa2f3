use fbt_rule_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no remote url or local path configured")]
    NotConfigured,
    #[error("source unreachable: {0}")]
    SourceUnreachable(String),
    #[error("source malformed: {0}")]
    SourceMalformed(String),
    #[error("remote failed ({remote}); local fallback failed ({local})")]
    AllSourcesFailed { remote: String, local: String },
}

impl From<ModelError> for RefreshError {
    fn from(value: ModelError) -> Self {
        RefreshError::SourceMalformed(value.to_string())
    }
}
