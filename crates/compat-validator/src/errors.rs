use fbt_rule_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompatError {
    #[error("io error: {0}")]
    Io(String),
    #[error("rule file unreadable: {0}")]
    Model(String),
    #[error("could not write {path}: {reason}")]
    FileUnwritable { path: String, reason: String },
    #[error("no compatible replacement for {product_id} -> {recommended_product_id}")]
    NoCompatibleCandidate {
        product_id: String,
        recommended_product_id: String,
    },
    #[error("fit rules invalid: {0}")]
    FitRules(String),
    #[error("proofs file invalid: {0}")]
    Proofs(String),
}

impl From<ModelError> for CompatError {
    fn from(err: ModelError) -> Self {
        CompatError::Model(err.to_string())
    }
}

impl From<std::io::Error> for CompatError {
    fn from(err: std::io::Error) -> Self {
        CompatError::Io(err.to_string())
    }
}

impl From<csv::Error> for CompatError {
    fn from(err: csv::Error) -> Self {
        CompatError::Proofs(err.to_string())
    }
}
