use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("missing required columns: {0}")]
    MissingColumns(String),
    #[error("csv error: {0}")]
    Csv(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<csv::Error> for ModelError {
    fn from(value: csv::Error) -> Self {
        ModelError::Csv(value.to_string())
    }
}

impl From<std::io::Error> for ModelError {
    fn from(value: std::io::Error) -> Self {
        ModelError::Io(value.to_string())
    }
}
