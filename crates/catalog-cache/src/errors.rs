use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog API credentials not configured")]
    NotConfigured,
    #[error("catalog request failed: {0}")]
    Http(String),
    #[error("catalog response not understood: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CatalogError::Decode(err.to_string())
        } else {
            CatalogError::Http(err.to_string())
        }
    }
}
