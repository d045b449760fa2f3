use fbt_catalog_cache::CatalogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("catalog listing has no in-stock products; rule file left unchanged")]
    EmptyCatalog,
    #[error("existing rule file {path} is unreadable: {reason}")]
    Existing { path: String, reason: String },
    #[error("cannot write {path}: {reason}")]
    Unwritable { path: String, reason: String },
}
