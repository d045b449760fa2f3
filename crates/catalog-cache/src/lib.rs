pub mod cache;
pub mod errors;
pub mod listing;
pub mod model;
pub mod source;

pub use cache::{CatalogCache, CatalogStatus};
pub use errors::CatalogError;
pub use listing::{ListingProduct, ListingSource};
pub use model::{
    CatalogConfig, CatalogItem, StorefrontUrls, DEFAULT_API_BASE, DEFAULT_PATH_PATTERN,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_TTL,
};
pub use source::{BigCommerceCatalog, CatalogSource};

#[cfg(test)]
mod tests;
