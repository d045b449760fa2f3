pub mod api;
pub mod defaults;
pub mod errors;
pub mod loader;
pub mod model;

pub use api::{RuleSource, RuleSourceManager};
pub use defaults::default_config;
pub use errors::RefreshError;
pub use loader::{load_cycle, HttpFetcher, RemoteFetcher};
pub use model::{HealthView, SourceConfig};
