use std::sync::Arc;

use fbt_catalog_cache::CatalogCache;
use fbt_resolver::ResolveOptions;
use fbt_rule_source::RuleSource;

/// Shared handles behind every route. Cloned per request.
#[derive(Clone)]
pub struct ServeState {
    pub(crate) rules: Arc<dyn RuleSource>,
    pub(crate) catalog: Arc<CatalogCache>,
    pub(crate) options: ResolveOptions,
}

impl ServeState {
    pub fn new(
        rules: Arc<dyn RuleSource>,
        catalog: Arc<CatalogCache>,
        options: ResolveOptions,
    ) -> Self {
        Self {
            rules,
            catalog,
            options,
        }
    }
}
