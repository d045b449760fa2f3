use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::model::{CatalogItem, StorefrontUrls};
use crate::source::CatalogSource;

type ItemMap = Arc<HashMap<String, CatalogItem>>;

struct CacheState {
    items: ItemMap,
    fetched_at: Option<Instant>,
    fetched_at_utc: Option<DateTime<Utc>>,
    source: &'static str,
    last_error: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CatalogStatus {
    pub source: &'static str,
    pub items: usize,
    pub last_fetch: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Slug-keyed product metadata with a TTL. A failed or empty fetch never
/// replaces a map that has entries.
pub struct CatalogCache {
    source: Option<Arc<dyn CatalogSource>>,
    ttl: Duration,
    storefront: StorefrontUrls,
    state: RwLock<CacheState>,
    refresh_gate: Mutex<()>,
}

impl CatalogCache {
    pub fn new(
        source: Option<Arc<dyn CatalogSource>>,
        ttl: Duration,
        storefront: StorefrontUrls,
    ) -> Self {
        Self {
            source,
            ttl,
            storefront,
            state: RwLock::new(CacheState {
                items: Arc::new(HashMap::new()),
                fetched_at: None,
                fetched_at_utc: None,
                source: "none",
                last_error: None,
            }),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Cache without an upstream; every lookup synthesises an entry.
    pub fn offline(storefront: StorefrontUrls) -> Self {
        Self::new(None, Duration::MAX, storefront)
    }

    pub fn storefront(&self) -> &StorefrontUrls {
        &self.storefront
    }

    fn fresh_items(&self) -> Option<ItemMap> {
        let state = self.state.read();
        let fresh = state
            .fetched_at
            .is_some_and(|at| at.elapsed() < self.ttl);
        (fresh && !state.items.is_empty()).then(|| Arc::clone(&state.items))
    }

    /// Current map, refreshing first when it is empty or older than the TTL
    /// (or always, with `force`). Concurrent callers share one fetch.
    pub async fn items(&self, force: bool) -> ItemMap {
        if !force {
            if let Some(items) = self.fresh_items() {
                return items;
            }
        }
        let Some(source) = self.source.as_ref() else {
            return Arc::clone(&self.state.read().items);
        };

        let _flight = self.refresh_gate.lock().await;
        if !force {
            if let Some(items) = self.fresh_items() {
                return items;
            }
        }

        match source.fetch_all().await {
            Ok(fetched) if fetched.is_empty() => {
                debug!(source = source.name(), "catalog fetch returned no products; keeping cache");
            }
            Ok(fetched) => {
                let count = fetched.len();
                let mut state = self.state.write();
                state.items = Arc::new(fetched);
                state.fetched_at = Some(Instant::now());
                state.fetched_at_utc = Some(Utc::now());
                state.source = source.name();
                state.last_error = None;
                info!(source = source.name(), products = count, "catalog refreshed");
            }
            Err(err) => {
                warn!(%err, "catalog refresh failed; serving cached entries");
                self.state.write().last_error = Some(err.to_string());
            }
        }
        Arc::clone(&self.state.read().items)
    }

    /// Metadata for each id. Unknown ids get `{name: id, url: storefront}`;
    /// site-relative URLs are made absolute when a base URL is set.
    pub async fn get_many<S: AsRef<str>>(&self, ids: &[S]) -> BTreeMap<String, CatalogItem> {
        let items = self.items(false).await;
        ids.iter()
            .map(|id| id.as_ref().trim())
            .filter(|id| !id.is_empty())
            .map(|id| {
                let mut item = items.get(id).cloned().unwrap_or_else(|| CatalogItem {
                    name: id.to_string(),
                    ..CatalogItem::default()
                });
                item.url = if item.url.is_empty() {
                    self.storefront.product_url(id)
                } else {
                    self.storefront.absolutize(&item.url)
                };
                (id.to_string(), item)
            })
            .collect()
    }

    pub fn status(&self) -> CatalogStatus {
        let state = self.state.read();
        CatalogStatus {
            source: state.source,
            items: state.items.len(),
            last_fetch: state.fetched_at_utc,
            last_error: state.last_error.clone(),
        }
    }
}
