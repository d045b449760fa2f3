use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cache::CatalogCache;
use crate::errors::CatalogError;
use crate::model::{CatalogConfig, CatalogItem, StorefrontUrls};
use crate::listing::{build_listing, CategoryRecord, ListingRecord};
use crate::source::{parse_page, parse_page_of, CatalogSource};

struct StubCatalog {
    answer: Mutex<Result<HashMap<String, CatalogItem>, CatalogError>>,
    calls: AtomicUsize,
}

impl StubCatalog {
    fn new(answer: Result<HashMap<String, CatalogItem>, CatalogError>) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(answer),
            calls: AtomicUsize::new(0),
        })
    }

    fn set(&self, answer: Result<HashMap<String, CatalogItem>, CatalogError>) {
        *self.answer.lock() = answer;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for StubCatalog {
    fn name(&self) -> &'static str {
        "bigcommerce"
    }

    async fn fetch_all(&self) -> Result<HashMap<String, CatalogItem>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.lock().clone()
    }
}

fn products(entries: &[(&str, &str, &str)]) -> HashMap<String, CatalogItem> {
    entries
        .iter()
        .map(|(slug, name, url)| {
            (
                slug.to_string(),
                CatalogItem {
                    id: Some(1),
                    name: name.to_string(),
                    url: url.to_string(),
                    price: Some(49.99),
                    image: None,
                },
            )
        })
        .collect()
}

fn storefront() -> StorefrontUrls {
    StorefrontUrls::new(Some("https://shop.example.com/"), "/products/{slug}/")
}

fn cache_over(stub: &Arc<StubCatalog>, ttl: Duration) -> CatalogCache {
    let source: Arc<dyn CatalogSource> = stub.clone();
    CatalogCache::new(Some(source), ttl, storefront())
}

#[tokio::test(start_paused = true)]
async fn fresh_map_is_served_without_refetch() {
    let stub = StubCatalog::new(Ok(products(&[("visor-x", "Visor X", "/visor-x/")])));
    let cache = cache_over(&stub, Duration::from_secs(60));

    assert_eq!(cache.items(false).await.len(), 1);
    assert_eq!(cache.items(false).await.len(), 1);
    assert_eq!(stub.calls(), 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    cache.items(false).await;
    assert_eq!(stub.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn force_refetches_inside_ttl() {
    let stub = StubCatalog::new(Ok(products(&[("visor-x", "Visor X", "/visor-x/")])));
    let cache = cache_over(&stub, Duration::from_secs(60));
    cache.items(false).await;
    cache.items(true).await;
    assert_eq!(stub.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_previous_entries() {
    let stub = StubCatalog::new(Ok(products(&[("visor-x", "Visor X", "/visor-x/")])));
    let cache = cache_over(&stub, Duration::from_secs(60));
    cache.items(false).await;

    stub.set(Err(CatalogError::Http("HTTP 503".into())));
    tokio::time::advance(Duration::from_secs(120)).await;
    let items = cache.items(false).await;

    assert_eq!(items.get("visor-x").map(|item| item.name.as_str()), Some("Visor X"));
    let status = cache.status();
    assert_eq!(status.source, "bigcommerce");
    assert_eq!(status.items, 1);
    assert!(status
        .last_error
        .as_deref()
        .is_some_and(|err| err.contains("HTTP 503")));
}

#[tokio::test(start_paused = true)]
async fn empty_fetch_does_not_wipe_cache() {
    let stub = StubCatalog::new(Ok(products(&[("visor-x", "Visor X", "/visor-x/")])));
    let cache = cache_over(&stub, Duration::from_secs(60));
    cache.items(false).await;

    stub.set(Ok(HashMap::new()));
    let items = cache.items(true).await;
    assert_eq!(items.len(), 1);
    assert_eq!(cache.status().last_error, None);
}

#[tokio::test(start_paused = true)]
async fn successful_refresh_clears_last_error() {
    let stub = StubCatalog::new(Err(CatalogError::Http("timeout".into())));
    let cache = cache_over(&stub, Duration::from_secs(60));
    assert!(cache.items(false).await.is_empty());
    assert_eq!(cache.status().source, "none");
    assert!(cache.status().last_error.is_some());

    stub.set(Ok(products(&[("visor-x", "Visor X", "/visor-x/")])));
    cache.items(false).await;
    let status = cache.status();
    assert_eq!(status.last_error, None);
    assert!(status.last_fetch.is_some());
}

#[tokio::test]
async fn get_many_synthesises_unknown_ids() {
    let stub = StubCatalog::new(Ok(products(&[
        ("visor-x", "Visor X", "/visor-x/"),
        ("pinlock-y", "Pinlock Y", "https://cdn.example.com/pinlock-y"),
        ("no-url", "No Url", ""),
    ])));
    let cache = cache_over(&stub, Duration::from_secs(60));

    let items = cache
        .get_many(&["visor-x", "pinlock-y", "no-url", "mystery part", " "])
        .await;

    assert_eq!(items.len(), 4);
    assert_eq!(items["visor-x"].url, "https://shop.example.com/visor-x/");
    assert_eq!(items["pinlock-y"].url, "https://cdn.example.com/pinlock-y");
    assert_eq!(items["no-url"].url, "https://shop.example.com/products/no-url/");
    let unknown = &items["mystery part"];
    assert_eq!(unknown.name, "mystery part");
    assert_eq!(unknown.id, None);
    assert_eq!(unknown.url, "https://shop.example.com/products/mystery%20part/");
}

#[tokio::test]
async fn offline_cache_never_fetches() {
    let cache = CatalogCache::offline(StorefrontUrls::default());
    let items = cache.get_many(&["helmet-001"]).await;
    assert_eq!(items["helmet-001"].name, "helmet-001");
    assert_eq!(items["helmet-001"].url, "/products/helmet-001/");
    assert_eq!(cache.status().source, "none");
}

#[test]
fn storefront_pattern_gets_leading_slash() {
    let urls = StorefrontUrls::new(Some("https://shop.example.com"), "p/{slug}");
    assert_eq!(urls.product_url("a/b"), "https://shop.example.com/p/a%2Fb");
    assert_eq!(urls.absolutize("relative"), "relative");
}

#[test]
fn api_base_path_prefers_explicit_path() {
    let mut config = CatalogConfig {
        store_hash: Some("abc123".into()),
        access_token: Some("token".into()),
        ..CatalogConfig::default()
    };
    assert_eq!(
        config.api_base_path().as_deref(),
        Some("https://api.bigcommerce.com/stores/abc123/v3")
    );
    assert!(config.is_configured());

    config.api_path = Some("https://proxy.local/v3/".into());
    assert_eq!(config.api_base_path().as_deref(), Some("https://proxy.local/v3"));

    config.access_token = Some("  ".into());
    assert!(!config.is_configured());
}

#[test]
fn parse_page_maps_products_by_slug() {
    let json = r#"{
        "data": [
            {"id": 11, "name": "Shoei CWR-1 Shield", "price": 59.0,
             "custom_url": {"url": "/shoei-cwr-1-shield/"},
             "primary_image": {"url_standard": "https://cdn.example.com/cwr1.jpg"}},
            {"id": 12, "name": "", "custom_url": {"url": "/bare-item/"}},
            {"id": 13, "name": "No Url"}
        ],
        "meta": {"pagination": {"total_pages": 3}}
    }"#;
    let (entries, total) = parse_page(json).expect("page");
    assert_eq!(total, Some(3));
    let map: HashMap<_, _> = entries.into_iter().collect();
    assert_eq!(map.len(), 2);
    let shield = &map["shoei-cwr-1-shield"];
    assert_eq!(shield.id, Some(11));
    assert_eq!(shield.url, "/shoei-cwr-1-shield/");
    assert_eq!(shield.image.as_deref(), Some("https://cdn.example.com/cwr1.jpg"));
    assert_eq!(map["bare-item"].name, "bare-item");
}

#[test]
fn parse_page_rejects_garbage() {
    assert!(matches!(parse_page("<html>"), Err(CatalogError::Decode(_))));
}

const LISTING_PAGE: &str = r#"{
    "data": [
        {"id": 1, "name": "Shoei RF-1400", "price": 629.99, "brand_id": 7,
         "categories": [20, 21], "custom_url": {"url": "/shoei-rf-1400-helmet/"},
         "is_visible": true, "availability": "available",
         "inventory_tracking": "product", "inventory_level": 4},
        {"id": 2, "name": "Sold Out Shield", "price": 59.0, "brand_id": 7,
         "custom_url": {"url": "/shoei-cwr-1-shield/"},
         "inventory_tracking": "product", "inventory_level": 0},
        {"id": 3, "name": "Preorder Visor", "price": 79.0, "brand_id": 0,
         "categories": [21], "custom_url": {"url": "/pinlock-120-insert/"},
         "availability": "preorder", "inventory_tracking": "none", "inventory_level": 0},
        {"id": 4, "name": "Disabled", "custom_url": {"url": "/gone/"}, "availability": "disabled"},
        {"id": 5, "name": "Hidden", "custom_url": {"url": "/hidden/"}, "is_visible": false},
        {"id": 6, "name": "No Slug", "price": 10.0}
    ],
    "meta": {"pagination": {"total_pages": 1}}
}"#;

#[test]
fn listing_keeps_only_sellable_products() {
    let (records, total) = parse_page_of::<ListingRecord>(LISTING_PAGE).expect("page");
    assert_eq!(total, Some(1));
    assert_eq!(records.len(), 6);
    let categories = vec![
        CategoryRecord {
            id: 20,
            name: "Helmets".into(),
        },
        CategoryRecord {
            id: 21,
            name: "Full Face".into(),
        },
    ];

    let listing = build_listing(records, &categories);
    let slugs: Vec<&str> = listing.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(slugs, vec!["shoei-rf-1400-helmet", "pinlock-120-insert"]);

    let helmet = &listing[0];
    assert_eq!(helmet.brand_id, Some(7));
    assert_eq!(helmet.category_names, vec!["Helmets", "Full Face"]);
    assert_eq!(helmet.price, 629.99);
    assert_eq!(listing[1].brand_id, None);
}
