use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::errors::CatalogError;
use crate::listing::{build_listing, CategoryRecord, ListingProduct, ListingRecord, ListingSource};
use crate::model::{CatalogConfig, CatalogItem};

const PAGE_LIMIT: u32 = 250;
const LISTING_FIELDS: &str =
    "id,name,price,brand_id,categories,custom_url,is_visible,availability,inventory_level,inventory_tracking";

#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn name(&self) -> &'static str;
    /// Every visible product, keyed by slug.
    async fn fetch_all(&self) -> Result<HashMap<String, CatalogItem>, CatalogError>;
}

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Default, Deserialize)]
struct PageMeta {
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Product {
    id: Option<u64>,
    name: Option<String>,
    price: Option<f64>,
    custom_url: Option<CustomUrl>,
    primary_image: Option<PrimaryImage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CustomUrl {
    pub(crate) url: Option<String>,
}

impl CustomUrl {
    /// Storefront slug: the custom URL without surrounding slashes.
    pub(crate) fn slug(custom: Option<&CustomUrl>) -> String {
        custom
            .and_then(|custom| custom.url.as_deref())
            .unwrap_or_default()
            .trim()
            .trim_matches('/')
            .to_string()
    }
}

#[derive(Debug, Deserialize)]
struct PrimaryImage {
    url_standard: Option<String>,
}

impl Product {
    fn into_entry(self) -> Option<(String, CatalogItem)> {
        let slug = CustomUrl::slug(self.custom_url.as_ref());
        if slug.is_empty() {
            return None;
        }
        let url = self.custom_url.and_then(|custom| custom.url).unwrap_or_default();
        let item = CatalogItem {
            id: self.id,
            name: self
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| slug.clone()),
            url,
            price: self.price,
            image: self
                .primary_image
                .and_then(|image| image.url_standard)
                .filter(|image| !image.is_empty()),
        };
        Some((slug, item))
    }
}

/// Client for the BigCommerce management API (`/catalog/...`).
pub struct BigCommerceCatalog {
    client: reqwest::Client,
    base_path: String,
}

impl BigCommerceCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let (Some(base_path), Some(token)) = (config.api_base_path(), config.access_token.as_deref())
        else {
            return Err(CatalogError::NotConfigured);
        };
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(token.trim())
            .map_err(|err| CatalogError::Http(format!("invalid access token: {err}")))?;
        headers.insert("X-Auth-Token", token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, base_path })
    }

    /// Follows `meta.pagination.total_pages` and concatenates every page.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>, CatalogError> {
        let endpoint = format!("{}{path}", self.base_path);
        let mut out = Vec::new();
        let mut page: u32 = 1;
        loop {
            let mut query: Vec<(&str, String)> = params
                .iter()
                .map(|(key, value)| (*key, value.to_string()))
                .collect();
            query.push(("page", page.to_string()));
            query.push(("limit", PAGE_LIMIT.to_string()));
            let response = self
                .client
                .get(&endpoint)
                .query(&query)
                .send()
                .await?
                .error_for_status()?;
            let (rows, total) = parse_page_of::<T>(&response.text().await?)?;
            debug!(path, page, rows = rows.len(), "catalog page fetched");
            out.extend(rows);

            if page >= total.unwrap_or(page) {
                break;
            }
            page += 1;
        }
        Ok(out)
    }
}

#[async_trait]
impl CatalogSource for BigCommerceCatalog {
    fn name(&self) -> &'static str {
        "bigcommerce"
    }

    async fn fetch_all(&self) -> Result<HashMap<String, CatalogItem>, CatalogError> {
        let products: Vec<Product> = self
            .get_all(
                "/catalog/products",
                &[("include", "primary_image"), ("is_visible", "true")],
            )
            .await?;
        Ok(products.into_iter().filter_map(Product::into_entry).collect())
    }
}

#[async_trait]
impl ListingSource for BigCommerceCatalog {
    async fn fetch_listing(&self) -> Result<Vec<ListingProduct>, CatalogError> {
        let categories: Vec<CategoryRecord> = self
            .get_all("/catalog/categories", &[("include_fields", "id,name")])
            .await?;
        let products: Vec<ListingRecord> = self
            .get_all(
                "/catalog/products",
                &[("is_visible", "true"), ("include_fields", LISTING_FIELDS)],
            )
            .await?;
        Ok(build_listing(products, &categories))
    }
}

pub(crate) fn parse_page_of<T: DeserializeOwned>(
    json: &str,
) -> Result<(Vec<T>, Option<u32>), CatalogError> {
    let page: Page<T> =
        serde_json::from_str(json).map_err(|err| CatalogError::Decode(err.to_string()))?;
    Ok((page.data, page.meta.pagination.total_pages))
}

/// Slug-keyed entries of one products page plus the reported page count.
/// Products without a custom URL are skipped.
pub(crate) fn parse_page(json: &str) -> Result<(Vec<(String, CatalogItem)>, Option<u32>), CatalogError> {
    let (products, total) = parse_page_of::<Product>(json)?;
    Ok((
        products.into_iter().filter_map(Product::into_entry).collect(),
        total,
    ))
}
