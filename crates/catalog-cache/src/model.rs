use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://api.bigcommerce.com";
pub const DEFAULT_PATH_PATTERN: &str = "/products/{slug}/";
pub const DEFAULT_TTL: Duration = Duration::from_secs(1800);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Display metadata for one product, keyed by storefront slug.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Builds storefront links from a base URL and a `{slug}` path pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorefrontUrls {
    base_url: Option<String>,
    path_pattern: String,
}

impl Default for StorefrontUrls {
    fn default() -> Self {
        Self::new(None, DEFAULT_PATH_PATTERN)
    }
}

impl StorefrontUrls {
    pub fn new(base_url: Option<&str>, path_pattern: &str) -> Self {
        let base_url = base_url
            .map(|base| base.trim().trim_end_matches('/').to_string())
            .filter(|base| !base.is_empty());
        let pattern = path_pattern.trim();
        Self {
            base_url,
            path_pattern: if pattern.is_empty() {
                DEFAULT_PATH_PATTERN.to_string()
            } else {
                pattern.to_string()
            },
        }
    }

    pub fn product_url(&self, slug: &str) -> String {
        let encoded = encode_slug(slug);
        let mut path = self.path_pattern.replace("{slug}", &encoded);
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        self.absolutize(&path)
    }

    /// Prefixes site-relative URLs with the base URL when one is configured.
    pub fn absolutize(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) if url.starts_with('/') => format!("{base}{url}"),
            _ => url.to_string(),
        }
    }
}

fn encode_slug(slug: &str) -> String {
    url::form_urlencoded::byte_serialize(slug.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    /// Full API prefix, e.g. `https://api.bigcommerce.com/stores/abc/v3`.
    pub api_path: Option<String>,
    pub store_hash: Option<String>,
    pub api_base: String,
    pub access_token: Option<String>,
    pub ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_path: None,
            store_hash: None,
            api_base: DEFAULT_API_BASE.to_string(),
            access_token: None,
            ttl: DEFAULT_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl CatalogConfig {
    pub fn api_base_path(&self) -> Option<String> {
        if let Some(path) = self.api_path.as_deref().filter(|p| !p.trim().is_empty()) {
            return Some(path.trim().trim_end_matches('/').to_string());
        }
        self.store_hash
            .as_deref()
            .map(str::trim)
            .filter(|hash| !hash.is_empty())
            .map(|hash| {
                format!(
                    "{}/stores/{hash}/v3",
                    self.api_base.trim().trim_end_matches('/')
                )
            })
    }

    pub fn is_configured(&self) -> bool {
        self.api_base_path().is_some()
            && self
                .access_token
                .as_deref()
                .is_some_and(|token| !token.trim().is_empty())
    }
}
