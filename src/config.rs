//! Application configuration.
//!
//! Loaded from YAML, then overridden by the environment variables the
//! storefront deployment already sets (`RECOMMENDATIONS_CSV`, `BC_*`, `PORT`).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use fbt_catalog_cache::{CatalogConfig, StorefrontUrls, DEFAULT_API_BASE, DEFAULT_PATH_PATTERN};
use fbt_change_watcher::WatchConfig;
use fbt_compat_validator::{FitRules, ValidationMode, Validator};
use fbt_resolver::ResolveOptions;
use fbt_rule_source::SourceConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_CSV_PATH: &str = "product_recommendations.csv";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rules: RulesConfig,
    pub resolver: ResolverConfig,
    pub validator: ValidatorConfig,
    pub watch: WatchSettings,
    pub catalog: CatalogSettings,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub csv_path: Option<PathBuf>,
    pub csv_url: Option<String>,
    #[serde(with = "duration_text")]
    pub refresh_interval: Duration,
    #[serde(with = "duration_text")]
    pub fetch_timeout: Duration,
}

impl Default for RulesConfig {
    fn default() -> Self {
        let defaults = fbt_rule_source::default_config();
        Self {
            csv_path: Some(PathBuf::from(DEFAULT_CSV_PATH)),
            csv_url: None,
            refresh_interval: defaults.refresh_interval,
            fetch_timeout: defaults.fetch_timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub limit: usize,
    pub category_fallback: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            limit: fbt_resolver::DEFAULT_LIMIT,
            category_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub mode: ValidationMode,
    pub proofs_path: Option<PathBuf>,
    /// YAML file replacing the built-in product type and brand tables.
    pub fit_rules_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    #[serde(with = "duration_text")]
    pub interval: Duration,
    #[serde(with = "duration_text")]
    pub settle: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            interval: fbt_change_watcher::DEFAULT_INTERVAL,
            settle: fbt_change_watcher::DEFAULT_SETTLE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub api_path: Option<String>,
    pub store_hash: Option<String>,
    pub api_base: String,
    pub access_token: Option<String>,
    #[serde(with = "duration_text")]
    pub ttl: Duration,
    #[serde(with = "duration_text")]
    pub request_timeout: Duration,
    pub storefront_base_url: Option<String>,
    pub product_path_pattern: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        let defaults = CatalogConfig::default();
        Self {
            api_path: None,
            store_hash: None,
            api_base: DEFAULT_API_BASE.to_string(),
            access_token: None,
            ttl: defaults.ttl,
            request_timeout: defaults.request_timeout,
            storefront_base_url: None,
            product_path_pattern: DEFAULT_PATH_PATTERN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse config file")
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`. Blank values count as unset; values
    /// that fail to parse are logged and ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(path) = get("RECOMMENDATIONS_CSV") {
            self.rules.csv_path = Some(PathBuf::from(path));
        }
        if let Some(url) = get("RECOMMENDATIONS_CSV_URL") {
            self.rules.csv_url = Some(url);
        }
        if let Some(secs) = get("RECOMMENDATIONS_CSV_REFRESH_SECONDS") {
            match parse_seconds(&secs) {
                Some(value) => self.rules.refresh_interval = value,
                None => warn!(value = %secs, "ignoring invalid RECOMMENDATIONS_CSV_REFRESH_SECONDS"),
            }
        }
        if let Some(secs) = get("RECOMMENDATIONS_CSV_TIMEOUT_SECONDS") {
            match parse_seconds(&secs) {
                Some(value) => self.rules.fetch_timeout = value,
                None => warn!(value = %secs, "ignoring invalid RECOMMENDATIONS_CSV_TIMEOUT_SECONDS"),
            }
        }
        if let Some(token) = get("BC_ACCESS_TOKEN") {
            self.catalog.access_token = Some(token);
        }
        if let Some(path) = get("BC_API_PATH") {
            self.catalog.api_path = Some(path);
        }
        if let Some(hash) = get("BC_STORE_HASH") {
            self.catalog.store_hash = Some(hash);
        }
        if let Some(base) = get("BC_API_BASE") {
            self.catalog.api_base = base;
        }
        if let Some(secs) = get("CATALOG_REFRESH_SECONDS") {
            match parse_seconds(&secs) {
                Some(value) => self.catalog.ttl = value,
                None => warn!(value = %secs, "ignoring invalid CATALOG_REFRESH_SECONDS"),
            }
        }
        if let Some(base) = get("STOREFRONT_BASE_URL") {
            self.catalog.storefront_base_url = Some(base);
        }
        if let Some(pattern) = get("STOREFRONT_PRODUCT_PATH_PATTERN") {
            self.catalog.product_path_pattern = pattern;
        }
        if let Some(port) = get("PORT") {
            match port.parse() {
                Ok(value) => self.server.port = value,
                Err(_) => warn!(value = %port, "ignoring invalid PORT"),
            }
        }
        debug!("environment overrides applied");
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            remote_url: self.rules.csv_url.clone(),
            local_path: self.rules.csv_path.clone(),
            refresh_interval: self.rules.refresh_interval,
            fetch_timeout: self.rules.fetch_timeout,
        }
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            limit: self.resolver.limit,
            category_fallback: self.resolver.category_fallback,
        }
    }

    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig {
            api_path: self.catalog.api_path.clone(),
            store_hash: self.catalog.store_hash.clone(),
            api_base: self.catalog.api_base.clone(),
            access_token: self.catalog.access_token.clone(),
            ttl: self.catalog.ttl,
            request_timeout: self.catalog.request_timeout,
        }
    }

    pub fn storefront(&self) -> StorefrontUrls {
        StorefrontUrls::new(
            self.catalog.storefront_base_url.as_deref(),
            &self.catalog.product_path_pattern,
        )
    }

    pub fn watch_config(&self, path: PathBuf) -> WatchConfig {
        WatchConfig {
            path,
            interval: self.watch.interval,
            settle: self.watch.settle,
        }
    }

    /// Validator over the configured fit rules, or the built-in ones.
    pub fn validator(&self) -> Result<Validator> {
        match &self.validator.fit_rules_path {
            Some(path) => {
                let rules = FitRules::load(path)
                    .with_context(|| format!("failed to load fit rules from {}", path.display()))?;
                Ok(Validator::new(rules))
            }
            None => Ok(Validator::default()),
        }
    }

    /// The configured rule file, for commands that operate on a local file.
    pub fn csv_path(&self) -> PathBuf {
        self.rules
            .csv_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CSV_PATH))
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}

fn parse_seconds(raw: &str) -> Option<Duration> {
    raw.parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Durations as humantime text (`"30s"`, `"750ms"`); bare integers are seconds.
mod duration_text {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => humantime::parse_duration(text.trim())
                .map_err(|err| D::Error::custom(format!("invalid duration {text:?}: {err}"))),
        }
    }
}
