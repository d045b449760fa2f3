use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fbt_rule_model::SourceTag;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceConfig {
    pub remote_url: Option<String>,
    pub local_path: Option<PathBuf>,
    pub refresh_interval: Duration,
    pub fetch_timeout: Duration,
}

impl SourceConfig {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: Some(path.into()),
            ..crate::defaults::default_config()
        }
    }

    pub fn with_remote(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.remote_url = if url.trim().is_empty() {
            None
        } else {
            Some(url.trim().to_string())
        };
        self
    }

    pub fn has_remote(&self) -> bool {
        self.remote_url.is_some()
    }
}

/// Mutable bookkeeping kept beside the published snapshot.
#[derive(Clone, Debug, Default)]
pub(crate) struct HealthState {
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub refreshes: u64,
    pub failures: u64,
}

/// Read-only diagnostics for the rule source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthView {
    pub source: SourceTag,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub remote_url: Option<String>,
    pub local_path: Option<String>,
    pub refresh_interval_secs: u64,
    pub rows: usize,
    pub products: usize,
    pub row_warnings: usize,
    pub refreshes: u64,
    pub failures: u64,
}
