use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fbt_rule_model::{parse_rules, RuleTable, SourceTag};
use tokio::fs;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::errors::RefreshError;
use crate::model::SourceConfig;

/// Fetches the raw CSV body behind a URL. Any non-2xx answer is an error.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, RefreshError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self, RefreshError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| RefreshError::SourceUnreachable(format!("http client: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, RefreshError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| RefreshError::SourceUnreachable(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::SourceUnreachable(format!(
                "GET {url} returned HTTP {}",
                status.as_u16()
            )));
        }
        response
            .text()
            .await
            .map_err(|err| RefreshError::SourceUnreachable(err.to_string()))
    }
}

/// Runs one load cycle: remote first when configured, then the local file.
///
/// The returned table is fully parsed and has at least one row; nothing is
/// published here.
pub async fn load_cycle(
    config: &SourceConfig,
    fetcher: &dyn RemoteFetcher,
) -> Result<RuleTable, RefreshError> {
    let mut remote_error = None;
    if let Some(url) = config.remote_url.as_deref() {
        match load_remote(url, config.fetch_timeout, fetcher).await {
            Ok(table) => return Ok(table),
            Err(err) => {
                warn!(url, %err, "remote rule source failed; trying local file");
                remote_error = Some(err);
            }
        }
    }

    let Some(path) = config.local_path.as_deref() else {
        return Err(remote_error.unwrap_or(RefreshError::NotConfigured));
    };
    let tag = if remote_error.is_some() {
        SourceTag::LocalFallback
    } else {
        SourceTag::Local
    };

    match load_local(path, tag).await {
        Ok(table) => Ok(table),
        Err(local_err) => Err(match remote_error {
            Some(remote_err) => RefreshError::AllSourcesFailed {
                remote: remote_err.to_string(),
                local: local_err.to_string(),
            },
            None => local_err,
        }),
    }
}

async fn load_remote(
    url: &str,
    fetch_timeout: Duration,
    fetcher: &dyn RemoteFetcher,
) -> Result<RuleTable, RefreshError> {
    let body = timeout(fetch_timeout, fetcher.fetch(url))
        .await
        .map_err(|_| {
            RefreshError::SourceUnreachable(format!(
                "GET {url} timed out after {}ms",
                fetch_timeout.as_millis()
            ))
        })??;
    table_from_payload(&body, SourceTag::Remote)
}

async fn load_local(path: &Path, tag: SourceTag) -> Result<RuleTable, RefreshError> {
    let content = fs::read_to_string(path).await.map_err(|err| {
        RefreshError::SourceUnreachable(format!("{}: {}", path.display(), err))
    })?;
    table_from_payload(&content, tag)
}

/// Parses a payload and refuses tables without a single valid row, so a
/// truncated upstream file cannot wipe the live recommendations.
pub fn table_from_payload(payload: &str, tag: SourceTag) -> Result<RuleTable, RefreshError> {
    let parsed = parse_rules(payload)?;
    let rejected = parsed.rejected();
    if parsed.rows.is_empty() {
        return Err(RefreshError::SourceMalformed(format!(
            "no valid rule rows ({rejected} rejected)"
        )));
    }
    if rejected > 0 {
        warn!(rejected, source = %tag, "rule rows rejected during load");
    }
    for warning in &parsed.warnings {
        debug!(source = %tag, "{warning}");
    }
    Ok(parsed.into_table().tagged(tag, Utc::now()))
}
