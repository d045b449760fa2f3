use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use fbt_rule_model::RuleTable;
use fbt_rule_source::{load_cycle, HttpFetcher, SourceConfig};

use crate::cli::output::OutputFormat;
use crate::config::AppConfig;

pub struct CliContext {
    config: AppConfig,
    config_path: PathBuf,
    output: OutputFormat,
}

impl CliContext {
    pub fn new(config: AppConfig, config_path: PathBuf, output: OutputFormat) -> Self {
        Self {
            config,
            config_path,
            output,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    /// Source settings with an optional `--csv` taking the place of both the
    /// configured URL and path.
    pub fn source_config(&self, csv: Option<&Path>) -> SourceConfig {
        let mut source = self.config.source_config();
        if let Some(path) = csv {
            source.local_path = Some(path.to_path_buf());
            source.remote_url = None;
        }
        source
    }

    /// The rule file that file-based commands read and write.
    pub fn csv_path(&self, csv: Option<&Path>) -> PathBuf {
        csv.map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.csv_path())
    }

    pub fn proofs_path(&self, proofs: Option<&Path>) -> Option<PathBuf> {
        proofs
            .map(Path::to_path_buf)
            .or_else(|| self.config.validator.proofs_path.clone())
    }

    pub fn http_fetcher(&self) -> Result<Arc<HttpFetcher>> {
        let fetcher = HttpFetcher::new(self.config.rules.fetch_timeout)
            .context("failed to build HTTP client")?;
        Ok(Arc::new(fetcher))
    }

    /// Runs a single load cycle without starting a refresh timer.
    pub async fn load_rules(&self, csv: Option<&Path>) -> Result<RuleTable> {
        let source = self.source_config(csv);
        let fetcher = self.http_fetcher()?;
        load_cycle(&source, fetcher.as_ref())
            .await
            .context("failed to load recommendation rules")
    }
}
