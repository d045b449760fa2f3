use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fbt_compat_validator::{validate_file, CompatError, ValidationMode, ValidationReport, Validator};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::WatchError;
use crate::machine::{Debouncer, WatchAction};
use crate::signature::read_signature;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(750);
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct WatchConfig {
    pub path: PathBuf,
    pub interval: Duration,
    pub settle: Duration,
}

impl WatchConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interval: DEFAULT_INTERVAL,
            settle: DEFAULT_SETTLE,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.interval.max(MIN_INTERVAL)
    }
}

/// Work to run once the watched file has settled after a change.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn on_change(&self, path: &Path);
}

type ReportSink = dyn Fn(&Path, Result<ValidationReport, CompatError>) + Send + Sync;

/// Runs the compatibility validator on the file and hands the report (or the
/// reason it could not be produced) to a sink.
pub struct ValidateOnChange {
    validator: Arc<Validator>,
    mode: ValidationMode,
    proofs: Option<PathBuf>,
    sink: Box<ReportSink>,
}

impl ValidateOnChange {
    pub fn new<F>(validator: Arc<Validator>, mode: ValidationMode, sink: F) -> Self
    where
        F: Fn(&Path, Result<ValidationReport, CompatError>) + Send + Sync + 'static,
    {
        Self {
            validator,
            mode,
            proofs: None,
            sink: Box::new(sink),
        }
    }

    pub fn with_proofs(mut self, proofs: impl Into<PathBuf>) -> Self {
        self.proofs = Some(proofs.into());
        self
    }
}

#[async_trait]
impl ChangeHandler for ValidateOnChange {
    async fn on_change(&self, path: &Path) {
        let validator = Arc::clone(&self.validator);
        let mode = self.mode;
        let proofs = self.proofs.clone();
        let target = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || {
            validate_file(&target, &validator, mode, proofs.as_deref())
        })
        .await
        .unwrap_or_else(|err| Err(CompatError::Io(format!("validation task failed: {err}"))));
        (self.sink)(path, result);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub validations: usize,
    pub missing: usize,
}

pub struct ChangeWatcher<H> {
    config: WatchConfig,
    handler: H,
}

impl<H: ChangeHandler> ChangeWatcher<H> {
    pub fn new(config: WatchConfig, handler: H) -> Self {
        Self { config, handler }
    }

    /// Polls until `cancel` fires. Validates once up front when the file
    /// exists, then once per settled change.
    pub async fn run(&self, cancel: CancellationToken) -> Result<WatchStats, WatchError> {
        let path = self.config.path.as_path();
        let interval = self.config.poll_interval();
        let mut stats = WatchStats::default();
        info!(
            path = %path.display(),
            interval_ms = interval.as_millis() as u64,
            settle_ms = self.config.settle.as_millis() as u64,
            "watching rule file"
        );

        let initial = read_signature(path)?;
        if initial.is_some() {
            self.handler.on_change(path).await;
            stats.validations += 1;
        } else {
            warn!(path = %path.display(), "rule file not found yet");
        }

        let mut debouncer = Debouncer::new(initial, self.config.settle);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(interval) => {}
            }
            let current = match read_signature(path) {
                Ok(current) => current,
                Err(err) => {
                    warn!(%err, "stat failed; retrying next poll");
                    continue;
                }
            };
            match debouncer.observe(current, Instant::now()) {
                WatchAction::Wait => {}
                WatchAction::Validate => {
                    debug!("file settled; validating");
                    self.handler.on_change(path).await;
                    debouncer.finish();
                    stats.validations += 1;
                }
                WatchAction::FileMissing => {
                    warn!(path = %path.display(), "rule file disappeared after change");
                    stats.missing += 1;
                }
            }
        }
        debug!(validations = stats.validations, "watcher stopped");
        Ok(stats)
    }
}
