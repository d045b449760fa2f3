use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::Utc;
use fbt_rule_model::RuleTable;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::RefreshError;
use crate::loader::{load_cycle, RemoteFetcher};
use crate::model::{HealthState, HealthView, SourceConfig};

#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Latest successfully loaded snapshot. Never waits on I/O.
    fn current(&self) -> Arc<RuleTable>;
    /// Runs one load cycle now and publishes the result on success.
    async fn refresh_now(&self) -> Result<Arc<RuleTable>, RefreshError>;
    fn health(&self) -> HealthView;
    fn subscribe(&self) -> watch::Receiver<Arc<RuleTable>>;
}

/// Owns the live rule table and swaps it wholesale on every successful load.
///
/// All load cycles, timer-driven or manual, pass through `refresh_gate`, so at
/// most one is in flight at any time.
pub struct RuleSourceManager {
    config: SourceConfig,
    fetcher: Arc<dyn RemoteFetcher>,
    live: ArcSwap<RuleTable>,
    health: SyncMutex<HealthState>,
    refresh_gate: Mutex<()>,
    watch_tx: watch::Sender<Arc<RuleTable>>,
}

impl RuleSourceManager {
    pub fn new(config: SourceConfig, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        let initial = Arc::new(RuleTable::empty());
        let (watch_tx, _watch_rx) = watch::channel(Arc::clone(&initial));
        Self {
            config,
            fetcher,
            live: ArcSwap::new(initial),
            health: SyncMutex::new(HealthState::default()),
            refresh_gate: Mutex::new(()),
            watch_tx,
        }
    }

    /// Builds the manager and runs the first load cycle. A failed first load
    /// is logged and recorded; the manager then serves an empty snapshot.
    pub async fn bootstrap(config: SourceConfig, fetcher: Arc<dyn RemoteFetcher>) -> Arc<Self> {
        let manager = Arc::new(Self::new(config, fetcher));
        if let Err(err) = manager.refresh_now().await {
            warn!(%err, "initial rule load failed; serving empty rule table");
        }
        manager
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Timer entry point: runs a cycle unless one is already in flight.
    /// Returns `None` when the cycle was skipped.
    pub async fn refresh_if_idle(&self) -> Option<Result<Arc<RuleTable>, RefreshError>> {
        let Ok(_flight) = self.refresh_gate.try_lock() else {
            debug!("rule refresh already in flight; skipping tick");
            return None;
        };
        Some(self.run_cycle().await)
    }

    /// Spawns the recurring refresh timer. The first tick fires one full
    /// interval after spawn; the loop ends when `cancel` fires or the manager
    /// is dropped.
    pub fn spawn_refresh_loop(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let period = self.config.refresh_interval.max(std::time::Duration::from_secs(1));
        info!(interval_secs = period.as_secs(), "rule refresh timer started");
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                let _ = manager.refresh_if_idle().await;
            }
            debug!("rule refresh timer stopped");
        })
    }

    async fn run_cycle(&self) -> Result<Arc<RuleTable>, RefreshError> {
        let attempt_at = Utc::now();
        let outcome = load_cycle(&self.config, self.fetcher.as_ref()).await;
        let mut health = self.health.lock();
        health.last_attempt_at = Some(attempt_at);
        health.refreshes = health.refreshes.saturating_add(1);
        match outcome {
            Ok(table) => {
                let table = Arc::new(table);
                health.last_error = None;
                drop(health);
                self.live.store(Arc::clone(&table));
                let _ = self.watch_tx.send(Arc::clone(&table));
                info!(
                    source = %table.source(),
                    rows = table.len(),
                    products = table.product_count(),
                    warnings = table.warnings().len(),
                    "rule table refreshed"
                );
                Ok(table)
            }
            Err(err) => {
                health.failures = health.failures.saturating_add(1);
                health.last_error = Some(err.to_string());
                drop(health);
                warn!(%err, "rule refresh failed; keeping previous snapshot");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl RuleSource for RuleSourceManager {
    fn current(&self) -> Arc<RuleTable> {
        self.live.load_full()
    }

    async fn refresh_now(&self) -> Result<Arc<RuleTable>, RefreshError> {
        let _flight = self.refresh_gate.lock().await;
        self.run_cycle().await
    }

    fn health(&self) -> HealthView {
        let table = self.live.load();
        let health = self.health.lock().clone();
        HealthView {
            source: table.source(),
            last_success_at: table.loaded_at(),
            last_attempt_at: health.last_attempt_at,
            last_error: health.last_error,
            remote_url: self.config.remote_url.clone(),
            local_path: self
                .config
                .local_path
                .as_ref()
                .map(|path| path.display().to_string()),
            refresh_interval_secs: self.config.refresh_interval.as_secs(),
            rows: table.len(),
            products: table.product_count(),
            row_warnings: table.warnings().len(),
            refreshes: health.refreshes,
            failures: health.failures,
        }
    }

    fn subscribe(&self) -> watch::Receiver<Arc<RuleTable>> {
        self.watch_tx.subscribe()
    }
}
