use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use fbt_compat_validator::{ValidationMode, Validator};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::machine::{Debouncer, WatchAction, WatchState};
use crate::signature::{read_signature, FileSignature};
use crate::watcher::{ChangeHandler, ChangeWatcher, ValidateOnChange, WatchConfig};

const SETTLE: Duration = Duration::from_millis(750);

fn sig(len: u64) -> Option<FileSignature> {
    Some(FileSignature {
        len,
        modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(len)),
    })
}

#[test]
fn unchanged_file_stays_idle() {
    let start = Instant::now();
    let mut debouncer = Debouncer::new(sig(1), SETTLE);
    for step in 1..5 {
        let now = start + Duration::from_secs(step);
        assert_eq!(debouncer.observe(sig(1), now), WatchAction::Wait);
        assert_eq!(debouncer.state(), WatchState::Idle);
    }
}

#[test]
fn change_validates_after_settle_window() {
    let start = Instant::now();
    let mut debouncer = Debouncer::new(sig(1), SETTLE);
    assert_eq!(debouncer.observe(sig(2), start), WatchAction::Wait);
    assert_eq!(debouncer.state(), WatchState::PendingSettle { since: start });

    let early = start + Duration::from_millis(500);
    assert_eq!(debouncer.observe(sig(2), early), WatchAction::Wait);

    let settled = start + SETTLE;
    assert_eq!(debouncer.observe(sig(2), settled), WatchAction::Validate);
    assert_eq!(debouncer.state(), WatchState::Validating);

    debouncer.finish();
    assert_eq!(debouncer.state(), WatchState::Idle);
}

#[test]
fn rapid_saves_coalesce_into_one_run() {
    let start = Instant::now();
    let mut debouncer = Debouncer::new(sig(1), SETTLE);
    let mut validations = 0;
    for (offset_ms, len) in [(0, 2), (300, 3), (600, 4), (900, 5)] {
        let now = start + Duration::from_millis(offset_ms);
        if debouncer.observe(sig(len), now) == WatchAction::Validate {
            validations += 1;
        }
    }
    assert_eq!(validations, 0);
    assert_eq!(
        debouncer.state(),
        WatchState::PendingSettle {
            since: start + Duration::from_millis(900)
        }
    );

    let later = start + Duration::from_millis(900) + SETTLE;
    assert_eq!(debouncer.observe(sig(5), later), WatchAction::Validate);
}

#[test]
fn polls_during_validation_are_ignored() {
    let start = Instant::now();
    let mut debouncer = Debouncer::new(sig(1), Duration::ZERO);
    assert_eq!(debouncer.observe(sig(2), start), WatchAction::Validate);
    assert_eq!(debouncer.observe(sig(3), start), WatchAction::Wait);
    assert_eq!(debouncer.state(), WatchState::Validating);

    debouncer.finish();
    assert_eq!(debouncer.observe(sig(3), start), WatchAction::Validate);
}

#[test]
fn deleted_file_reports_missing_instead_of_validating() {
    let start = Instant::now();
    let mut debouncer = Debouncer::new(sig(1), SETTLE);
    assert_eq!(debouncer.observe(None, start), WatchAction::Wait);
    assert_eq!(
        debouncer.observe(None, start + SETTLE),
        WatchAction::FileMissing
    );
    assert_eq!(debouncer.state(), WatchState::Idle);
    assert_eq!(debouncer.observe(None, start + SETTLE * 2), WatchAction::Wait);
}

#[test]
fn signature_distinguishes_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.csv");
    assert_eq!(read_signature(&path).unwrap(), None);
    std::fs::write(&path, "abc").unwrap();
    assert_eq!(read_signature(&path).unwrap().unwrap().len, 3);
}

#[test]
fn poll_interval_has_a_floor() {
    let mut config = WatchConfig::new("rules.csv");
    config.interval = Duration::from_millis(5);
    assert_eq!(config.poll_interval(), Duration::from_millis(100));
}

struct CountingHandler {
    runs: AtomicUsize,
}

impl CountingHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            runs: AtomicUsize::new(0),
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    async fn wait_for(&self, runs: usize) {
        let deadline = Duration::from_secs(5);
        tokio::time::timeout(deadline, async {
            while self.runs() < runs {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("handler did not run in time");
    }
}

#[async_trait]
impl ChangeHandler for Arc<CountingHandler> {
    async fn on_change(&self, _path: &Path) {
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
}

fn fast_config(path: &Path) -> WatchConfig {
    WatchConfig {
        path: path.to_path_buf(),
        interval: Duration::from_millis(100),
        settle: Duration::from_millis(250),
    }
}

#[tokio::test]
async fn watcher_validates_at_start_and_after_burst_of_edits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.csv");
    std::fs::write(&path, "a").unwrap();

    let handler = CountingHandler::new();
    let watcher = Arc::new(ChangeWatcher::new(fast_config(&path), Arc::clone(&handler)));
    let cancel = CancellationToken::new();
    let task = {
        let watcher = Arc::clone(&watcher);
        let cancel = cancel.clone();
        tokio::spawn(async move { watcher.run(cancel).await })
    };

    handler.wait_for(1).await;

    for content in ["ab", "abc", "abcd"] {
        std::fs::write(&path, content).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    handler.wait_for(2).await;
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(handler.runs(), 2);

    cancel.cancel();
    let stats = task.await.unwrap().unwrap();
    assert_eq!(stats.validations, 2);
}

#[tokio::test]
async fn watcher_waits_for_missing_file_to_appear() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.csv");

    let handler = CountingHandler::new();
    let watcher = Arc::new(ChangeWatcher::new(fast_config(&path), Arc::clone(&handler)));
    let cancel = CancellationToken::new();
    let task = {
        let watcher = Arc::clone(&watcher);
        let cancel = cancel.clone();
        tokio::spawn(async move { watcher.run(cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(handler.runs(), 0);
    std::fs::write(&path, "Product ID,Recommended Product ID\n").unwrap();
    handler.wait_for(1).await;

    cancel.cancel();
    assert_eq!(task.await.unwrap().unwrap().validations, 1);
}

#[tokio::test]
async fn validate_on_change_reports_through_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.csv");
    std::fs::write(
        &path,
        "Product ID,Recommended Product ID,Type\nshoei-rf-1400-helmet,arai-vas-v-pinlock-visor,Explicit\n",
    )
    .unwrap();

    let blocking = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&blocking);
    let handler = ValidateOnChange::new(
        Arc::new(Validator::default()),
        ValidationMode::Strict,
        move |_path, result| {
            if result.map(|report| report.blocking()).unwrap_or(false) {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        },
    );
    handler.on_change(&path).await;
    assert_eq!(blocking.load(Ordering::SeqCst), 1);
}
