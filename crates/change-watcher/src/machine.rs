use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::signature::FileSignature;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    /// A change was seen at `since`; waiting for the file to stop moving.
    PendingSettle { since: Instant },
    Validating,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchAction {
    Wait,
    Validate,
    /// The file settled into not existing.
    FileMissing,
}

/// Debounce state machine. Pure: the caller supplies each poll's signature
/// and clock reading, and reports when a validation run is over.
#[derive(Debug)]
pub struct Debouncer {
    state: WatchState,
    last: Option<FileSignature>,
    settle: Duration,
}

impl Debouncer {
    pub fn new(initial: Option<FileSignature>, settle: Duration) -> Self {
        Self {
            state: WatchState::Idle,
            last: initial,
            settle,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn observe(&mut self, current: Option<FileSignature>, now: Instant) -> WatchAction {
        if self.state == WatchState::Validating {
            return WatchAction::Wait;
        }
        if current != self.last {
            self.last = current;
            if matches!(self.state, WatchState::PendingSettle { .. }) {
                debug!("change during settle window; restarting it");
            } else {
                debug!("change detected; waiting to settle");
            }
            self.state = WatchState::PendingSettle { since: now };
        }

        match self.state {
            WatchState::PendingSettle { since } if now.duration_since(since) >= self.settle => {
                if self.last.is_some() {
                    self.state = WatchState::Validating;
                    WatchAction::Validate
                } else {
                    self.state = WatchState::Idle;
                    WatchAction::FileMissing
                }
            }
            _ => WatchAction::Wait,
        }
    }

    /// Validation completed, successfully or not.
    pub fn finish(&mut self) {
        if self.state == WatchState::Validating {
            self.state = WatchState::Idle;
        }
    }
}
