//! Observable sync status.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::model::now_millis;

/// Where a sync cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    #[default]
    Idle,
    Syncing,
    Cloning,
    Pulling,
    Pushing,
    Success,
    Error,
}

/// Snapshot of the sync state published to observers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub phase: SyncPhase,
    /// Unix milliseconds of the last successful cycle.
    pub last_synced_at: Option<i64>,
    pub last_commit: Option<String>,
    pub error: Option<String>,
}

impl SyncStatus {
    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            SyncPhase::Syncing | SyncPhase::Cloning | SyncPhase::Pulling | SyncPhase::Pushing
        )
    }
}

/// Publishes [`SyncStatus`] changes through a watch channel.
#[derive(Debug)]
pub struct StatusTracker {
    tx: watch::Sender<SyncStatus>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new(SyncStatus::default())
    }
}

impl StatusTracker {
    /// Start from a known status, e.g. one restored from a previous run.
    pub fn new(initial: SyncStatus) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> SyncStatus {
        self.tx.borrow().clone()
    }

    /// Enter a working phase, clearing any previous error.
    pub fn set_phase(&self, phase: SyncPhase) {
        self.tx.send_modify(|status| {
            status.phase = phase;
            status.error = None;
        });
    }

    pub fn succeed(&self, commit: Option<String>) {
        self.tx.send_modify(|status| {
            status.phase = SyncPhase::Success;
            status.error = None;
            status.last_synced_at = Some(now_millis());
            if commit.is_some() {
                status.last_commit = commit;
            }
        });
    }

    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        self.tx.send_modify(|status| {
            status.phase = SyncPhase::Error;
            status.error = Some(error);
        });
    }

    pub fn reset(&self) {
        self.tx.send_modify(|status| {
            status.phase = SyncPhase::Idle;
            status.error = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        let tracker = StatusTracker::default();
        let rx = tracker.subscribe();

        tracker.set_phase(SyncPhase::Pulling);
        assert!(rx.borrow().is_busy());

        tracker.fail("offline");
        assert_eq!(rx.borrow().phase, SyncPhase::Error);
        assert_eq!(rx.borrow().error.as_deref(), Some("offline"));

        tracker.set_phase(SyncPhase::Syncing);
        assert!(rx.borrow().error.is_none());

        tracker.succeed(Some("abc".into()));
        tracker.succeed(None);
        let status = tracker.current();
        assert_eq!(status.phase, SyncPhase::Success);
        assert_eq!(status.last_commit.as_deref(), Some("abc"));
        assert!(status.last_synced_at.is_some());
    }
}
