//! Running sync cycles against the configured backend.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, watch};

use super::blob::BlobClient;
use super::git::{GitBackend, PullOutcome};
use super::status::{StatusTracker, SyncPhase, SyncStatus};
use crate::error::Result;
use crate::merge::MergeOutcome;
use crate::model::now_millis;
use crate::store::{DocumentStore, ImportSummary};

/// Store handle shared between the application and the orchestrator.
pub type SharedStore = Arc<Mutex<DocumentStore>>;

/// Where the document is synced to.
#[derive(Debug)]
pub enum SyncBackend {
    /// Whole binary document on a blob server.
    Blob(BlobClient),
    /// Markdown tree in a git repository.
    Git(GitBackend),
}

/// What a backend fetched, handed from `pull` to `merge_local`.
#[derive(Debug)]
pub enum Pulled {
    Blob(Option<Vec<u8>>),
    Git(PullOutcome),
}

/// Result of the local merge step, handed from `merge_local` to `push`.
#[derive(Debug, Default)]
pub struct LocalChanges {
    pub merge: Option<MergeOutcome>,
    pub imported: Option<ImportSummary>,
    outgoing: Option<Vec<u8>>,
    concludes_merge: bool,
}

impl SyncBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncBackend::Blob(_) => "blob",
            SyncBackend::Git(_) => "git",
        }
    }

    pub async fn pull(&self, status: &StatusTracker) -> Result<Pulled> {
        match self {
            SyncBackend::Blob(client) => client.pull().await.map(Pulled::Blob),
            SyncBackend::Git(git) => git.pull(status).await.map(Pulled::Git),
        }
    }

    /// Fold the pulled state into the store and prepare what to push.
    pub fn merge_local(&self, store: &mut DocumentStore, pulled: Pulled) -> Result<LocalChanges> {
        match (self, pulled) {
            (SyncBackend::Blob(_), Pulled::Blob(remote)) => {
                let merge = remote.map(|bytes| store.merge_remote(&bytes));
                Ok(LocalChanges {
                    merge,
                    imported: None,
                    outgoing: Some(store.save_binary()),
                    concludes_merge: false,
                })
            }
            (SyncBackend::Blob(_), Pulled::Git(_)) => Ok(LocalChanges {
                outgoing: Some(store.save_binary()),
                ..Default::default()
            }),
            (SyncBackend::Git(git), pulled) => {
                let outcome = match pulled {
                    Pulled::Git(outcome) => outcome,
                    Pulled::Blob(_) => PullOutcome::UpToDate,
                };
                log::debug!("Git pull finished: {:?}", outcome);
                Ok(LocalChanges {
                    imported: git.merge_local(store, &outcome)?,
                    concludes_merge: outcome.concludes_merge(),
                    ..Default::default()
                })
            }
        }
    }

    /// Publish local state. Returns the commit id for git when one was made.
    pub async fn push(&self, local: LocalChanges, status: &StatusTracker) -> Result<Option<String>> {
        match self {
            SyncBackend::Blob(client) => {
                if let Some(state) = local.outgoing {
                    status.set_phase(SyncPhase::Pushing);
                    client.push(state).await?;
                }
                Ok(None)
            }
            SyncBackend::Git(git) => git.push(status, local.concludes_merge).await,
        }
    }

    pub async fn test_connection(&self) -> Result<()> {
        match self {
            SyncBackend::Blob(client) => client.test_connection().await,
            SyncBackend::Git(git) => git.test_connection().await,
        }
    }
}

/// What asked for a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Explicit user request; never debounced.
    Manual,
    /// Startup, focus, interval or similar; debounced.
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Debounced { since_last: Duration },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InFlight => f.write_str("a sync is already running"),
            SkipReason::Debounced { since_last } => {
                write!(f, "last sync finished {}s ago", since_last.as_secs())
            }
        }
    }
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub backend: &'static str,
    pub merge: Option<MergeOutcome>,
    pub imported: Option<ImportSummary>,
    pub commit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    Skipped(SkipReason),
    Failed(String),
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs at most one sync cycle at a time.
///
/// The store lock is only taken for the local merge step; network transfers
/// run without it.
#[derive(Debug)]
pub struct SyncOrchestrator {
    backend: SyncBackend,
    store: SharedStore,
    status: StatusTracker,
    in_flight: AtomicBool,
    min_interval: Duration,
}

impl SyncOrchestrator {
    pub fn new(backend: SyncBackend, store: SharedStore, min_interval: Duration) -> Self {
        Self::with_status(backend, store, min_interval, SyncStatus::default())
    }

    /// Resume from a previously observed status, e.g. to keep debouncing
    /// across restarts.
    pub fn with_status(
        backend: SyncBackend,
        store: SharedStore,
        min_interval: Duration,
        initial: SyncStatus,
    ) -> Self {
        Self {
            backend,
            store,
            status: StatusTracker::new(initial),
            in_flight: AtomicBool::new(false),
            min_interval,
        }
    }

    pub fn backend(&self) -> &SyncBackend {
        &self.backend
    }

    pub fn status(&self) -> SyncStatus {
        self.status.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn debounce(&self) -> Option<SkipReason> {
        let last = self.status.current().last_synced_at?;
        let since_last = Duration::from_millis(now_millis().saturating_sub(last).max(0) as u64);
        (since_last < self.min_interval).then_some(SkipReason::Debounced { since_last })
    }

    /// Run one cycle unless one is already running or, for automatic
    /// triggers, the last success is too recent.
    pub async fn request_sync(&self, trigger: SyncTrigger) -> SyncOutcome {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            log::debug!("Sync requested ({:?}) while one is in flight", trigger);
            return SyncOutcome::Skipped(SkipReason::InFlight);
        };
        if trigger == SyncTrigger::Automatic
            && let Some(reason) = self.debounce()
        {
            log::debug!("Automatic sync skipped: {}", reason);
            return SyncOutcome::Skipped(reason);
        }

        self.status.set_phase(SyncPhase::Syncing);
        match self.run_cycle().await {
            Ok(report) => {
                self.status.succeed(report.commit.clone());
                log::info!("Sync via {} completed: {:?}", report.backend, report);
                SyncOutcome::Completed(report)
            }
            Err(e) => {
                let message = e.to_string();
                self.status.fail(message.clone());
                log::warn!("Sync via {} failed: {}", self.backend.kind(), message);
                SyncOutcome::Failed(message)
            }
        }
    }

    async fn run_cycle(&self) -> Result<SyncReport> {
        let pulled = self.backend.pull(&self.status).await?;
        let local = {
            let mut store = self.store.lock().await;
            self.backend.merge_local(&mut store, pulled)?
        };
        let merge = local.merge.clone();
        let imported = local.imported;
        let commit = self.backend.push(local, &self.status).await?;
        Ok(SyncReport {
            backend: self.backend.kind(),
            merge,
            imported,
            commit,
        })
    }

    pub async fn test_connection(&self) -> Result<()> {
        self.backend.test_connection().await
    }
}
