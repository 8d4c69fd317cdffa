//! Remote sync backends and the orchestrator driving them.
//!
//! Two backends exist. The blob backend moves the whole binary document and
//! relies on the merge engine. The git backend stores the active vault as
//! markdown and merges per entity, last write wins.

mod blob;
pub mod git;
mod orchestrator;
mod status;

pub use blob::BlobClient;
pub use orchestrator::{
    LocalChanges, Pulled, SharedStore, SkipReason, SyncBackend, SyncOrchestrator, SyncOutcome,
    SyncReport, SyncTrigger,
};
pub use status::{StatusTracker, SyncPhase, SyncStatus};
