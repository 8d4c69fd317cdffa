//! CRDT document, local persistence and schema migrations.
//!
//! The whole Kurumi state lives in one yrs document ([`CrdtDocument`]). It is
//! persisted as a single binary blob through a [`DocumentStorage`] backend and
//! upgraded on load by [`migrate`].

mod document;
mod memory_storage;
mod migrations;
mod persist;
#[cfg(feature = "sqlite")]
mod sqlite_storage;
mod storage;

pub use document::{CrdtDocument, DocTxn};
pub use memory_storage::MemoryStorage;
pub use migrations::{CURRENT_SCHEMA_VERSION, MigrationReport, migrate, repair_vault_invariants};
pub use persist::Persister;
#[cfg(feature = "sqlite")]
pub use sqlite_storage::SqliteStorage;
pub use storage::{DOCUMENT_KEY, DocumentStorage, StorageResult};
