//! Core library for Kurumi, an offline-first notes application.
//!
//! All state lives in one CRDT document managed by the [`store::DocumentStore`].
//! Remote copies are combined with the [`merge`] engine and exchanged through
//! the [`sync`] backends: a blob server holding the binary document, or a git
//! repository holding the active vault as markdown ([`codec`]).

/// Configuration options
pub mod config;

/// Markdown and side-car codec for git sync
pub mod codec;

/// CRDT document, persistence and migrations
pub mod crdt;

/// Error (common error types)
pub mod error;

/// Merging remote document states
pub mod merge;

/// Entities stored in the document
pub mod model;

/// Document store: lifecycle, CRUD and read models
pub mod store;

/// Remote sync backends and orchestration
pub mod sync;

pub mod template;

pub use error::{KurumiError, Result};
pub use store::DocumentStore;
