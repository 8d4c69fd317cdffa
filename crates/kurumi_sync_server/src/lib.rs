//! Kurumi Sync Server
//!
//! Reference blob server for Kurumi's whole-document sync. It stores one
//! opaque CRDT document and serves it back to every client presenting the
//! shared token; merging happens on the clients.
//!
//! ## Endpoints
//!
//! - `GET /sync`: stored document, 404 when nothing was pushed yet
//! - `PUT /sync`: replace the stored document
//! - `GET /health`: liveness check
//!
//! ## Environment Variables
//!
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 3030)
//! - `SYNC_TOKEN`: Bearer token clients must send (required)
//! - `DATA_DIR`: Directory for the stored document (default: ./data)
//! - `MAX_BODY_BYTES`: Upload size limit (default: 50 MiB)

pub mod auth;
pub mod config;
pub mod handlers;
pub mod store;

pub use config::Config;
pub use handlers::{AppState, app, router};
