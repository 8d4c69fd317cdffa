pub mod sync;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{Method, header},
    routing::get,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::store::FsObjectStore;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FsObjectStore>,
    pub token: Arc<str>,
}

impl AppState {
    pub fn new(store: FsObjectStore, token: &str) -> Self {
        Self {
            store: Arc::new(store),
            token: Arc::from(token),
        }
    }
}

/// Server status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the application router
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .route("/", get(status))
        .route("/health", get(|| async { "OK" }))
        .route("/sync", get(sync::get_document).put(sync::put_document))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Router for a loaded configuration
pub fn app(config: &Config) -> Router {
    let state = AppState::new(FsObjectStore::new(&config.data_dir), &config.sync_token);
    router(state, config.max_body_bytes)
}
