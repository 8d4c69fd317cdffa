use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use super::AppState;
use crate::auth::RequireToken;

/// GET /sync - Return the stored document, 404 if none
pub async fn get_document(State(state): State<AppState>, _auth: RequireToken) -> Response {
    match state.store.read().await {
        Ok(Some(bytes)) => {
            debug!("Serving stored document ({} bytes)", bytes.len());
            ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, "No document stored").into_response(),
        Err(e) => {
            error!("Failed to read stored document: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// PUT /sync - Replace the stored document
pub async fn put_document(
    State(state): State<AppState>,
    _auth: RequireToken,
    body: Bytes,
) -> impl IntoResponse {
    if body.is_empty() {
        return (StatusCode::BAD_REQUEST, "Empty document").into_response();
    }
    match state.store.write(&body).await {
        Ok(()) => {
            debug!("Stored document ({} bytes)", body.len());
            StatusCode::OK.into_response()
        }
        Err(e) => {
            error!("Failed to store document: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
