//! API route handlers
//!
//! Routes are organized by functionality:
//!
//! - `health`: Liveness, readiness, and metrics
//! - `items`: Cocktail listing, search, create, update, delete
//! - `images`: Image upload, overwrite, and delete via the media store

pub mod health;
pub mod images;
pub mod items;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Map, Value};

/// API version and base info
///
/// Returns server information including version and available endpoints.
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "Cocktails API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "GET /api/get-items",
            "GET /api/search",
            "POST /api/add",
            "PUT /api/edit",
            "DELETE /api/delete",
            "POST /api/upload-image",
            "POST /api/edit-image",
            "DELETE /api/delete-image",
            "GET /health",
            "GET /ready",
            "GET /metrics"
        ]
    })))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}

/// Parse a request body as a JSON object. An empty body yields an empty map
/// so each operation can report its own "missing field" error.
pub(crate) fn json_object(body: &[u8]) -> ServerResult<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(ServerError::BadRequest(
            "request body must be a JSON object".to_string(),
        )),
    }
}
