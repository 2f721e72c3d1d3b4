//! Services module - HTTP handlers
//!
//! The HTTP surface is deliberately small: room administration and the
//! session endpoint that stands in for the external authentication
//! collaborator. Everything real-time lives in `ws`.

pub mod rooms;
pub mod sessions;

pub use rooms::{create_room, list_rooms};
pub use sessions::create_session;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

/// Root endpoint - health check
pub async fn root(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, "Server is running!")
}
