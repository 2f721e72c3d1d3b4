//! roomcast - real-time room-scoped messaging server
//!
//! A connected client binds to at most one room, exchanges live messages
//! with its members and pages back through history; room listings are served
//! from a cached last-message summary.

pub mod config;
pub mod core;
pub mod dtos;
pub mod entities;
pub mod repositories;
pub mod services;
pub mod sessions;
pub mod ws;

pub use config::Config;
pub use core::{AppError, AppState};

use axum::{
    Router,
    routing::{any, get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Builds the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    use services::{create_room, create_session, list_rooms, root};
    use ws::ws_handler;

    Router::new()
        .route("/", get(root))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/sessions", post(create_session))
        .route("/ws", any(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
