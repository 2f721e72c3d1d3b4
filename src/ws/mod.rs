//! WebSocket module - the real-time side of the server
//!
//! - `hub`: per-room broadcast fan-out
//! - `connection`: per-connection session state machine and socket tasks
//! - `history`: pagination windows and message rendering
//!
//! The gateway below upgrades a connection only for a valid one-shot session
//! ticket issued by the authentication side.

pub mod connection;
pub mod history;
pub mod hub;

pub use connection::{RoomSession, handle_socket};

use crate::core::{AppError, AppState};
use crate::sessions::ClaimedSession;
use axum::{
    extract::{Query, State, ws::WebSocketUpgrade},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Buffered events per room channel before slow receivers start lagging.
pub const BROADCAST_CHANNEL_CAPACITY: usize = 256;

/// Connections silent for this long are closed.
pub const CLIENT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Minimum spacing enforced between inbound frames of one connection.
pub const RATE_LIMIT_MILLIS: u64 = 25;

#[derive(Deserialize)]
pub struct WsTicketQuery {
    pub ticket: Uuid,
}

/// Entry point for WebSocket upgrade requests. Claims the ticket (consuming
/// it, so a reconnect needs a fresh one) and hands the socket to the
/// connection tasks; an unknown ticket rejects the upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsTicketQuery>,
) -> Result<Response, AppError> {
    let claimed: ClaimedSession = state
        .sessions
        .claim(&params.ticket)
        .ok_or_else(|| AppError::unauthorized("Invalid or already-used session ticket"))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, claimed)))
}
