//! Session services - the HTTP seam standing in for the auth collaborator
//!
//! Whatever authenticates users calls this endpoint with a resolved user id
//! and an optional room selection; the response is the one-shot ticket the
//! WebSocket gateway accepts. Whether the selected room still exists is
//! checked at join time, not here.

use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::core::{AppError, AppState};

#[derive(Deserialize)]
pub struct CreateSessionDTO {
    pub user_id: i64,
    pub room_id: Option<i64>,
}

#[derive(Serialize, Deserialize)]
pub struct SessionTicketDTO {
    pub ticket: Uuid,
}

#[instrument(skip(state, body), fields(user_id = %body.user_id))]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSessionDTO>,
) -> Result<Json<SessionTicketDTO>, AppError> {
    let identity = state
        .users
        .find_by_id(&body.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let ticket = state.sessions.issue(identity, body.room_id);
    info!("Session ticket created");

    Ok(Json(SessionTicketDTO { ticket }))
}
