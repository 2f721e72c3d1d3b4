//! Room services - room creation and listing over HTTP

use axum::extract::{Json, Query, State};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::core::{AppError, AppState};
use crate::dtos::{CreateRoomDTO, RoomSummaryDTO};
use crate::entities::Room;

#[derive(Debug, Deserialize)]
pub struct RoomsQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Creates a room. The name must be globally unique: a duplicate is reported
/// as Conflict to this requester and leaves the existing record untouched.
#[instrument(skip(state, body), fields(name = %body.name))]
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRoomDTO>,
) -> Result<Json<Room>, AppError> {
    body.validate()?;

    if state.rooms.find_by_name(&body.name).await?.is_some() {
        warn!("Room name already taken");
        return Err(AppError::conflict("Room already exists"));
    }

    // The UNIQUE constraint still backs this up if two creations race past
    // the name check; the loser maps to Conflict as well.
    let room = state.rooms.create(&body).await?;
    info!(room_id = room.room_id, "Room created");

    Ok(Json(room))
}

/// Lists rooms as summaries, newest-created first.
#[instrument(skip(state))]
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RoomsQuery>,
) -> Result<Json<Vec<RoomSummaryDTO>>, AppError> {
    let skip = params.skip.unwrap_or(0).max(0);
    let limit = params.limit.unwrap_or(50).clamp(1, 100);

    let rooms = state.rooms.list(skip, limit).await?;
    debug!(count = rooms.len(), "Rooms listed");

    Ok(Json(rooms.into_iter().map(RoomSummaryDTO::from).collect()))
}
