//! Room DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dtos::DEFAULT_ROOM_COVER_URL;
use crate::entities::{LastMessage, Room};

/// Payload for creating a room over HTTP.
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateRoomDTO {
    #[validate(length(min = 1, max = 64, message = "Room name must be between 1 and 64 characters"))]
    pub name: String,

    pub admin_id: Option<i64>,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub cover_url: Option<String>,
}

/// What room-listing views receive: identity, cover (always resolvable by
/// the client, so the default is applied here) and the cached last message.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RoomSummaryDTO {
    pub room_id: i64,
    pub name: String,
    pub cover_url: String,
    pub last_message: Option<LastMessage>,
}

impl From<Room> for RoomSummaryDTO {
    fn from(room: Room) -> Self {
        let last_message = room.last_message();
        Self {
            room_id: room.room_id,
            name: room.name,
            cover_url: room
                .cover_url
                .unwrap_or_else(|| DEFAULT_ROOM_COVER_URL.to_string()),
            last_message,
        }
    }
}
