//! WebSocket event DTOs
//!
//! Tagged unions for everything that crosses the socket, serialized as
//! `{ "type": "...", "data": { ... } }`. Frames that fail to deserialize
//! into `ClientEvent` are dropped at the gateway boundary and never reach
//! session logic.

use serde::{Deserialize, Serialize};

use crate::dtos::{HistoryPageDTO, RenderedMessageDTO, RoomSummaryDTO};

/// Events a client may send.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "data")]
pub enum ClientEvent {
    LoadMyRooms,
    LoadFavoriteRooms,
    RequestOlderMessages,
    SendMessage { body: String },
}

/// Events the server may send.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    MyRooms(Vec<RoomSummaryDTO>),
    FavoriteRooms(Vec<RoomSummaryDTO>),
    OlderMessages(HistoryPageDTO),
    NewMessage(RenderedMessageDTO),
    Error { code: u16, message: String },
}
