//! DTOs module - client-facing representations
//!
//! DTOs keep the wire shapes separate from the stored entities. Everything
//! the WebSocket side exchanges goes through the tagged unions in `events`;
//! the HTTP side uses the creation/summary DTOs directly.

pub mod events;
pub mod message;
pub mod room;

pub use events::{ClientEvent, ServerEvent};
pub use message::{CreateMessageDTO, HistoryPageDTO, RenderedMessageDTO, SenderDTO};
pub use room::{CreateRoomDTO, RoomSummaryDTO};

/// Served when a user has not set an avatar, or no longer exists.
pub const DEFAULT_AVATAR_URL: &str = "/default/avatar-default.png";

/// Served when a room has no cover image.
pub const DEFAULT_ROOM_COVER_URL: &str = "/default/front-default.png";
