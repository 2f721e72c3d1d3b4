//! Application state shared by every route and connection task.

use sqlx::SqlitePool;

use crate::repositories::{MessageRepository, RoomRepository, UserRepository};
use crate::sessions::SessionStore;
use crate::ws::hub::RoomHub;

pub struct AppState {
    /// Append-only message store
    pub messages: MessageRepository,

    /// Room records, including the cached last-message summary
    pub rooms: RoomRepository,

    /// User identity resolution and membership lists
    pub users: UserRepository,

    /// One-shot session tickets handed to the WebSocket gateway
    pub sessions: SessionStore,

    /// Per-room broadcast fan-out
    pub hub: RoomHub,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            messages: MessageRepository::new(pool.clone()),
            rooms: RoomRepository::new(pool.clone()),
            users: UserRepository::new(pool),
            sessions: SessionStore::new(),
            hub: RoomHub::new(),
        }
    }
}
