//! Message entity
//!
//! Messages are append-only: once a row exists it is never mutated by this
//! crate. The sender name is snapshotted at send time so a later rename does
//! not rewrite history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub message_id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    // Directed messages carry an addressee; None means the room at large.
    pub addressee_id: Option<i64>,
    pub addressee_name: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
