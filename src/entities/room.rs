//! Room entity
//!
//! The last-message summary is denormalized onto the rooms row so listing
//! views never have to touch the messages table. The three columns are
//! either all set or all NULL; `last_message()` folds them back into one
//! value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Room {
    pub room_id: i64,
    pub name: String,
    pub admin_id: Option<i64>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub last_message_text: Option<String>,
    pub last_message_sender: Option<String>,
    pub last_message_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Cached preview of a room's most recent message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LastMessage {
    pub text: String,
    pub sender: String,
    pub date: DateTime<Utc>,
}

impl Room {
    pub fn last_message(&self) -> Option<LastMessage> {
        match (
            &self.last_message_text,
            &self.last_message_sender,
            self.last_message_date,
        ) {
            (Some(text), Some(sender), Some(date)) => Some(LastMessage {
                text: text.clone(),
                sender: sender.clone(),
                date,
            }),
            _ => None,
        }
    }
}
