//! Message DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dtos::DEFAULT_AVATAR_URL;
use crate::entities::User;

/// Payload for inserting a new message row.
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateMessageDTO {
    pub room_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub addressee_id: Option<i64>,
    pub addressee_name: Option<String>,

    #[validate(length(
        min = 1,
        max = 5000,
        message = "Message body must be between 1 and 5000 characters"
    ))]
    pub body: String,

    pub created_at: DateTime<Utc>,
}

/// Sender block of a rendered message, resolved to a live display name and
/// avatar (or their fixed fallbacks).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SenderDTO {
    pub name: String,
    pub avatar_url: String,
}

impl From<&User> for SenderDTO {
    fn from(user: &User) -> Self {
        Self {
            name: user.username.clone(),
            avatar_url: user
                .avatar_url
                .clone()
                .unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string()),
        }
    }
}

/// A message as shown to clients, both in live broadcasts and history pages.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RenderedMessageDTO {
    pub sender: SenderDTO,
    pub date: DateTime<Utc>,
    pub msg: String,
}

/// One page of history, newest-first, plus whether older pages remain.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HistoryPageDTO {
    pub messages: Vec<RenderedMessageDTO>,
    pub more_available: bool,
}
