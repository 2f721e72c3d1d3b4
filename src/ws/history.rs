//! History pagination and rendering
//!
//! Pages are windows counted back from the newest message. The total count
//! and the window itself are two independent reads: under concurrent inserts
//! `more_available` can be momentarily wrong, which is accepted rather than
//! paid for with a transaction.

use tracing::{instrument, warn};

use crate::dtos::{DEFAULT_AVATAR_URL, RenderedMessageDTO, SenderDTO};
use crate::entities::Message;
use crate::repositories::{MessageRepository, UserRepository};

/// Fixed page size for history requests.
pub const PAGE_SIZE: i64 = 20;

/// Shown when a message's sender no longer resolves.
pub const DELETED_USER_PLACEHOLDER: &str = "error, user deleted";

/// Shown when a message body was tombstoned out-of-band.
pub const DELETED_MESSAGE_PLACEHOLDER: &str = "Error, message deleted";

/// One raw window of history plus the room's total at call time.
pub struct HistoryWindow {
    pub messages: Vec<Message>,
    pub total: i64,
}

impl HistoryWindow {
    /// Whether a page requested at `offset` leaves older messages behind it.
    pub fn more_available(&self, offset: i64) -> bool {
        offset + PAGE_SIZE < self.total
    }
}

/// Loads the page starting `offset` messages back from the newest.
/// An offset at or past the end yields an empty window.
#[instrument(skip(messages))]
pub async fn load_window(
    messages: &MessageRepository,
    room_id: &i64,
    offset: i64,
) -> Result<HistoryWindow, sqlx::Error> {
    let total = messages.count_by_room(room_id).await?;
    let page = messages.find_page(room_id, offset, PAGE_SIZE).await?;

    Ok(HistoryWindow {
        messages: page,
        total,
    })
}

/// Renders a window for the client, resolving each sender to a live name and
/// avatar. A sender that no longer resolves gets the fixed deleted-user
/// placeholder and the default avatar; an empty body gets the fixed
/// deleted-message placeholder. Substitution is per-message and never aborts
/// the page.
#[instrument(skip(users, messages), fields(count = messages.len()))]
pub async fn render_page(
    users: &UserRepository,
    messages: Vec<Message>,
) -> Vec<RenderedMessageDTO> {
    let mut rendered = Vec::with_capacity(messages.len());

    for message in messages {
        let sender = match users.find_by_id(&message.sender_id).await {
            Ok(Some(user)) => SenderDTO::from(&user),
            Ok(None) => deleted_sender(),
            Err(e) => {
                warn!(sender_id = message.sender_id, "Sender lookup failed: {:?}", e);
                deleted_sender()
            }
        };

        let msg = if message.body.is_empty() {
            DELETED_MESSAGE_PLACEHOLDER.to_string()
        } else {
            message.body
        };

        rendered.push(RenderedMessageDTO {
            sender,
            date: message.created_at,
            msg,
        });
    }

    rendered
}

fn deleted_sender() -> SenderDTO {
    SenderDTO {
        name: DELETED_USER_PLACEHOLDER.to_string(),
        avatar_url: DEFAULT_AVATAR_URL.to_string(),
    }
}
