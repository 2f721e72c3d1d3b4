//! Session tickets - the seam to the authentication collaborator
//!
//! Authentication itself happens outside this crate. Whatever performs it
//! deposits a ticket here binding an already-resolved identity to an
//! optional room selection; the WebSocket gateway then claims the ticket
//! exactly once. Claiming removes the entry, so a reconnect cannot reuse a
//! stale room selection.

use dashmap::DashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::User;

/// What the gateway receives for a valid ticket.
#[derive(Debug, Clone)]
pub struct ClaimedSession {
    pub identity: User,
    pub room_selection: Option<i64>,
}

pub struct SessionStore {
    pending: DashMap<Uuid, ClaimedSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Deposits a session and returns the one-shot ticket for it.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub fn issue(&self, identity: User, room_selection: Option<i64>) -> Uuid {
        let ticket = Uuid::new_v4();
        self.pending.insert(
            ticket,
            ClaimedSession {
                identity,
                room_selection,
            },
        );
        info!(%ticket, "Session ticket issued");
        ticket
    }

    /// Claims a ticket, consuming it. A second claim of the same ticket
    /// returns None.
    #[instrument(skip(self))]
    pub fn claim(&self, ticket: &Uuid) -> Option<ClaimedSession> {
        match self.pending.remove(ticket) {
            Some((_, session)) => {
                info!(user_id = session.identity.user_id, "Session ticket claimed");
                Some(session)
            }
            None => {
                warn!("Unknown or already-claimed session ticket");
                None
            }
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
