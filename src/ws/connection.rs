//! Room session and connection tasks
//!
//! Each accepted connection is split into two tasks: a listen task that owns
//! the `RoomSession` state machine and drives inbound events, and a write
//! task that multiplexes room broadcasts with replies addressed to this
//! connection alone. The tasks talk over an unbounded channel; when the
//! listen side ends, the closed channel tears the write side down and the
//! dropped broadcast receiver leaves the room's group.

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt, future::join_all};
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{Duration, interval, timeout};
use tokio_stream::StreamMap;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::core::AppState;
use crate::dtos::{
    ClientEvent, CreateMessageDTO, HistoryPageDTO, RenderedMessageDTO, RoomSummaryDTO, SenderDTO,
    ServerEvent,
};
use crate::entities::{LastMessage, User};
use crate::sessions::ClaimedSession;
use crate::ws::history::{self, PAGE_SIZE};
use crate::ws::{CLIENT_IDLE_TIMEOUT_SECS, RATE_LIMIT_MILLIS};

/// Binding state of one connection. There is deliberately no way back from
/// Bound to Unbound: switching rooms takes a fresh connection with a fresh
/// ticket.
enum Binding {
    Unbound,
    Bound { room_id: i64, cursor: i64 },
}

/// Per-connection state machine: one identity, at most one room, and the
/// pagination cursor for that room.
pub struct RoomSession {
    state: Arc<AppState>,
    identity: User,
    binding: Binding,
}

impl RoomSession {
    /// Builds the session for a claimed ticket. A ticket with a room
    /// selection joins that room's broadcast group; a selection pointing at
    /// a room that no longer exists is logged and dropped, leaving the
    /// session unbound rather than failing the connection.
    pub async fn establish(
        state: Arc<AppState>,
        claimed: ClaimedSession,
    ) -> (Self, Option<Receiver<Arc<ServerEvent>>>) {
        let ClaimedSession {
            identity,
            room_selection,
        } = claimed;

        let (binding, receiver) = match room_selection {
            None => (Binding::Unbound, None),
            Some(room_id) => match state.rooms.find_by_id(&room_id).await {
                Ok(Some(room)) => {
                    let rx = state.hub.subscribe(&room.room_id);
                    info!(
                        user_id = identity.user_id,
                        room_id = room.room_id,
                        room = %room.name,
                        "User joined room"
                    );
                    (
                        Binding::Bound {
                            room_id: room.room_id,
                            cursor: 0,
                        },
                        Some(rx),
                    )
                }
                Ok(None) => {
                    warn!(room_id, "Room selection refers to a missing room, staying unbound");
                    (Binding::Unbound, None)
                }
                Err(e) => {
                    error!("Room lookup failed during join: {:?}", e);
                    (Binding::Unbound, None)
                }
            },
        };

        (
            Self {
                state,
                identity,
                binding,
            },
            receiver,
        )
    }

    pub fn room_id(&self) -> Option<i64> {
        match &self.binding {
            Binding::Bound { room_id, .. } => Some(*room_id),
            Binding::Unbound => None,
        }
    }

    /// Handles one inbound event. The returned event, if any, goes back to
    /// the requesting connection only; room-wide effects go through the hub.
    pub async fn handle_event(&mut self, event: ClientEvent) -> Option<ServerEvent> {
        match event {
            ClientEvent::LoadMyRooms => Some(self.my_rooms().await),
            ClientEvent::LoadFavoriteRooms => Some(self.favorite_rooms().await),
            ClientEvent::RequestOlderMessages => Some(self.older_messages().await),
            ClientEvent::SendMessage { body } => self.send_message(body).await,
        }
    }

    async fn my_rooms(&self) -> ServerEvent {
        match self.state.users.my_room_ids(&self.identity.user_id).await {
            Ok(ids) => ServerEvent::MyRooms(self.resolve_summaries(ids).await),
            Err(e) => {
                error!("Failed to load membership list: {:?}", e);
                storage_error()
            }
        }
    }

    async fn favorite_rooms(&self) -> ServerEvent {
        match self
            .state
            .users
            .favorite_room_ids(&self.identity.user_id)
            .await
        {
            Ok(ids) => ServerEvent::FavoriteRooms(self.resolve_summaries(ids).await),
            Err(e) => {
                error!("Failed to load favorite list: {:?}", e);
                storage_error()
            }
        }
    }

    /// Resolves a membership id list to room summaries with one concurrent
    /// lookup per id. Ids of deleted rooms are skipped, so the result may be
    /// shorter than the input.
    async fn resolve_summaries(&self, ids: Vec<i64>) -> Vec<RoomSummaryDTO> {
        let lookups = ids.iter().map(|id| self.state.rooms.find_by_id(id));

        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(Some(room)) => Some(RoomSummaryDTO::from(room)),
                Ok(None) => None,
                Err(e) => {
                    warn!("Room lookup failed while listing: {:?}", e);
                    None
                }
            })
            .collect()
    }

    /// Loads the next history page for this session's cursor and advances
    /// the cursor by the page size, short pages included.
    async fn older_messages(&mut self) -> ServerEvent {
        let (room_id, offset) = match &self.binding {
            Binding::Bound { room_id, cursor } => (*room_id, *cursor),
            Binding::Unbound => return not_bound_error(),
        };

        let window = match history::load_window(&self.state.messages, &room_id, offset).await {
            Ok(window) => window,
            Err(e) => {
                error!("History window load failed: {:?}", e);
                return storage_error();
            }
        };

        let more_available = window.more_available(offset);
        if let Binding::Bound { cursor, .. } = &mut self.binding {
            *cursor = offset + PAGE_SIZE;
        }

        let messages = history::render_page(&self.state.users, window.messages).await;
        ServerEvent::OlderMessages(HistoryPageDTO {
            messages,
            more_available,
        })
    }

    /// Persist, then update the room's last-message summary, then broadcast.
    /// A failed persist aborts the whole chain; a failed summary update
    /// after a successful persist is logged and the broadcast still goes out
    /// (accepted staleness).
    async fn send_message(&mut self, body: String) -> Option<ServerEvent> {
        let room_id = match &self.binding {
            Binding::Bound { room_id, .. } => *room_id,
            Binding::Unbound => return Some(not_bound_error()),
        };

        let new_message = CreateMessageDTO {
            room_id,
            sender_id: self.identity.user_id,
            sender_name: self.identity.username.clone(),
            addressee_id: None,
            addressee_name: None,
            body,
            created_at: Utc::now(),
        };

        if let Err(e) = new_message.validate() {
            return Some(ServerEvent::Error {
                code: 400,
                message: e.to_string(),
            });
        }

        let message = match self.state.messages.append(&new_message).await {
            Ok(message) => message,
            Err(e) => {
                error!("Message persistence failed: {:?}", e);
                return Some(ServerEvent::Error {
                    code: 500,
                    message: "Message could not be saved".to_string(),
                });
            }
        };

        let summary = LastMessage {
            text: message.body.clone(),
            sender: self.identity.username.clone(),
            date: message.created_at,
        };
        if let Err(e) = self
            .state
            .rooms
            .update_last_message(&room_id, &summary)
            .await
        {
            warn!("Last-message summary update failed: {:?}", e);
        }

        let rendered = RenderedMessageDTO {
            sender: SenderDTO::from(&self.identity),
            date: message.created_at,
            msg: message.body,
        };
        if self
            .state
            .hub
            .emit(&room_id, Arc::new(ServerEvent::NewMessage(rendered)))
            .is_err()
        {
            warn!(room_id, "Broadcast reached no connections");
        }

        None
    }
}

fn not_bound_error() -> ServerEvent {
    ServerEvent::Error {
        code: 400,
        message: "Connection is not bound to a room".to_string(),
    }
}

fn storage_error() -> ServerEvent {
    ServerEvent::Error {
        code: 500,
        message: "Storage unavailable".to_string(),
    }
}

#[instrument(skip(ws, state, claimed), fields(user_id = claimed.identity.user_id))]
pub async fn handle_socket(ws: WebSocket, state: Arc<AppState>, claimed: ClaimedSession) {
    info!("WebSocket connection established");

    let (ws_tx, ws_rx) = ws.split();
    let (reply_tx, reply_rx) = unbounded_channel::<ServerEvent>();

    let (session, room_rx) = RoomSession::establish(state, claimed).await;

    let mut subscriptions: StreamMap<i64, BroadcastStream<Arc<ServerEvent>>> = StreamMap::new();
    if let (Some(rx), Some(room_id)) = (room_rx, session.room_id()) {
        subscriptions.insert(room_id, BroadcastStream::new(rx));
    }

    tokio::spawn(listen_ws(ws_rx, reply_tx, session));
    tokio::spawn(write_ws(ws_tx, reply_rx, subscriptions));
}

#[instrument(skip_all)]
async fn write_ws(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut reply_rx: UnboundedReceiver<ServerEvent>,
    mut subscriptions: StreamMap<i64, BroadcastStream<Arc<ServerEvent>>>,
) {
    loop {
        tokio::select! {
            Some((_, result)) = tokio_stream::StreamExt::next(&mut subscriptions) => {
                match result {
                    Ok(event) => {
                        if send_event(&mut ws_tx, &event).await.is_err() {
                            warn!("Failed to forward broadcast, closing connection");
                            break;
                        }
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Connection lagged behind room broadcast");
                    }
                }
            }

            reply = reply_rx.recv() => {
                match reply {
                    Some(event) => {
                        if send_event(&mut ws_tx, &event).await.is_err() {
                            warn!("Failed to send reply, closing connection");
                            break;
                        }
                    }
                    // listen task ended; tear down
                    None => break,
                }
            }
        }
    }

    // Dropping the subscriptions leaves the room's broadcast group. Running
    // this twice for the same connection is a no-op.
    info!("Write task terminated");
}

async fn send_event(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(|e| {
        error!("Failed to serialize event: {:?}", e);
        axum::Error::new(e)
    })?;
    ws_tx.send(Message::Text(Utf8Bytes::from(json))).await
}

#[instrument(skip_all)]
async fn listen_ws(
    mut ws_rx: SplitStream<WebSocket>,
    reply_tx: UnboundedSender<ServerEvent>,
    mut session: RoomSession,
) {
    let mut rate_limiter = interval(Duration::from_millis(RATE_LIMIT_MILLIS));
    let idle_timeout = Duration::from_secs(CLIENT_IDLE_TIMEOUT_SECS);

    loop {
        match timeout(idle_timeout, ws_rx.next()).await {
            Ok(Some(Ok(frame))) => {
                rate_limiter.tick().await;

                match frame {
                    Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            if let Some(reply) = session.handle_event(event).await {
                                if reply_tx.send(reply).is_err() {
                                    break;
                                }
                            }
                        }
                        Err(_) => warn!("Dropping malformed client frame"),
                    },
                    Message::Close(_) => {
                        info!("Close frame received");
                        break;
                    }
                    _ => {}
                }
            }
            Ok(Some(Err(e))) => {
                warn!("WebSocket error: {:?}", e);
                break;
            }
            Ok(None) => {
                info!("WebSocket stream ended");
                break;
            }
            Err(_) => {
                warn!(timeout_secs = CLIENT_IDLE_TIMEOUT_SECS, "Connection idle timeout");
                break;
            }
        }
    }

    // reply_tx drops here; the write task observes the closed channel and
    // unsubscribes from the room
    info!("Listen task terminated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    fn alice() -> User {
        User {
            user_id: 1,
            username: "alice".to_string(),
            avatar_url: Some("/avatars/alice.png".to_string()),
        }
    }

    fn bob() -> User {
        User {
            user_id: 2,
            username: "bob".to_string(),
            avatar_url: None,
        }
    }

    async fn bound_session(
        state: &Arc<AppState>,
        identity: User,
        room_id: i64,
    ) -> (RoomSession, Receiver<Arc<ServerEvent>>) {
        let (session, rx) = RoomSession::establish(
            state.clone(),
            ClaimedSession {
                identity,
                room_selection: Some(room_id),
            },
        )
        .await;
        (session, rx.expect("session should be bound"))
    }

    /// A ticket without a room selection leaves the session unbound: room
    /// operations are rejected while listing queries still work.
    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "rooms")))]
    async fn test_unbound_session_capabilities(pool: SqlitePool) -> sqlx::Result<()> {
        let state = Arc::new(AppState::new(pool));
        let (mut session, rx) = RoomSession::establish(
            state,
            ClaimedSession {
                identity: alice(),
                room_selection: None,
            },
        )
        .await;
        assert!(rx.is_none());
        assert!(session.room_id().is_none());

        let reply = session
            .handle_event(ClientEvent::SendMessage {
                body: "hello?".to_string(),
            })
            .await;
        assert!(matches!(reply, Some(ServerEvent::Error { code: 400, .. })));

        let reply = session.handle_event(ClientEvent::RequestOlderMessages).await;
        assert!(matches!(reply, Some(ServerEvent::Error { code: 400, .. })));

        let reply = session.handle_event(ClientEvent::LoadMyRooms).await;
        match reply {
            Some(ServerEvent::MyRooms(rooms)) => assert_eq!(rooms.len(), 2),
            other => panic!("expected MyRooms, got {:?}", other),
        }

        Ok(())
    }

    /// A room selection pointing at a deleted room is dropped, not an error.
    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "rooms")))]
    async fn test_selection_of_missing_room_stays_unbound(pool: SqlitePool) -> sqlx::Result<()> {
        let state = Arc::new(AppState::new(pool));
        let (session, rx) = RoomSession::establish(
            state,
            ClaimedSession {
                identity: alice(),
                room_selection: Some(777),
            },
        )
        .await;

        assert!(rx.is_none());
        assert!(session.room_id().is_none());
        Ok(())
    }

    /// A sent message is persisted exactly once, updates the room summary,
    /// and reaches every subscriber of that room including the sender, while
    /// other rooms hear nothing.
    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "rooms")))]
    async fn test_send_message_full_chain(pool: SqlitePool) -> sqlx::Result<()> {
        let state = Arc::new(AppState::new(pool));
        let (mut sender_session, mut sender_rx) = bound_session(&state, alice(), 1).await;
        let (_peer_session, mut peer_rx) = bound_session(&state, bob(), 1).await;
        let mut other_room_rx = state.hub.subscribe(&2);

        let reply = sender_session
            .handle_event(ClientEvent::SendMessage {
                body: "hello room".to_string(),
            })
            .await;
        assert!(reply.is_none(), "send has no direct reply");

        for rx in [&mut sender_rx, &mut peer_rx] {
            match rx.try_recv().expect("broadcast should be delivered").as_ref() {
                ServerEvent::NewMessage(rendered) => {
                    assert_eq!(rendered.sender.name, "alice");
                    assert_eq!(rendered.sender.avatar_url, "/avatars/alice.png");
                    assert_eq!(rendered.msg, "hello room");
                }
                other => panic!("expected NewMessage, got {:?}", other),
            }
        }
        assert!(other_room_rx.try_recv().is_err(), "no cross-room leakage");

        assert_eq!(state.messages.count_by_room(&1).await?, 1);
        let room = state.rooms.find_by_id(&1).await?.unwrap();
        let summary = room.last_message().expect("summary should be cached");
        assert_eq!(summary.text, "hello room");
        assert_eq!(summary.sender, "alice");

        Ok(())
    }

    /// When the append fails nothing else happens: no summary update, no
    /// broadcast, an error to the requester only.
    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "rooms")))]
    async fn test_persistence_failure_aborts_chain(pool: SqlitePool) -> sqlx::Result<()> {
        let state = Arc::new(AppState::new(pool.clone()));
        let (mut session, mut own_rx) = bound_session(&state, alice(), 1).await;

        sqlx::query("DROP TABLE messages").execute(&pool).await?;

        let reply = session
            .handle_event(ClientEvent::SendMessage {
                body: "lost to the void".to_string(),
            })
            .await;
        assert!(matches!(reply, Some(ServerEvent::Error { code: 500, .. })));

        assert!(own_rx.try_recv().is_err(), "nothing may be broadcast");
        let room = state.rooms.find_by_id(&1).await?.unwrap();
        assert!(room.last_message().is_none(), "summary must stay untouched");

        Ok(())
    }

    /// An empty body is rejected before touching storage.
    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "rooms")))]
    async fn test_empty_body_rejected(pool: SqlitePool) -> sqlx::Result<()> {
        let state = Arc::new(AppState::new(pool));
        let (mut session, _rx) = bound_session(&state, alice(), 1).await;

        let reply = session
            .handle_event(ClientEvent::SendMessage { body: String::new() })
            .await;
        assert!(matches!(reply, Some(ServerEvent::Error { code: 400, .. })));
        assert_eq!(state.messages.count_by_room(&1).await?, 0);

        Ok(())
    }

    /// Repeated history requests walk the room newest-first in pages of 20,
    /// advancing the private cursor each time.
    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "rooms")))]
    async fn test_history_pages_advance_cursor(pool: SqlitePool) -> sqlx::Result<()> {
        use chrono::{Duration as ChronoDuration, TimeZone};

        let state = Arc::new(AppState::new(pool));
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        for i in 0..45 {
            state
                .messages
                .append(&CreateMessageDTO {
                    room_id: 1,
                    sender_id: 2,
                    sender_name: "bob".to_string(),
                    addressee_id: None,
                    addressee_name: None,
                    body: format!("msg-{}", i + 1),
                    created_at: base + ChronoDuration::seconds(i),
                })
                .await?;
        }

        let (mut session, _rx) = bound_session(&state, alice(), 1).await;

        let expect_page = |reply: Option<ServerEvent>, len: usize, more: bool| match reply {
            Some(ServerEvent::OlderMessages(page)) => {
                assert_eq!(page.messages.len(), len);
                assert_eq!(page.more_available, more);
                page.messages
            }
            other => panic!("expected OlderMessages, got {:?}", other),
        };

        let first = expect_page(
            session.handle_event(ClientEvent::RequestOlderMessages).await,
            20,
            true,
        );
        assert_eq!(first[0].msg, "msg-45");

        let second = expect_page(
            session.handle_event(ClientEvent::RequestOlderMessages).await,
            20,
            true,
        );
        assert_eq!(second[0].msg, "msg-25");

        let third = expect_page(
            session.handle_event(ClientEvent::RequestOlderMessages).await,
            5,
            false,
        );
        assert_eq!(third[4].msg, "msg-1");

        // cursor is past the end now: empty page, still no more available
        expect_page(
            session.handle_event(ClientEvent::RequestOlderMessages).await,
            0,
            false,
        );

        Ok(())
    }

    /// Membership ids pointing at deleted rooms are skipped in listings.
    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "rooms")))]
    async fn test_room_listing_skips_deleted(pool: SqlitePool) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO room_members (user_id, room_id) VALUES (1, 777)")
            .execute(&pool)
            .await?;

        let state = Arc::new(AppState::new(pool));
        let (mut session, _) = RoomSession::establish(
            state,
            ClaimedSession {
                identity: alice(),
                room_selection: None,
            },
        )
        .await;

        match session.handle_event(ClientEvent::LoadMyRooms).await {
            Some(ServerEvent::MyRooms(rooms)) => {
                assert_eq!(rooms.len(), 2, "dangling id must be skipped");
                assert!(rooms.iter().all(|r| r.room_id != 777));
            }
            other => panic!("expected MyRooms, got {:?}", other),
        }

        match session.handle_event(ClientEvent::LoadFavoriteRooms).await {
            Some(ServerEvent::FavoriteRooms(rooms)) => {
                assert_eq!(rooms.len(), 1);
                assert_eq!(rooms[0].name, "Rust Corner");
                assert_eq!(rooms[0].cover_url, "/covers/rust.png");
            }
            other => panic!("expected FavoriteRooms, got {:?}", other),
        }

        Ok(())
    }
}
