//! RoomHub - per-room broadcast fan-out
//!
//! One tokio broadcast channel per room with at least one live subscriber.
//! Delivery is best-effort against the membership snapshot at send time: a
//! connection that unsubscribes mid-emit simply drops its receiver, and a
//! connection joining after the send starts sees only later events.

use crate::dtos::ServerEvent;
use crate::ws::BROADCAST_CHANNEL_CAPACITY;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::SendError;
use tokio::sync::broadcast::{Receiver, Sender};
use tracing::{info, instrument, warn};

pub struct RoomHub {
    channels: DashMap<i64, Sender<Arc<ServerEvent>>>,
}

impl RoomHub {
    pub fn new() -> Self {
        RoomHub {
            channels: DashMap::new(),
        }
    }

    /// Joins a room's broadcast group. The channel is created lazily on the
    /// first subscriber; dropping the returned receiver leaves the group.
    #[instrument(skip(self))]
    pub fn subscribe(&self, room_id: &i64) -> Receiver<Arc<ServerEvent>> {
        // entry() holds the shard lock across create-and-subscribe, so two
        // first subscribers racing on a fresh room land on the same channel.
        self.channels
            .entry(*room_id)
            .or_insert_with(|| {
                info!("Creating broadcast channel for room");
                // Arc<ServerEvent> so receivers share one rendered event
                // instead of cloning the payload per member.
                broadcast::channel::<Arc<ServerEvent>>(BROADCAST_CHANNEL_CAPACITY).0
            })
            .subscribe()
    }

    /// Emits an event to every connection currently subscribed to the room.
    /// Returns how many receivers got it. A room with no subscribers has its
    /// channel pruned.
    #[instrument(skip(self, event))]
    pub fn emit(
        &self,
        room_id: &i64,
        event: Arc<ServerEvent>,
    ) -> Result<usize, SendError<Arc<ServerEvent>>> {
        if let Some(entry) = self.channels.get(room_id) {
            match entry.send(event.clone()) {
                Ok(n) => {
                    info!(receivers = n, "Event broadcast to room");
                    Ok(n)
                }
                Err(e) => {
                    warn!("No active receivers, removing room channel");
                    drop(entry); // release the map guard before removal
                    self.channels.remove(room_id);
                    Err(e)
                }
            }
        } else {
            warn!("Emit to room with no broadcast group");
            Err(SendError(event))
        }
    }
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new()
    }
}
