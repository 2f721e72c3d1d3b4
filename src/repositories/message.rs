//! MessageRepository - append-only message store

use sqlx::{Error, SqlitePool};
use tracing::{debug, instrument};

use crate::dtos::CreateMessageDTO;
use crate::entities::Message;

pub struct MessageRepository {
    connection_pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Appends one message and returns it with its database-assigned id.
    /// Rows are never updated or deleted by this crate afterwards.
    #[instrument(skip(self, data), fields(room_id = %data.room_id, sender_id = %data.sender_id))]
    pub async fn append(&self, data: &CreateMessageDTO) -> Result<Message, Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages
                (room_id, sender_id, sender_name, addressee_id, addressee_name, body, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(data.room_id)
        .bind(data.sender_id)
        .bind(&data.sender_name)
        .bind(data.addressee_id)
        .bind(&data.addressee_name)
        .bind(&data.body)
        .bind(data.created_at)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_rowid();
        debug!(message_id = new_id, "Message appended");

        Ok(Message {
            message_id: new_id,
            room_id: data.room_id,
            sender_id: data.sender_id,
            sender_name: data.sender_name.clone(),
            addressee_id: data.addressee_id,
            addressee_name: data.addressee_name.clone(),
            body: data.body.clone(),
            created_at: data.created_at,
        })
    }

    /// Fresh count of all messages in a room.
    #[instrument(skip(self))]
    pub async fn count_by_room(&self, room_id: &i64) -> Result<i64, Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE room_id = ?")
            .bind(room_id)
            .fetch_one(&self.connection_pool)
            .await?;

        Ok(count)
    }

    /// One window of a room's history, `offset` messages back from the
    /// newest, newest-first. Equal timestamps are tie-broken by id so
    /// consecutive windows never overlap.
    #[instrument(skip(self))]
    pub async fn find_page(
        &self,
        room_id: &i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Message>, Error> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT message_id, room_id, sender_id, sender_name,
                   addressee_id, addressee_name, body, created_at
            FROM messages
            WHERE room_id = ?
            ORDER BY created_at DESC, message_id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(room_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.connection_pool)
        .await?;

        debug!(count = messages.len(), "History window loaded");
        Ok(messages)
    }
}
