//! RoomRepository - room records and their cached last-message summary

use sqlx::{Error, SqlitePool};
use tracing::{debug, info, instrument};

use crate::dtos::CreateRoomDTO;
use crate::entities::{LastMessage, Room};

pub struct RoomRepository {
    connection_pool: SqlitePool,
}

impl RoomRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Creates a room. Name uniqueness is enforced by the UNIQUE constraint;
    /// a duplicate surfaces as a database error the caller maps to Conflict.
    #[instrument(skip(self, data), fields(name = %data.name))]
    pub async fn create(&self, data: &CreateRoomDTO) -> Result<Room, Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO rooms (name, admin_id, description, cover_url, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&data.name)
        .bind(data.admin_id)
        .bind(&data.description)
        .bind(&data.cover_url)
        .bind(chrono::Utc::now())
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_rowid();
        info!(room_id = new_id, "Room created");

        self.find_by_id(&new_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, room_id: &i64) -> Result<Option<Room>, Error> {
        let room = sqlx::query_as::<_, Room>(
            r#"
            SELECT room_id, name, admin_id, description, cover_url,
                   last_message_text, last_message_sender, last_message_date,
                   created_at
            FROM rooms
            WHERE room_id = ?
            "#,
        )
        .bind(room_id)
        .fetch_optional(&self.connection_pool)
        .await?;

        Ok(room)
    }

    #[instrument(skip(self))]
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Room>, Error> {
        let room = sqlx::query_as::<_, Room>(
            r#"
            SELECT room_id, name, admin_id, description, cover_url,
                   last_message_text, last_message_sender, last_message_date,
                   created_at
            FROM rooms
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.connection_pool)
        .await?;

        Ok(room)
    }

    /// Window of rooms for listing endpoints, newest-created first.
    #[instrument(skip(self))]
    pub async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Room>, Error> {
        let rooms = sqlx::query_as::<_, Room>(
            r#"
            SELECT room_id, name, admin_id, description, cover_url,
                   last_message_text, last_message_sender, last_message_date,
                   created_at
            FROM rooms
            ORDER BY created_at DESC, room_id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.connection_pool)
        .await?;

        Ok(rooms)
    }

    /// Overwrites the cached last-message summary. Fails with RowNotFound if
    /// the room disappeared in the meantime.
    #[instrument(skip(self, summary), fields(room_id = %room_id))]
    pub async fn update_last_message(
        &self,
        room_id: &i64,
        summary: &LastMessage,
    ) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE rooms
            SET last_message_text = ?, last_message_sender = ?, last_message_date = ?
            WHERE room_id = ?
            "#,
        )
        .bind(&summary.text)
        .bind(&summary.sender)
        .bind(summary.date)
        .bind(room_id)
        .execute(&self.connection_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        debug!("Last-message summary updated");
        Ok(())
    }
}
