//! UserRepository - identity resolution and the read-only membership lists

use sqlx::{Error, SqlitePool};
use tracing::{debug, instrument};

use crate::entities::User;

pub struct UserRepository {
    connection_pool: SqlitePool,
}

impl UserRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Resolves a user id to a live identity. `None` means the user has been
    /// deleted since the referencing record was written.
    #[instrument(skip(self))]
    pub async fn find_by_id(&self, user_id: &i64) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, username, avatar_url FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.connection_pool)
        .await?;

        Ok(user)
    }

    /// Room ids the user is a member of. Ids may point at rooms that no
    /// longer exist; resolution happens at listing time.
    #[instrument(skip(self))]
    pub async fn my_room_ids(&self, user_id: &i64) -> Result<Vec<i64>, Error> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT room_id FROM room_members WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.connection_pool)
                .await?;

        debug!(count = ids.len(), "Membership list loaded");
        Ok(ids)
    }

    /// Room ids the user has marked as favorite.
    #[instrument(skip(self))]
    pub async fn favorite_room_ids(&self, user_id: &i64) -> Result<Vec<i64>, Error> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT room_id FROM favorite_rooms WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.connection_pool)
                .await?;

        debug!(count = ids.len(), "Favorite list loaded");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    /// Fixture users resolve; unknown ids come back as None.
    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users")))]
    async fn test_find_by_id(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = UserRepository::new(pool);

        let alice = repo.find_by_id(&1).await?;
        assert_eq!(alice.unwrap().username, "alice");

        let missing = repo.find_by_id(&999).await?;
        assert!(missing.is_none());

        Ok(())
    }

    /// Membership lists are returned as-is, dangling room ids included.
    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "rooms")))]
    async fn test_membership_lists(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = UserRepository::new(pool.clone());

        // 777 points at no room; listing code is expected to skip it later
        sqlx::query("INSERT INTO room_members (user_id, room_id) VALUES (1, 777)")
            .execute(&pool)
            .await?;

        let mut mine = repo.my_room_ids(&1).await?;
        mine.sort_unstable();
        assert_eq!(mine, vec![1, 2, 777]);

        assert_eq!(repo.favorite_room_ids(&1).await?, vec![2]);
        assert_eq!(repo.my_room_ids(&2).await?, vec![1]);
        assert!(repo.my_room_ids(&3).await?.is_empty());

        Ok(())
    }
}
