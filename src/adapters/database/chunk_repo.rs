use crate::adapters::database::records::ChunkRecord;
use crate::domain::chunk::CloudChunk;
use crate::error::Result;
use sqlx::SqliteConnection;

#[derive(Clone, Debug, Default)]
pub struct ChunkRepository {}

impl ChunkRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Records a chunk, or is a no-op if the same content-addressed id already
    /// exists for this user (cross-device dedup at the chunk level).
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn upsert(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        chunk_id: &str,
        size: i64,
    ) -> Result<CloudChunk> {
        let record = sqlx::query_as::<_, ChunkRecord>(
            r"
            INSERT INTO cloud_chunks (user_id, chunk_id, size)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id, chunk_id) DO UPDATE SET user_id = excluded.user_id
            RETURNING *
            ",
        )
        .bind(user_id)
        .bind(chunk_id)
        .bind(size)
        .fetch_one(conn)
        .await?;

        Ok(record.into())
    }

    /// Checks whether a chunk is already stored for this user.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn exists(&self, conn: &mut SqliteConnection, user_id: i64, chunk_id: &str) -> Result<bool> {
        let record = sqlx::query_as::<_, ChunkRecord>("SELECT * FROM cloud_chunks WHERE user_id = ? AND chunk_id = ?")
            .bind(user_id)
            .bind(chunk_id)
            .fetch_optional(conn)
            .await?;

        Ok(record.is_some())
    }

    /// Deletes a chunk owned by a user, returning its size for quota release.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete(&self, conn: &mut SqliteConnection, user_id: i64, chunk_id: &str) -> Result<Option<i64>> {
        let record = sqlx::query_as::<_, ChunkRecord>(
            "DELETE FROM cloud_chunks WHERE user_id = ? AND chunk_id = ? RETURNING *",
        )
        .bind(user_id)
        .bind(chunk_id)
        .fetch_optional(conn)
        .await?;

        Ok(record.map(|r| r.size))
    }

    /// Sums the storage footprint of every chunk owned by a user.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn total_size_for_user(&self, conn: &mut SqliteConnection, user_id: i64) -> Result<i64> {
        let total: Option<i64> = sqlx::query_scalar("SELECT SUM(size) FROM cloud_chunks WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(conn)
            .await?;

        Ok(total.unwrap_or(0))
    }

    /// Deletes every chunk owned by a user, for tenant purge.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete_all_for_user(&self, conn: &mut SqliteConnection, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cloud_chunks WHERE user_id = ?").bind(user_id).execute(conn).await?;

        Ok(result.rows_affected())
    }

    /// Lists every chunk id indexed for a user, for the usage reconciler's
    /// disk-vs-database diff.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn list_ids_for_user(&self, conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT chunk_id FROM cloud_chunks WHERE user_id = ?").bind(user_id).fetch_all(conn).await?;

        Ok(ids)
    }
}
