use crate::adapters::database::records::FileRecord;
use crate::domain::file::ClassicFile;
use crate::error::Result;
use sqlx::SqliteConnection;

#[derive(Clone, Debug, Default)]
pub struct FileRepository {}

impl FileRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Records a newly stored classic file.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn create(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        filename: &str,
        mime: Option<&str>,
        size: i64,
        file_hash: &str,
    ) -> Result<ClassicFile> {
        let record = sqlx::query_as::<_, FileRecord>(
            "INSERT INTO files (user_id, filename, mime, size, file_hash) VALUES (?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(user_id)
        .bind(filename)
        .bind(mime)
        .bind(size)
        .bind(file_hash)
        .fetch_one(conn)
        .await?;

        Ok(record.into())
    }

    /// Finds a file owned by a user, by filename.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_filename(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        filename: &str,
    ) -> Result<Option<ClassicFile>> {
        let record = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE user_id = ? AND filename = ?")
            .bind(user_id)
            .bind(filename)
            .fetch_optional(conn)
            .await?;

        Ok(record.map(Into::into))
    }

    /// Finds a file owned by a user, by content hash.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_hash(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        file_hash: &str,
    ) -> Result<Option<ClassicFile>> {
        let record = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE user_id = ? AND file_hash = ?")
            .bind(user_id)
            .bind(file_hash)
            .fetch_optional(conn)
            .await?;

        Ok(record.map(Into::into))
    }

    /// Lists every file owned by a user, most recent first.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn list_for_user(&self, conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<ClassicFile>> {
        let records = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE user_id = ? ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(conn)
            .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Deletes a file owned by a user, returning its size so the caller can
    /// release the matching quota reservation.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        filename: &str,
    ) -> Result<Option<i64>> {
        let record = sqlx::query_as::<_, FileRecord>("DELETE FROM files WHERE user_id = ? AND filename = ? RETURNING *")
            .bind(user_id)
            .bind(filename)
            .fetch_optional(conn)
            .await?;

        Ok(record.map(|r| r.size))
    }

    /// Sums the storage footprint of every classic file owned by a user, used
    /// by the usage reconciler to correct quota drift.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn total_size_for_user(&self, conn: &mut SqliteConnection, user_id: i64) -> Result<i64> {
        let total: Option<i64> = sqlx::query_scalar("SELECT SUM(size) FROM files WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(conn)
            .await?;

        Ok(total.unwrap_or(0))
    }

    /// Deletes every file owned by a user, for tenant purge.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete_all_for_user(&self, conn: &mut SqliteConnection, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM files WHERE user_id = ?")
            .bind(user_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}
