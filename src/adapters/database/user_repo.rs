use crate::adapters::database::records::UserRecord;
use crate::domain::user::User;
use crate::error::Result;
use sqlx::SqliteConnection;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct UserRepository {}

impl UserRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Creates a new user row.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the insert fails (e.g. duplicate email).
    #[tracing::instrument(level = "debug", skip(self, conn, password_hash))]
    pub(crate) async fn create(
        &self,
        conn: &mut SqliteConnection,
        user_uuid: Uuid,
        email: &str,
        password_hash: &str,
    ) -> Result<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_uuid, email, password_hash) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(user_uuid.to_string())
        .bind(email)
        .bind(password_hash)
        .fetch_one(conn)
        .await?;

        Ok(record.into())
    }

    /// Finds a user by normalized email.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_email(&self, conn: &mut SqliteConnection, email: &str) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(conn)
            .await?;

        Ok(record.map(Into::into))
    }

    /// Finds a user by primary key.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_id(&self, conn: &mut SqliteConnection, user_id: i64) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(conn)
            .await?;

        Ok(record.map(Into::into))
    }

    /// Lists every user id, for the usage reconciler's per-tenant sweep.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn list_all_ids(&self, conn: &mut SqliteConnection) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM users ORDER BY id").fetch_all(conn).await?;
        Ok(ids)
    }
}
