use crate::adapters::database::records::DeviceRecord;
use crate::domain::device::Device;
use crate::error::Result;
use sqlx::SqliteConnection;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct DeviceRepository {}

impl DeviceRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Inserts a device, or returns the existing row if this `(user_id, device_uuid)`
    /// pair is already registered.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn upsert(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        device_uuid: Uuid,
        device_name: Option<&str>,
    ) -> Result<Device> {
        let record = sqlx::query_as::<_, DeviceRecord>(
            r"
            INSERT INTO devices (user_id, device_uuid, device_name)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id, device_uuid) DO UPDATE SET device_name = COALESCE(excluded.device_name, devices.device_name)
            RETURNING *
            ",
        )
        .bind(user_id)
        .bind(device_uuid.to_string())
        .bind(device_name)
        .fetch_one(conn)
        .await?;

        Ok(record.into())
    }

    /// Finds a device by its device UUID, scoped to a user.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_uuid(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        device_uuid: Uuid,
    ) -> Result<Option<Device>> {
        let record = sqlx::query_as::<_, DeviceRecord>(
            "SELECT * FROM devices WHERE user_id = ? AND device_uuid = ?",
        )
        .bind(user_id)
        .bind(device_uuid.to_string())
        .fetch_optional(conn)
        .await?;

        Ok(record.map(Into::into))
    }

    /// Lists every device registered to a user.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn list_for_user(&self, conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<Device>> {
        let records = sqlx::query_as::<_, DeviceRecord>("SELECT * FROM devices WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(conn)
            .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }
}
