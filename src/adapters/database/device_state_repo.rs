use crate::adapters::database::records::DeviceStateRecord;
use crate::domain::device_state::CloudDeviceState;
use crate::error::Result;
use sqlx::SqliteConnection;

#[derive(Clone, Debug, Default)]
pub struct DeviceStateRepository {}

impl DeviceStateRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Overwrites the opaque per-device sync state blob.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn, state_json))]
    pub(crate) async fn upsert(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        device_uuid: &str,
        state_json: &str,
    ) -> Result<CloudDeviceState> {
        let record = sqlx::query_as::<_, DeviceStateRecord>(
            r"
            INSERT INTO device_states (user_id, device_uuid, state_json, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT (user_id, device_uuid) DO UPDATE SET
                state_json = excluded.state_json,
                updated_at = CURRENT_TIMESTAMP
            RETURNING *
            ",
        )
        .bind(user_id)
        .bind(device_uuid)
        .bind(state_json)
        .fetch_one(conn)
        .await?;

        Ok(record.into())
    }

    /// Fetches the sync state blob for a device.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        device_uuid: &str,
    ) -> Result<Option<CloudDeviceState>> {
        let record = sqlx::query_as::<_, DeviceStateRecord>(
            "SELECT * FROM device_states WHERE user_id = ? AND device_uuid = ?",
        )
        .bind(user_id)
        .bind(device_uuid)
        .fetch_optional(conn)
        .await?;

        Ok(record.map(Into::into))
    }

    /// Deletes every device-state row owned by a user, for tenant purge.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete_all_for_user(&self, conn: &mut SqliteConnection, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM device_states WHERE user_id = ?").bind(user_id).execute(conn).await?;

        Ok(result.rows_affected())
    }
}
