use crate::domain::device::Device;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub struct DeviceRecord {
    pub id: i64,
    pub user_id: i64,
    pub device_uuid: String,
    pub device_name: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<DeviceRecord> for Device {
    fn from(record: DeviceRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            device_uuid: Uuid::parse_str(&record.device_uuid).unwrap_or_else(|_| Uuid::nil()),
            device_name: record.device_name,
            created_at: record.created_at,
        }
    }
}
