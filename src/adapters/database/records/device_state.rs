use crate::domain::device_state::CloudDeviceState;
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, FromRow)]
pub struct DeviceStateRecord {
    pub user_id: i64,
    pub device_uuid: String,
    pub state_json: String,
    pub updated_at: OffsetDateTime,
}

impl From<DeviceStateRecord> for CloudDeviceState {
    fn from(record: DeviceStateRecord) -> Self {
        Self {
            user_id: record.user_id,
            device_uuid: record.device_uuid,
            state_json: record.state_json,
            updated_at: record.updated_at,
        }
    }
}
