use time::OffsetDateTime;

/// Maximum size of a per-device opaque state blob.
pub const MAX_DEVICE_STATE_BYTES: usize = 100 * 1024;

/// A `(user_id, device_uuid) -> state_json` row. The server never interprets
/// `state_json`; it only stores and returns it verbatim.
#[derive(Debug, Clone)]
pub struct CloudDeviceState {
    pub user_id: i64,
    pub device_uuid: String,
    pub state_json: String,
    pub updated_at: OffsetDateTime,
}
