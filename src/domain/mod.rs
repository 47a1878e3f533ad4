pub mod chunk;
pub mod device;
pub mod device_state;
pub mod file;
pub mod manifest;
pub mod plan;
pub mod session;
pub mod user;

/// Current time in milliseconds since the Unix epoch, the wire format every
/// subscription/plan timestamp in this system uses.
#[must_use]
pub fn now_millis() -> i64 {
    let now = time::OffsetDateTime::now_utc();
    (now.unix_timestamp_nanos() / 1_000_000) as i64
}
