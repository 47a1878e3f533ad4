use time::OffsetDateTime;
use uuid::Uuid;

/// Namespace used to derive a deterministic device UUID from `email:password`.
///
/// Fixed so that the same credentials always yield the same device UUID across
/// app reinstalls on the same physical device profile.
pub const DEVICE_UUID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6a, 0x9c, 0x3b, 0x11, 0x2f, 0x77, 0x4a, 0x9e, 0x93, 0x0d, 0x8e, 0x41, 0x2c, 0x55, 0x70, 0xf3,
]);

/// Derives the client-side deterministic device UUID from `lower(email) + ":" + password`.
///
/// Run on the client; the server never recomputes this, only stores and checks it.
#[must_use]
pub fn derive_device_uuid(email: &str, password: &str) -> Uuid {
    let name = format!("{}:{}", crate::domain::user::normalize_email(email), password);
    Uuid::new_v5(&DEVICE_UUID_NAMESPACE, name.as_bytes())
}

#[derive(Debug, Clone)]
pub struct Device {
    pub id: i64,
    pub user_id: i64,
    pub device_uuid: Uuid,
    pub device_name: Option<String>,
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_device_uuid("Alice@Example.com", "hunter2");
        let b = derive_device_uuid(" alice@example.com ", "hunter2");
        assert_eq!(a, b);
    }

    #[test]
    fn derivation_differs_by_password() {
        let a = derive_device_uuid("alice@example.com", "hunter2");
        let b = derive_device_uuid("alice@example.com", "hunter3");
        assert_ne!(a, b);
    }
}
