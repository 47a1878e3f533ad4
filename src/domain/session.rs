use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims embedded in the session token. The `device_uuid` claim is the core
/// anti-token-theft invariant: every authenticated request must present the
/// same device uuid in `X-Device-UUID` that was bound at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub user_uuid: Uuid,
    pub email: String,
    pub device_uuid: String,
    pub exp: usize,
}

impl Claims {
    #[must_use]
    pub fn new(user_id: i64, user_uuid: Uuid, email: String, device_uuid: String, exp: usize) -> Self {
        Self { sub: user_id, user_uuid, email, device_uuid, exp }
    }
}

/// An authenticated, device-bound session returned from `/api/login`.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
}
