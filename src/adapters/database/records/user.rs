use crate::domain::user::User;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub user_uuid: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            user_uuid: Uuid::parse_str(&record.user_uuid).unwrap_or_else(|_| Uuid::nil()),
            email: record.email,
            password_hash: record.password_hash,
            created_at: record.created_at,
        }
    }
}
