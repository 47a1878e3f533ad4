use crate::domain::chunk::CloudChunk;
use crate::domain::device::Device;
use crate::domain::device_state::CloudDeviceState;
use crate::domain::file::ClassicFile;
use crate::domain::plan::{PlanStatus, UserPlan};
use crate::domain::user::User;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Raw row shapes as `sqlx` decodes them. UUIDs are stored as their canonical
/// string form (SQLite has no native UUID type), so every record keeps them
/// as `String` and the `From` impl below parses them back — a column written
/// by this same process is trusted to parse.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub user_uuid: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

impl From<UserRecord> for User {
    fn from(r: UserRecord) -> Self {
        Self {
            id: r.id,
            user_uuid: Uuid::parse_str(&r.user_uuid).expect("user_uuid column must be a valid uuid"),
            email: r.email,
            password_hash: r.password_hash,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DeviceRecord {
    pub id: i64,
    pub user_id: i64,
    pub device_uuid: String,
    pub device_name: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<DeviceRecord> for Device {
    fn from(r: DeviceRecord) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            device_uuid: Uuid::parse_str(&r.device_uuid).expect("device_uuid column must be a valid uuid"),
            device_name: r.device_name,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PlanRecord {
    pub user_id: i64,
    pub plan_gb: Option<i64>,
    pub status: String,
    pub trial_until: Option<i64>,
    pub expires_at: Option<i64>,
    pub grace_until: Option<i64>,
    pub deleted_at: Option<i64>,
    pub external_app_user_id: Option<String>,
}

impl From<PlanRecord> for UserPlan {
    fn from(r: PlanRecord) -> Self {
        Self {
            user_id: r.user_id,
            plan_gb: r.plan_gb,
            status: r.status.parse::<PlanStatus>().expect("status column must be a known plan status"),
            trial_until: r.trial_until,
            expires_at: r.expires_at,
            grace_until: r.grace_until,
            deleted_at: r.deleted_at,
            external_app_user_id: r.external_app_user_id,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FileRecord {
    pub id: i64,
    pub user_id: i64,
    pub filename: String,
    pub mime: Option<String>,
    pub size: i64,
    pub file_hash: String,
    pub created_at: OffsetDateTime,
}

impl From<FileRecord> for ClassicFile {
    fn from(r: FileRecord) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            filename: r.filename,
            mime: r.mime,
            size: r.size,
            file_hash: r.file_hash,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ChunkRecord {
    pub user_id: i64,
    pub chunk_id: String,
    pub size: i64,
}

impl From<ChunkRecord> for CloudChunk {
    fn from(r: ChunkRecord) -> Self {
        Self { user_id: r.user_id, chunk_id: r.chunk_id, size: r.size }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DeviceStateRecord {
    pub user_id: i64,
    pub device_uuid: String,
    pub state_json: String,
    pub updated_at: OffsetDateTime,
}

impl From<DeviceStateRecord> for CloudDeviceState {
    fn from(r: DeviceStateRecord) -> Self {
        Self { user_id: r.user_id, device_uuid: r.device_uuid, state_json: r.state_json, updated_at: r.updated_at }
    }
}
