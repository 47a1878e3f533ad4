use crate::domain::file::ClassicFile;
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, FromRow)]
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
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            filename: record.filename,
            mime: record.mime,
            size: record.size,
            file_hash: record.file_hash,
            created_at: record.created_at,
        }
    }
}
