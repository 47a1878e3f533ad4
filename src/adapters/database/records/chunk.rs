use crate::domain::chunk::CloudChunk;
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct ChunkRecord {
    pub user_id: i64,
    pub chunk_id: String,
    pub size: i64,
}

impl From<ChunkRecord> for CloudChunk {
    fn from(record: ChunkRecord) -> Self {
        Self {
            user_id: record.user_id,
            chunk_id: record.chunk_id,
            size: record.size,
        }
    }
}
