/// A content-addressed StealthCloud ciphertext chunk row.
#[derive(Debug, Clone)]
pub struct CloudChunk {
    pub user_id: i64,
    pub chunk_id: String,
    pub size: i64,
}

/// A 64-character lowercase hex SHA-256 digest, as used for chunk ids.
#[must_use]
pub fn is_valid_chunk_id(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}
