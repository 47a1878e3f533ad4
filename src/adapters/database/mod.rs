pub mod chunk_repo;
pub mod device_repo;
pub mod device_state_repo;
pub mod file_repo;
pub mod plan_repo;
pub mod records;
pub mod user_repo;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub type DbPool = Pool<Sqlite>;

/// Opens the SQLite database with the durability settings every background
/// worker and the main pool agree on: WAL journal mode, `NORMAL` synchronous,
/// and a 5s busy timeout so concurrent writers back off instead of failing
/// immediately.
///
/// # Errors
/// Returns `sqlx::Error` if the connection fails.
#[tracing::instrument]
pub async fn init_pool(db_path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(5_000))
        .disable_statement_logging();

    SqlitePoolOptions::new().max_connections(20).connect_with(options).await
}
