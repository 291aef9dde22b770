use crate::errors::{DbError, DbResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Open (creating if missing) the SQLite database backing the record store.
pub async fn connect(db_path: &str) -> DbResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path))
        .map_err(|e| DbError::ConnectionPool(format!("Invalid database path: {}", e)))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| DbError::ConnectionPool(format!("Database connection failed: {}", e)))?;

    Ok(pool)
}

/// In-memory database for tests and throwaway sessions. A single connection
/// keeps the shared memory database alive for the pool's lifetime.
pub async fn connect_in_memory() -> DbResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| DbError::ConnectionPool(format!("Database connection failed: {}", e)))?;

    Ok(pool)
}
