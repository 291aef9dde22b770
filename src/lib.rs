use std::time::Duration;

// Public modules
pub mod auth;
pub mod domains;
pub mod errors;
pub mod events;
pub mod globals;
pub mod store;
pub mod types;
pub mod validation;
pub mod watch;

// Private modules
mod database;
mod db_migration;

#[cfg(test)]
mod test_support;

// Entry point for initialization
/// Initialize the library with the given database path (`":memory:"` for a
/// throwaway store) and an optional artificial login/registration latency.
/// This function must be called before any accessor in `globals`.
pub async fn initialize(db_path: &str, simulated_latency: Option<Duration>) -> errors::ServiceResult<()> {
    globals::initialize(db_path, simulated_latency).await
}

/// Get a reference to the SQLite connection pool
/// This is primarily for internal use
pub fn get_db_pool() -> errors::ServiceResult<sqlx::SqlitePool> {
    globals::get_db_pool()
}
