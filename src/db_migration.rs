use crate::errors::{DbError, DbResult};
use sqlx::SqlitePool;

// Embed all migration SQL files at compile time
const MIGRATION_RECORDS: &str = include_str!("../migrations/20250601000000_records.sql");

// List of migrations with their names and SQL content
const MIGRATIONS: &[(&str, &str)] = &[("20250601000000_records.sql", MIGRATION_RECORDS)];

/// Initialize the database schema, applying any migrations that have not run yet.
pub async fn initialize_database(pool: &SqlitePool) -> DbResult<()> {
    create_migrations_table(pool).await?;

    for (name, sql) in MIGRATIONS {
        if migration_applied(pool, name).await? {
            continue;
        }

        log::info!("Applying migration {}", name);
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| DbError::Migration(format!("{} failed: {}", name, e)))?;

        sqlx::query("INSERT INTO schema_migrations (name, applied_at) VALUES (?, ?)")
            .bind(name)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(pool)
            .await
            .map_err(|e| DbError::Migration(format!("Recording {} failed: {}", name, e)))?;
    }

    Ok(())
}

async fn create_migrations_table(pool: &SqlitePool) -> DbResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| DbError::Migration(format!("Failed to create migrations table: {}", e)))?;

    Ok(())
}

async fn migration_applied(pool: &SqlitePool, name: &str) -> DbResult<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations WHERE name = ?")
            .bind(name)
            .fetch_one(pool)
            .await
            .map_err(DbError::Sqlx)?;

    Ok(count > 0)
}
