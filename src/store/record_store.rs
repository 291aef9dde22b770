use crate::errors::{DbError, DomainError, DomainResult};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

/// Capacity of the storage-event channel. A subscriber that falls this far
/// behind loses events and must rely on its polling loop.
const STORAGE_CHANNEL_CAPACITY: usize = 256;

/// Emitted after every committed write or removal, keyed by the storage key
/// that changed. This is the cross-view counterpart of the in-process event
/// bus: any handle over the same store observes every other writer.
#[derive(Debug, Clone)]
pub struct StorageEvent {
    pub key: String,
}

/// Keyed collections of serialized records.
///
/// Each key holds one JSON document, usually an array of entities. There is
/// no schema enforcement and no locking: concurrent writers race and the
/// last writer wins. Readers must tolerate malformed documents, which decode
/// to an empty collection rather than an error.
pub struct RecordStore {
    pool: SqlitePool,
    storage_tx: broadcast::Sender<StorageEvent>,
}

impl RecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        let (storage_tx, _) = broadcast::channel(STORAGE_CHANNEL_CAPACITY);
        Self { pool, storage_tx }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Subscribe to change events for every key in this store.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.storage_tx.subscribe()
    }

    /// The raw serialized string under `key`, if any. Polling loops diff this
    /// value to decide whether a re-parse is worth it.
    pub async fn read_raw(&self, key: &str) -> DomainResult<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM records WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::Database(DbError::from(e)))?;

        Ok(value)
    }

    /// Upsert the raw serialized string under `key`. Last writer wins.
    pub async fn write_raw(&self, key: &str, value: &str) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO records (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?;

        self.notify(key);
        Ok(())
    }

    /// Remove `key` entirely. Missing keys are not an error.
    pub async fn remove(&self, key: &str) -> DomainResult<()> {
        sqlx::query("DELETE FROM records WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))?;

        self.notify(key);
        Ok(())
    }

    /// Read the collection stored under `key`. A missing key or a document
    /// that fails to decode yields an empty collection; the decode failure is
    /// logged and otherwise swallowed so a corrupted key never takes a view
    /// down with it.
    pub async fn read_list<T: DeserializeOwned>(&self, key: &str) -> DomainResult<Vec<T>> {
        match self.read_raw(key).await? {
            None => Ok(Vec::new()),
            Some(raw) => match serde_json::from_str::<Vec<T>>(&raw) {
                Ok(items) => Ok(items),
                Err(e) => {
                    log::warn!("Discarding malformed collection under '{}': {}", key, e);
                    Ok(Vec::new())
                }
            },
        }
    }

    /// Serialize and store a collection under `key`.
    pub async fn write_list<T: Serialize>(&self, key: &str, items: &[T]) -> DomainResult<()> {
        let raw = serde_json::to_string(items)
            .map_err(|e| DomainError::Internal(format!("Failed to serialize '{}': {}", key, e)))?;
        self.write_raw(key, &raw).await
    }

    /// Read a single value (session record, watermark) under `key`.
    pub async fn read_value<T: DeserializeOwned>(&self, key: &str) -> DomainResult<Option<T>> {
        match self.read_raw(key).await? {
            None => Ok(None),
            Some(raw) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    log::warn!("Discarding malformed value under '{}': {}", key, e);
                    Ok(None)
                }
            },
        }
    }

    /// Serialize and store a single value under `key`.
    pub async fn write_value<T: Serialize>(&self, key: &str, value: &T) -> DomainResult<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| DomainError::Internal(format!("Failed to serialize '{}': {}", key, e)))?;
        self.write_raw(key, &raw).await
    }

    fn notify(&self, key: &str) {
        // Delivery is best-effort: with no live subscribers the event is dropped.
        let _ = self.storage_tx.send(StorageEvent {
            key: key.to_string(),
        });
    }
}
