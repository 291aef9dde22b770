//! Polling refresh loop.
//!
//! Views that need freshness without a push channel watch a set of storage
//! keys: on every tick the raw serialized string of each key is re-read and
//! compared to the last-seen value, and only a change is reported, so idle
//! polls never force a re-parse. Bus signals and storage events are forwarded
//! as low-latency refresh hints alongside the timer.

use crate::events::EventBus;
use crate::store::{RecordStore, StorageEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const DEFAULT_PERIOD: Duration = Duration::from_millis(1000);
const REFRESH_CHANNEL_CAPACITY: usize = 64;

/// Why a consumer should reload its watched keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshReason {
    /// The raw serialized string under `key` differs from the last poll.
    Poll { key: String },
    /// A subscribed bus signal fired.
    Signal { name: String },
    /// A storage event for a watched key fired.
    Storage { key: String },
}

/// Builder for a background refresh task over a set of storage keys.
pub struct RecordWatcher {
    store: Arc<RecordStore>,
    bus: Arc<EventBus>,
    keys: Vec<String>,
    signals: Vec<String>,
    period: Duration,
}

impl RecordWatcher {
    pub fn new(store: Arc<RecordStore>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            bus,
            keys: Vec::new(),
            signals: Vec::new(),
            period: DEFAULT_PERIOD,
        }
    }

    /// Watch the raw value under `key`.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    /// Forward bus signals named `name`.
    pub fn signal(mut self, name: impl Into<String>) -> Self {
        self.signals.push(name.into());
        self
    }

    /// Poll period, typically 500–1500 ms.
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Spawn the refresh task. Dropping the returned handle tears it down.
    pub fn spawn(self) -> WatcherHandle {
        let (tx, rx) = mpsc::channel(REFRESH_CHANNEL_CAPACITY);
        let mut bus_rx = self.bus.subscribe();
        let mut storage_rx = self.store.subscribe();

        let handle = tokio::spawn(async move {
            let mut last: HashMap<String, Option<String>> = HashMap::new();
            for key in &self.keys {
                let raw = self.store.read_raw(key).await.unwrap_or_default();
                last.insert(key.clone(), raw);
            }

            let mut ticker = tokio::time::interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the baseline above already
            // covers it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for key in &self.keys {
                            let current = match self.store.read_raw(key).await {
                                Ok(value) => value,
                                Err(e) => {
                                    log::warn!("Poll read of '{}' failed: {}", key, e);
                                    continue;
                                }
                            };
                            if last.get(key) != Some(&current) {
                                last.insert(key.clone(), current);
                                if tx.send(RefreshReason::Poll { key: key.clone() }).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    signal = bus_rx.recv() => match signal {
                        Ok(signal) if self.signals.iter().any(|s| s == &signal.name) => {
                            if tx.send(RefreshReason::Signal { name: signal.name }).await.is_err() {
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            log::warn!("Refresh loop lagged {} bus signals", missed);
                        }
                        Err(broadcast::error::RecvError::Closed) => {}
                    },
                    event = storage_rx.recv() => match event {
                        Ok(StorageEvent { key }) if self.keys.contains(&key) => {
                            if tx.send(RefreshReason::Storage { key }).await.is_err() {
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            log::warn!("Refresh loop lagged {} storage events", missed);
                        }
                        Err(broadcast::error::RecvError::Closed) => {}
                    },
                }
            }
        });

        WatcherHandle { handle, rx }
    }
}

/// Live refresh task. Consumers await [`recv`](Self::recv) and reload their
/// keys on every reason; dropping the handle aborts the task.
pub struct WatcherHandle {
    handle: JoinHandle<()>,
    rx: mpsc::Receiver<RefreshReason>,
}

impl WatcherHandle {
    pub async fn recv(&mut self) -> Option<RefreshReason> {
        self.rx.recv().await
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;
    use crate::store::keys;
    use crate::test_support::test_store;
    use serde_json::json;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_storage_event_forwarded_for_watched_key() {
        let store = test_store().await;
        let bus = Arc::new(EventBus::new());

        let mut watcher = RecordWatcher::new(store.clone(), bus)
            .key(keys::ALL_REPORTS)
            .period(Duration::from_secs(60))
            .spawn();

        store.write_raw(keys::ALL_REPORTS, "[]").await.unwrap();

        let reason = timeout(Duration::from_secs(2), watcher.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            reason,
            RefreshReason::Storage {
                key: keys::ALL_REPORTS.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unwatched_key_is_ignored() {
        let store = test_store().await;
        let bus = Arc::new(EventBus::new());

        let mut watcher = RecordWatcher::new(store.clone(), bus)
            .key(keys::ALL_REPORTS)
            .period(Duration::from_secs(60))
            .spawn();

        store.write_raw("users", "[]").await.unwrap();

        assert!(timeout(Duration::from_millis(200), watcher.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_bus_signal_forwarded() {
        let store = test_store().await;
        let bus = Arc::new(EventBus::new());

        let mut watcher = RecordWatcher::new(store, bus.clone())
            .signal(events::CONSULTATIONS_UPDATED)
            .period(Duration::from_secs(60))
            .spawn();

        bus.emit(events::CONSULTATIONS_UPDATED, json!({ "userId": "v1" }));

        let reason = timeout(Duration::from_secs(2), watcher.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            reason,
            RefreshReason::Signal {
                name: events::CONSULTATIONS_UPDATED.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_poll_detects_silent_writes() {
        let store = test_store().await;
        let bus = Arc::new(EventBus::new());

        let mut watcher = RecordWatcher::new(store.clone(), bus)
            .key(keys::ALL_REPORTS)
            .period(Duration::from_millis(50))
            .spawn();

        // Let the watcher capture its baseline before mutating.
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Write through the pool directly, bypassing the storage-event channel,
        // the way a second process over the same database would.
        sqlx::query("INSERT INTO records (key, value, updated_at) VALUES (?, ?, ?)")
            .bind(keys::ALL_REPORTS)
            .bind("[{\"id\":\"r1\"}]")
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(store.pool())
            .await
            .unwrap();

        let reason = timeout(Duration::from_secs(2), watcher.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            reason,
            RefreshReason::Poll {
                key: keys::ALL_REPORTS.to_string()
            }
        );
    }
}
