use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::model::Wicket;

use super::EngineError;

/// Key of the shared operator pool. Taken after a wicket lock, never before.
pub const OPERATOR_POOL_KEY: &str = "operators";

/// Serializes override writes against compaction.
pub const CONFIG_KEY: &str = "config";

pub fn wicket_key(wicket: Wicket) -> String {
    format!("wicket:{}", wicket.as_str())
}

/// Named mutexes keyed by resource. Entries are created on first use and
/// kept for the life of the engine; different keys never block each other.
pub struct LockManager {
    rows: DashMap<String, Arc<Mutex<()>>>,
    timeout: Duration,
}

/// Exclusive hold on one key. Released on drop.
#[derive(Debug)]
pub struct LockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            rows: DashMap::new(),
            timeout,
        }
    }

    /// Get-or-create the row for `key`. Losing the creation race just means
    /// using the row the winner inserted.
    fn row(&self, key: &str) -> Arc<Mutex<()>> {
        if let Some(row) = self.rows.get(key) {
            return row.value().clone();
        }
        self.rows
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Wait up to the configured timeout for exclusive ownership of `key`.
    pub async fn acquire(&self, key: &str) -> Result<LockGuard, EngineError> {
        let row = self.row(key);
        let started = Instant::now();
        match tokio::time::timeout(self.timeout, row.lock_owned()).await {
            Ok(guard) => {
                let waited = started.elapsed();
                metrics::histogram!(crate::observability::LOCK_WAIT_SECONDS).record(waited.as_secs_f64());
                debug!(key, waited_ms = waited.as_millis() as u64, "lock acquired");
                Ok(LockGuard {
                    key: key.to_string(),
                    _guard: guard,
                })
            }
            Err(_) => {
                metrics::counter!(crate::observability::LOCK_TIMEOUTS_TOTAL).increment(1);
                warn!(key, timeout_ms = self.timeout.as_millis() as u64, "lock acquisition timed out");
                Err(EngineError::Contention(key.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = LockManager::new(Duration::from_millis(50));
        let held = locks.acquire("wicket:OUTDOOR_TURF").await.unwrap();
        assert_eq!(held.key(), "wicket:OUTDOOR_TURF");

        let second = locks.acquire("wicket:OUTDOOR_TURF").await;
        assert!(matches!(second, Err(EngineError::Contention(_))));
        assert!(second.unwrap_err().is_retryable());

        drop(held);
        assert!(locks.acquire("wicket:OUTDOOR_TURF").await.is_ok());
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = LockManager::new(Duration::from_millis(50));
        let _a = locks.acquire(&wicket_key(Wicket::IndoorAstroTurf)).await.unwrap();
        let _b = locks.acquire(&wicket_key(Wicket::OutdoorCement)).await.unwrap();
        let c = locks.acquire(OPERATOR_POOL_KEY).await.unwrap();
        assert_eq!(c.key(), OPERATOR_POOL_KEY);
    }

    #[tokio::test]
    async fn waiter_gets_lock_after_release() {
        let locks = Arc::new(LockManager::new(Duration::from_secs(5)));
        let held = locks.acquire("k").await.unwrap();

        let l2 = locks.clone();
        let waiter = tokio::spawn(async move { l2.acquire("k").await.map(|g| g.key().to_string()) });

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert_eq!(waiter.await.unwrap().unwrap(), "k");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_first_use_shares_one_row() {
        let locks = Arc::new(LockManager::new(Duration::from_secs(1)));
        let inside = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let l = locks.clone();
            let inside = inside.clone();
            handles.push(tokio::spawn(async move {
                let _g = l.acquire("shared").await.unwrap();
                // Two rows for one key would let two holders in at once.
                let holders = inside.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                assert_eq!(holders, 0);
                tokio::task::yield_now().await;
                inside.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }
}
