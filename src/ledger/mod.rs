/// Usage ledger.
///
/// Counts uploads, downloads, bytes and errors. Every mutation writes the
/// full snapshot through to a [`KeyValueStore`] before returning. The
/// counters are telemetry: a failed load resets them to zero and a failed
/// write is logged and counted, never returned to the caller.
pub mod store;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

pub use store::{FileStore, KeyValueStore, MemoryStore};

/// Key under which the snapshot is persisted.
pub const STATS_KEY: &str = "content_store_stats";

/// Persisted counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub upload_count: u64,
    pub download_count: u64,
    pub error_count: u64,
    pub total_bytes: u64,
}

impl UsageStats {
    /// `round(100 * (uploads - errors) / uploads)`, or 100 with no uploads.
    ///
    /// Errors include failed retrievals, so the value is negative whenever
    /// errors outnumber uploads (1 upload, 4 errors gives -300). It is not
    /// clamped.
    pub fn success_rate(&self) -> i64 {
        if self.upload_count == 0 {
            return 100;
        }
        let ok = self.upload_count as f64 - self.error_count as f64;
        (100.0 * ok / self.upload_count as f64).round() as i64
    }
}

/// Counters plus the derived success rate and ledger health, as returned
/// to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    #[serde(flatten)]
    pub stats: UsageStats,
    pub success_rate: i64,
    /// Snapshot writes that failed since the ledger was loaded.
    pub persist_failures: u64,
    pub load_status: LoadStatus,
}

/// What happened when the ledger read its prior snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStatus {
    /// Nothing stored yet.
    Fresh,
    /// A prior snapshot was restored.
    Restored,
    /// The stored snapshot was unreadable; counters start at zero.
    Reset { reason: String },
}

pub struct UsageLedger {
    store: Arc<dyn KeyValueStore>,
    key: String,
    stats: Mutex<UsageStats>,
    persist_failures: AtomicU64,
    load_status: LoadStatus,
}

impl UsageLedger {
    /// Load the snapshot stored under [`STATS_KEY`].
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        Self::load_with_key(store, STATS_KEY).await
    }

    pub async fn load_with_key(store: Arc<dyn KeyValueStore>, key: &str) -> Self {
        let (stats, load_status) = match read_snapshot(store.as_ref(), key).await {
            Ok(Some(stats)) => (stats, LoadStatus::Restored),
            Ok(None) => (UsageStats::default(), LoadStatus::Fresh),
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable usage stats");
                (
                    UsageStats::default(),
                    LoadStatus::Reset {
                        reason: e.to_string(),
                    },
                )
            }
        };

        debug!(key, ?stats, ?load_status, "Usage ledger loaded");

        Self {
            store,
            key: key.to_string(),
            stats: Mutex::new(stats),
            persist_failures: AtomicU64::new(0),
            load_status,
        }
    }

    /// Count one upload of `byte_size` bytes. Returns whether the snapshot
    /// was persisted.
    pub async fn record_upload(&self, byte_size: u64) -> bool {
        self.mutate(|s| {
            s.upload_count += 1;
            s.total_bytes = s.total_bytes.saturating_add(byte_size);
        })
        .await
    }

    pub async fn record_download(&self) -> bool {
        self.mutate(|s| s.download_count += 1).await
    }

    pub async fn record_error(&self) -> bool {
        self.mutate(|s| s.error_count += 1).await
    }

    /// Zero all counters.
    pub async fn reset(&self) -> bool {
        self.mutate(|s| *s = UsageStats::default()).await
    }

    pub async fn snapshot(&self) -> UsageStats {
        *self.stats.lock().await
    }

    pub async fn report(&self) -> StatsReport {
        let stats = self.snapshot().await;
        StatsReport {
            success_rate: stats.success_rate(),
            stats,
            persist_failures: self.persist_failures(),
            load_status: self.load_status.clone(),
        }
    }

    /// Number of snapshot writes that failed since construction.
    pub fn persist_failures(&self) -> u64 {
        self.persist_failures.load(Ordering::Relaxed)
    }

    pub fn load_status(&self) -> &LoadStatus {
        &self.load_status
    }

    /// Apply `f` and write the result through while holding the lock, so
    /// interleaved calls cannot lose an increment.
    async fn mutate(&self, f: impl FnOnce(&mut UsageStats)) -> bool {
        let mut stats = self.stats.lock().await;
        f(&mut *stats);

        match self.persist(&*stats).await {
            Ok(()) => true,
            Err(e) => {
                self.persist_failures.fetch_add(1, Ordering::Relaxed);
                warn!(key = %self.key, error = %e, "Failed to persist usage stats");
                false
            }
        }
    }

    async fn persist(&self, stats: &UsageStats) -> Result<()> {
        let json = serde_json::to_string(stats)
            .map_err(|e| StoreError::Serialization(format!("usage stats: {e}")))?;
        self.store
            .set(&self.key, &json)
            .await
            .map_err(|e| StoreError::StatsPersistence(e.to_string()))
    }
}

async fn read_snapshot(store: &dyn KeyValueStore, key: &str) -> Result<Option<UsageStats>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| StoreError::Serialization(format!("usage stats: {e}")))
}
