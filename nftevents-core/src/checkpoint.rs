//! Resumable checkpoints.
//!
//! A checkpoint is one decimal string per key in an external store. The
//! [`Watermark`] keeps the last stopped level in memory and mirrors every
//! increase to the store. Writes are best-effort: a failed write is logged
//! and the in-memory value still advances, so at most the last batch is
//! replayed after a crash.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::framework::StoreError;

/// String key-value store holding checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn put_string(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process checkpoint store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    values: RwLock<HashMap<String, String>>,
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn put_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .write()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Last stopped level of one deployment.
#[derive(Clone)]
pub struct Watermark {
    key: String,
    store: Arc<dyn CheckpointStore>,
    level: Arc<AtomicU64>,
}

impl Watermark {
    pub fn new(store: Arc<dyn CheckpointStore>, key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            store,
            level: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the stored checkpoint and seed the in-memory level with it.
    ///
    /// Returns `None` when the checkpoint is missing, unreadable or not a
    /// number. The caller skips catch-up in that case.
    pub async fn load(&self) -> Option<u64> {
        let raw = match self.store.get_string(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                warn!(key = %self.key, "No checkpoint stored");
                return None;
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read checkpoint");
                return None;
            }
        };
        match raw.trim().parse::<u64>() {
            Ok(level) => {
                self.seed(level);
                Some(level)
            }
            Err(e) => {
                warn!(key = %self.key, value = %raw, error = %e, "Checkpoint is not a level");
                None
            }
        }
    }

    /// Raise the in-memory level without persisting it.
    pub fn seed(&self, level: u64) {
        self.level.fetch_max(level, Ordering::AcqRel);
    }

    pub fn current(&self) -> u64 {
        self.level.load(Ordering::Acquire)
    }

    /// Record that an event at `level` has been pushed.
    ///
    /// Only a level above the current one moves the watermark and is written
    /// to the store. Returns whether the watermark moved.
    pub async fn advance(&self, level: u64) -> bool {
        let previous = self.level.fetch_max(level, Ordering::AcqRel);
        if level <= previous {
            return false;
        }
        match self.store.put_string(&self.key, &level.to_string()).await {
            Ok(()) => debug!(key = %self.key, level, "Checkpoint advanced"),
            Err(e) => warn!(key = %self.key, level, error = %e, "Failed to persist checkpoint"),
        }
        true
    }
}
