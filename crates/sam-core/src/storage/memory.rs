//! In-process storage engine
//!
//! Keeps documents in a map shared by every engine built from the same
//! [`MemoryTable`]. Nothing is written to disk; data lives as long as the
//! table does. Used by tests and by throwaway CLI sessions.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::engine::{now_millis, replacement, StorageEngine, MAX_KEY_ATTEMPTS};
use super::error::{StorageError, StorageResult};
use crate::key::generate_key;
use crate::models::{NewSam, SamDocument, SamMetadata};

/// Tag the in-memory engine is registered under
pub const MEMORY_BACKEND: &str = "memory";

/// Document map shared between memory engines
#[derive(Debug, Clone, Default)]
pub struct MemoryTable(Arc<Mutex<BTreeMap<String, SamDocument>>>);

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, SamDocument>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Storage engine over a [`MemoryTable`]
pub struct MemoryEngine {
    table: MemoryTable,
    connected: bool,
}

impl MemoryEngine {
    /// Create an unopened engine over `table`
    pub fn new(table: MemoryTable) -> Self {
        Self {
            table,
            connected: false,
        }
    }

    fn table(&self) -> StorageResult<MutexGuard<'_, BTreeMap<String, SamDocument>>> {
        if !self.connected {
            return Err(StorageError::NotConnected);
        }
        Ok(self.table.lock())
    }

    /// Insert `new` under keys drawn from `keygen`, skipping taken keys
    pub(crate) fn create_with(
        &self,
        new: NewSam,
        mut keygen: impl FnMut() -> String,
    ) -> StorageResult<String> {
        let mut table = self.table()?;
        let mut last_key = String::new();
        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = keygen();
            if table.contains_key(&key) {
                last_key = key;
                continue;
            }
            let doc = SamDocument::from_new(key.clone(), new, now_millis());
            table.insert(key.clone(), doc);
            debug!("Created SAM {} in memory", key);
            return Ok(key);
        }
        Err(StorageError::KeyCollision { key: last_key })
    }
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    fn kind(&self) -> &'static str {
        MEMORY_BACKEND
    }

    async fn open(&mut self) -> bool {
        self.connected = true;
        true
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    async fn list_metadata(&self) -> StorageResult<Vec<SamMetadata>> {
        let table = self.table()?;
        Ok(table.values().map(SamDocument::metadata).collect())
    }

    async fn create(&self, new: NewSam) -> StorageResult<String> {
        self.create_with(new, generate_key)
    }

    async fn read(&self, key: &str) -> StorageResult<Option<SamDocument>> {
        Ok(self.table()?.get(key).cloned())
    }

    async fn replace(&self, key: &str, doc: SamDocument) -> StorageResult<bool> {
        let mut table = self.table()?;
        let Some(existing) = table.get(key) else {
            return Ok(false);
        };
        let written = replacement(key, existing, doc);
        table.insert(key.to_string(), written);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.table()?.remove(key).is_some())
    }

    async fn close(&mut self) -> bool {
        std::mem::replace(&mut self.connected, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_engines_share_table() {
        let table = MemoryTable::new();

        let mut writer = MemoryEngine::new(table.clone());
        assert!(writer.open().await);
        let key = writer.create(NewSam::named("shared")).await.unwrap();
        assert!(writer.close().await);

        let mut reader = MemoryEngine::new(table.clone());
        assert!(reader.open().await);
        let doc = reader.read(&key).await.unwrap().unwrap();
        assert_eq!(doc.name.as_deref(), Some("shared"));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_create_skips_taken_key() {
        let mut engine = MemoryEngine::new(MemoryTable::new());
        assert!(engine.open().await);

        engine
            .create_with(NewSam::named("first"), || "taken".to_string())
            .unwrap();

        let mut keys = vec!["fresh", "taken"];
        let key = engine
            .create_with(NewSam::named("second"), move || {
                keys.pop().unwrap_or("exhausted").to_string()
            })
            .unwrap();
        assert_eq!(key, "fresh");

        let first = engine.read("taken").await.unwrap().unwrap();
        assert_eq!(first.name.as_deref(), Some("first"));
        assert_eq!(engine.list_metadata().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_gives_up_after_max_attempts() {
        let mut engine = MemoryEngine::new(MemoryTable::new());
        assert!(engine.open().await);
        engine
            .create_with(NewSam::named("first"), || "taken".to_string())
            .unwrap();

        let mut calls = 0;
        let err = engine
            .create_with(NewSam::named("second"), || {
                calls += 1;
                "taken".to_string()
            })
            .unwrap_err();

        assert!(matches!(err, StorageError::KeyCollision { ref key } if key == "taken"));
        assert_eq!(calls, MAX_KEY_ATTEMPTS);
        assert_eq!(engine.list_metadata().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_closed_engine_rejects_operations() {
        let mut engine = MemoryEngine::new(MemoryTable::new());
        assert!(matches!(
            engine.read("k").await,
            Err(StorageError::NotConnected)
        ));

        assert!(engine.open().await);
        assert!(engine.close().await);
        assert!(!engine.close().await);
        assert!(!engine.is_healthy());
        assert!(matches!(
            engine.delete("k").await,
            Err(StorageError::NotConnected)
        ));
    }
}
