//! Document-list slice
//!
//! Metadata for every stored SAM, used by list views. Entries are kept in
//! the order they were fetched or created.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::session::Session;
use super::slice::{Operation, Slice, SliceEvent, SliceState};
use crate::models::{NewSam, SamMetadata};
use crate::storage::{EngineFactory, StorageEngine, StorageError, StorageResult};

/// Snapshot of the document-list slice
pub type SamListState = SliceState<Vec<SamMetadata>>;

/// Payload of a successful list operation
#[derive(Debug, Clone, PartialEq)]
pub enum ListChange {
    Fetched(Vec<SamMetadata>),
    Created(SamMetadata),
    Dropped(String),
}

/// In-memory list of SAM metadata kept in step with storage
pub struct SamList {
    factory: Arc<EngineFactory>,
    backend: String,
    slice: Slice<Vec<SamMetadata>, ListChange>,
}

impl SamList {
    pub fn new(factory: Arc<EngineFactory>) -> Self {
        let backend = factory.default_backend().to_string();
        Self::with_backend(factory, backend)
    }

    pub fn with_backend(factory: Arc<EngineFactory>, backend: impl Into<String>) -> Self {
        Self {
            factory,
            backend: backend.into(),
            slice: Slice::new(),
        }
    }

    pub fn snapshot(&self) -> SamListState {
        self.slice.snapshot()
    }

    pub fn entries(&self) -> Vec<SamMetadata> {
        self.slice.snapshot().data
    }

    pub fn subscribe(&self) -> watch::Receiver<SamListState> {
        self.slice.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SliceEvent<ListChange>> {
        self.slice.events()
    }

    /// Replace the whole list with what storage currently holds
    pub async fn fetch_all(&self) -> StorageResult<Vec<SamMetadata>> {
        self.slice.start(Operation::FetchAll);

        let result = match Session::open(&self.factory, &self.backend).await {
            Ok(session) => {
                let result = session.engine().list_metadata().await;
                session.close().await;
                result
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(list) => {
                debug!("Fetched {} SAM entries", list.len());
                let fetched = list.clone();
                self.slice.succeed(
                    Operation::FetchAll,
                    ListChange::Fetched(list.clone()),
                    |data| *data = fetched,
                );
                Ok(list)
            }
            Err(e) => {
                warn!("Failed to fetch SAM list: {}", e);
                self.slice.fail(Operation::FetchAll, e.to_string());
                Err(e)
            }
        }
    }

    /// Create a document and append its metadata to the list
    pub async fn create_entry(&self, new: NewSam) -> StorageResult<SamMetadata> {
        self.slice.start(Operation::Create);

        let result = match Session::open(&self.factory, &self.backend).await {
            Ok(session) => {
                let result = create_and_read_back(session.engine(), new).await;
                session.close().await;
                result
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(meta) => {
                debug!("Created SAM entry {}", meta.key);
                let appended = meta.clone();
                self.slice.succeed(
                    Operation::Create,
                    ListChange::Created(meta.clone()),
                    |data| data.push(appended),
                );
                Ok(meta)
            }
            Err(e) => {
                warn!("Failed to create SAM: {}", e);
                self.slice.fail(Operation::Create, e.to_string());
                Err(e)
            }
        }
    }

    /// Delete a document and remove its entry from the list
    ///
    /// Rejects with [`StorageError::NotFound`] when storage had no such key.
    pub async fn drop_entry(&self, key: &str) -> StorageResult<()> {
        self.slice.start(Operation::Drop);

        let result = match Session::open(&self.factory, &self.backend).await {
            Ok(session) => {
                let result = session.engine().delete(key).await;
                session.close().await;
                result
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(true) => {
                debug!("Dropped SAM {}", key);
                self.slice.succeed(
                    Operation::Drop,
                    ListChange::Dropped(key.to_string()),
                    |data| data.retain(|meta| meta.key != key),
                );
                Ok(())
            }
            Ok(false) => {
                let e = StorageError::NotFound {
                    key: key.to_string(),
                };
                warn!("Failed to drop SAM {}: {}", key, e);
                self.slice.fail(Operation::Drop, e.to_string());
                Err(e)
            }
            Err(e) => {
                warn!("Failed to drop SAM {}: {}", key, e);
                self.slice.fail(Operation::Drop, e.to_string());
                Err(e)
            }
        }
    }
}

async fn create_and_read_back(engine: &dyn StorageEngine, new: NewSam) -> StorageResult<SamMetadata> {
    let key = engine.create(new).await?;
    let doc = engine
        .read(&key)
        .await?
        .ok_or(StorageError::NotFound { key })?;
    Ok(doc.metadata())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::SliceStatus;
    use tempfile::TempDir;

    fn factory(temp_dir: &TempDir, backend: &str) -> Arc<EngineFactory> {
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            backend: backend.to_string(),
            log_file: None,
        };
        Arc::new(EngineFactory::with_defaults(&config))
    }

    #[tokio::test]
    async fn test_fetch_all_empty() {
        let temp_dir = TempDir::new().unwrap();
        let list = SamList::new(factory(&temp_dir, "sqlite"));

        assert!(list.fetch_all().await.unwrap().is_empty());
        let state = list.snapshot();
        assert_eq!(state.status, SliceStatus::Fulfilled);
        assert!(state.data.is_empty());
    }

    #[tokio::test]
    async fn test_create_appends_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let list = SamList::new(factory(&temp_dir, "sqlite"));

        let first = list.create_entry(NewSam::named("Base 2020")).await.unwrap();
        let second = list
            .create_entry(NewSam::named("Base 2021").with_description("next year"))
            .await
            .unwrap();

        let entries = list.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], first);
        assert_eq!(entries[1], second);
        assert_eq!(entries[1].description.as_deref(), Some("next year"));
        assert_eq!(entries[0].created_at, entries[0].modified_at);
    }

    #[tokio::test]
    async fn test_fetch_all_replaces_list() {
        let temp_dir = TempDir::new().unwrap();
        let factory = factory(&temp_dir, "sqlite");

        let writer = SamList::new(factory.clone());
        for name in ["a", "b", "c"] {
            writer.create_entry(NewSam::named(name)).await.unwrap();
        }

        let reader = SamList::new(factory);
        assert!(reader.entries().is_empty());
        let fetched = reader.fetch_all().await.unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(reader.entries(), fetched);
    }

    #[tokio::test]
    async fn test_drop_removes_entry() {
        let temp_dir = TempDir::new().unwrap();
        let list = SamList::new(factory(&temp_dir, "memory"));
        let mut events = list.events();

        let keep = list.create_entry(NewSam::named("keep")).await.unwrap();
        let gone = list.create_entry(NewSam::named("gone")).await.unwrap();

        list.drop_entry(&gone.key).await.unwrap();

        assert_eq!(list.entries(), vec![keep]);
        assert_eq!(list.fetch_all().await.unwrap().len(), 1);

        let mut saw_drop = false;
        while let Ok(event) = events.try_recv() {
            if event == SliceEvent::Succeeded(Operation::Drop, ListChange::Dropped(gone.key.clone())) {
                saw_drop = true;
            }
        }
        assert!(saw_drop);
    }

    #[tokio::test]
    async fn test_drop_missing_key_rejects() {
        let temp_dir = TempDir::new().unwrap();
        let list = SamList::new(factory(&temp_dir, "memory"));
        let kept = list.create_entry(NewSam::named("kept")).await.unwrap();

        let err = list.drop_entry("missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));

        let state = list.snapshot();
        assert_eq!(state.status, SliceStatus::Rejected);
        assert!(!state.loading);
        assert!(state.error.is_some());
        assert_eq!(state.data, vec![kept]);
    }

    #[tokio::test]
    async fn test_open_failure_is_recorded() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let config = Config {
            data_dir: blocker,
            backend: "sqlite".to_string(),
            log_file: None,
        };
        let list = SamList::new(Arc::new(EngineFactory::with_defaults(&config)));

        let err = list.fetch_all().await.unwrap_err();
        assert!(matches!(err, StorageError::OpenFailed { .. }));

        let state = list.snapshot();
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("Failed to open sqlite storage"));
    }
}
