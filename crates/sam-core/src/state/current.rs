//! Current-document slice
//!
//! Holds the SAM being edited. `load` and `save` go through storage;
//! `update_local` and `edit_body` change only the in-memory copy until
//! the next explicit save.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::session::Session;
use super::slice::{KeyLocks, Operation, Slice, SliceEvent, SliceState};
use crate::models::{SamDocument, SamPatch};
use crate::storage::{now_millis, EngineFactory, StorageEngine, StorageError, StorageResult};

/// Snapshot of the current-document slice
pub type CurrentSamState = SliceState<Option<SamDocument>>;

/// The editable in-memory SAM and its synchronization with storage
pub struct CurrentSam {
    factory: Arc<EngineFactory>,
    backend: String,
    slice: Slice<Option<SamDocument>, SamDocument>,
    save_locks: KeyLocks,
}

impl CurrentSam {
    /// Slice backed by the factory's default backend
    pub fn new(factory: Arc<EngineFactory>) -> Self {
        let backend = factory.default_backend().to_string();
        Self::with_backend(factory, backend)
    }

    /// Slice backed by a specific backend tag
    pub fn with_backend(factory: Arc<EngineFactory>, backend: impl Into<String>) -> Self {
        Self {
            factory,
            backend: backend.into(),
            slice: Slice::new(),
            save_locks: KeyLocks::default(),
        }
    }

    pub fn snapshot(&self) -> CurrentSamState {
        self.slice.snapshot()
    }

    /// The current document, if one is loaded
    pub fn document(&self) -> Option<SamDocument> {
        self.slice.snapshot().data
    }

    /// Watch the slice for changes
    pub fn subscribe(&self) -> watch::Receiver<CurrentSamState> {
        self.slice.subscribe()
    }

    /// Receive operation started/succeeded/failed events
    pub fn events(&self) -> broadcast::Receiver<SliceEvent<SamDocument>> {
        self.slice.events()
    }

    /// Load the document at `key` as the current document
    ///
    /// Rejects with [`StorageError::NotFound`] when the key is absent; the
    /// previous current document is kept in that case.
    pub async fn load(&self, key: &str) -> StorageResult<SamDocument> {
        self.slice.start(Operation::Load);

        let result = match Session::open(&self.factory, &self.backend).await {
            Ok(session) => {
                let result = read_existing(session.engine(), key).await;
                session.close().await;
                result
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(doc) => {
                debug!("Loaded SAM {}", key);
                let adopted = doc.clone();
                self.slice
                    .succeed(Operation::Load, doc.clone(), |data| *data = Some(adopted));
                Ok(doc)
            }
            Err(e) => {
                warn!("Failed to load SAM {}: {}", key, e);
                self.slice.fail(Operation::Load, e.to_string());
                Err(e)
            }
        }
    }

    /// Merge `patch` over the stored document and write it back
    ///
    /// Never creates: rejects with [`StorageError::NotFound`] when the key
    /// is absent. On success the stored record becomes the current
    /// document. Saves to the same key through this slice run one at a
    /// time; a queued save reports busy while it waits.
    pub async fn save(&self, patch: SamPatch) -> StorageResult<SamDocument> {
        self.slice.start(Operation::Save);
        let _guard = self.save_locks.lock(&patch.key).await;

        let result = match Session::open(&self.factory, &self.backend).await {
            Ok(session) => {
                let result = merge_and_write(session.engine(), &patch).await;
                session.close().await;
                result
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(doc) => {
                debug!("Saved SAM {}", patch.key);
                let adopted = doc.clone();
                self.slice
                    .succeed(Operation::Save, doc.clone(), |data| *data = Some(adopted));
                Ok(doc)
            }
            Err(e) => {
                warn!("Failed to save SAM {}: {}", patch.key, e);
                self.slice.fail(Operation::Save, e.to_string());
                Err(e)
            }
        }
    }

    /// Replace the in-memory document without touching storage
    pub fn update_local(&self, doc: SamDocument) {
        self.slice.modify_data(|data| {
            *data = Some(doc);
            true
        });
    }

    /// Apply an edit from the editing surface to the in-memory body
    ///
    /// Returns `false` when no document is loaded.
    pub fn edit_body(&self, body: Value) -> bool {
        self.slice.modify_data(|data| match data {
            Some(doc) => {
                doc.body = body;
                true
            }
            None => false,
        })
    }

    /// Body handed to the editing surface as its initial data
    pub fn body_snapshot(&self) -> Option<Value> {
        self.slice.snapshot().data.map(|doc| doc.body)
    }

    /// Patch that would persist the in-memory body of the current document
    pub fn pending_body_patch(&self) -> Option<SamPatch> {
        self.slice
            .snapshot()
            .data
            .map(|doc| SamPatch::new(doc.key).body(doc.body))
    }

    /// Drop the current document from memory
    pub fn clear(&self) {
        self.slice.modify_data(|data| data.take().is_some());
    }
}

async fn read_existing(engine: &dyn StorageEngine, key: &str) -> StorageResult<SamDocument> {
    engine
        .read(key)
        .await?
        .ok_or_else(|| StorageError::NotFound {
            key: key.to_string(),
        })
}

async fn merge_and_write(engine: &dyn StorageEngine, patch: &SamPatch) -> StorageResult<SamDocument> {
    let existing = read_existing(engine, &patch.key).await?;
    let merged = patch.merge_into(&existing, now_millis());

    if !engine.replace(&patch.key, merged).await? {
        // Deleted between the read and the write
        return Err(StorageError::NotFound {
            key: patch.key.clone(),
        });
    }

    read_existing(engine, &patch.key).await
}
