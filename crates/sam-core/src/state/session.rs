//! One opened engine for the duration of one slice operation

use tracing::warn;

use crate::storage::{EngineFactory, StorageEngine, StorageError, StorageResult};

/// An engine opened for a single operation
///
/// Slice operations never share a connection: each one opens a session,
/// runs against it, and closes it on every path.
pub(crate) struct Session {
    engine: Box<dyn StorageEngine>,
}

impl Session {
    pub(crate) async fn open(factory: &EngineFactory, backend: &str) -> StorageResult<Self> {
        let mut engine = factory.create(backend)?;
        if !engine.open().await {
            return Err(StorageError::OpenFailed {
                backend: backend.to_string(),
            });
        }
        Ok(Self { engine })
    }

    pub(crate) fn engine(&self) -> &dyn StorageEngine {
        self.engine.as_ref()
    }

    pub(crate) async fn close(mut self) {
        if !self.engine.close().await {
            warn!("Failed to close {} storage", self.engine.kind());
        }
    }
}
