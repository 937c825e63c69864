//! Storage engine contract
//!
//! Every backend implements [`StorageEngine`]. An engine is created
//! unopened by the [`EngineFactory`](super::EngineFactory), opened by its
//! owner, used for one or more operations, and closed by the same owner.
//!
//! Lifecycle and absence are reported as plain values:
//! - `open` / `close` return `false` on failure instead of raising
//! - `read` returns `None` for a missing key
//! - `replace` / `delete` return `false` for a missing key
//!
//! Data operations on an engine that is not open fail with
//! [`StorageError::NotConnected`](super::StorageError::NotConnected).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::error::StorageResult;
use crate::models::{NewSam, SamDocument, SamMetadata};

/// How many fresh keys `create` tries before reporting a collision
pub const MAX_KEY_ATTEMPTS: usize = 3;

/// Operations every storage backend must provide
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Tag this engine is registered under
    fn kind(&self) -> &'static str;

    /// Establish the connection. Safe to call again after `close`.
    async fn open(&mut self) -> bool;

    /// Whether the connection is usable. Local check, no round-trip.
    fn is_healthy(&self) -> bool;

    /// Metadata for every stored document, in no particular order
    async fn list_metadata(&self) -> StorageResult<Vec<SamMetadata>>;

    /// Persist a new document and return its generated key
    async fn create(&self, new: NewSam) -> StorageResult<String>;

    /// Full document for `key`, or `None` when absent
    async fn read(&self, key: &str) -> StorageResult<Option<SamDocument>>;

    /// Overwrite the document at `key`
    ///
    /// Returns `false` when no such key exists; never creates. The stored
    /// `created_at` is kept and `modified_at` is refreshed, ignoring the
    /// values carried by `doc`.
    async fn replace(&self, key: &str, doc: SamDocument) -> StorageResult<bool>;

    /// Remove the document at `key`. Returns `false` when it did not exist.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Release the connection. Returns `false` if it was not open.
    async fn close(&mut self) -> bool;
}

/// Current time truncated to the millisecond precision that is persisted
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::<Utc>::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Modification stamp for a replace: now, but always after `previous`
pub fn next_modified_at(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now_millis();
    let floor = previous + Duration::milliseconds(1);
    if now < floor {
        floor
    } else {
        now
    }
}

/// Build the record a replace writes: caller's content, stored identity
pub(crate) fn replacement(key: &str, existing: &SamDocument, doc: SamDocument) -> SamDocument {
    SamDocument {
        key: key.to_string(),
        created_at: existing.created_at,
        modified_at: next_modified_at(existing.modified_at),
        ..doc
    }
}
