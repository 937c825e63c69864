//! SQLite storage engine
//!
//! The local transactional store: one database file per data directory,
//! one `sams` table keyed by document key (see [`schema`](super::schema)).
//!
//! `rusqlite` is blocking, so every operation runs on
//! `tokio::task::spawn_blocking` against a connection handle the engine
//! owns between `open` and `close`. Each call settles exactly once: the
//! blocking closure either returns its result or the join error surfaces
//! as [`StorageError::Task`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info, warn};

use super::engine::{now_millis, replacement, StorageEngine, MAX_KEY_ATTEMPTS};
use super::error::{StorageError, StorageResult};
use super::schema::{init_schema, needs_init};
use crate::config::Config;
use crate::key::generate_key;
use crate::models::{GenerationStatus, NewSam, SamDocument, SamMetadata};

/// Tag the SQLite engine is registered under
pub const SQLITE_BACKEND: &str = "sqlite";

/// Storage engine backed by a SQLite database file
pub struct SqliteEngine {
    path: PathBuf,
    conn: Option<Arc<Mutex<Connection>>>,
}

impl SqliteEngine {
    /// Create an unopened engine for the database at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
        }
    }

    /// Create an unopened engine for the configured database
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.sqlite_path())
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the database file, creating it and its schema when missing
    fn connect(path: &Path) -> StorageResult<Connection> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        Ok(conn)
    }

    /// Insert `new` under keys drawn from `keygen`, retrying on collision
    pub(crate) async fn create_with<K>(&self, new: NewSam, mut keygen: K) -> StorageResult<String>
    where
        K: FnMut() -> String + Send + 'static,
    {
        self.with_conn(move |conn| {
            let mut last_key = String::new();
            for attempt in 1..=MAX_KEY_ATTEMPTS {
                let key = keygen();
                let doc = SamDocument::from_new(key.clone(), new.clone(), now_millis());
                match insert_document(conn, &doc) {
                    Ok(()) => {
                        debug!("Created SAM {}", key);
                        return Ok(key);
                    }
                    Err(StorageError::KeyCollision { .. }) => {
                        warn!("Key collision on {} (attempt {})", key, attempt);
                        last_key = key;
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(StorageError::KeyCollision { key: last_key })
        })
        .await
    }

    /// Run `f` against the open connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let handle = self.conn.clone().ok_or(StorageError::NotConnected)?;
        tokio::task::spawn_blocking(move || {
            let mut conn = handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl StorageEngine for SqliteEngine {
    fn kind(&self) -> &'static str {
        SQLITE_BACKEND
    }

    async fn open(&mut self) -> bool {
        if self.conn.is_some() {
            return true;
        }

        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || Self::connect(&path)).await {
            Ok(Ok(conn)) => {
                info!("Opened SQLite store at {:?}", self.path);
                self.conn = Some(Arc::new(Mutex::new(conn)));
                true
            }
            Ok(Err(e)) => {
                warn!("Failed to open SQLite store at {:?}: {}", self.path, e);
                false
            }
            Err(e) => {
                warn!("SQLite open task failed: {}", e);
                false
            }
        }
    }

    fn is_healthy(&self) -> bool {
        self.conn.is_some()
    }

    async fn list_metadata(&self) -> StorageResult<Vec<SamMetadata>> {
        self.with_conn(|conn| select_all_metadata(conn)).await
    }

    async fn create(&self, new: NewSam) -> StorageResult<String> {
        self.create_with(new, generate_key).await
    }

    async fn read(&self, key: &str) -> StorageResult<Option<SamDocument>> {
        let key = key.to_string();
        self.with_conn(move |conn| select_document(conn, &key)).await
    }

    async fn replace(&self, key: &str, doc: SamDocument) -> StorageResult<bool> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            // Write lock up front: SQLite fails a deferred read-to-write
            // upgrade with SQLITE_BUSY without honoring busy_timeout
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(existing) = select_document(&tx, &key)? else {
                debug!("Replace skipped, SAM {} does not exist", key);
                return Ok(false);
            };

            let written = replacement(&key, &existing, doc);
            let body = serde_json::to_string(&written.body)?;
            tx.execute(
                "UPDATE sams
                 SET modified_at = ?, name = ?, description = ?, generation_status = ?, body = ?
                 WHERE key = ?",
                params![
                    written.modified_at.timestamp_millis(),
                    written.name,
                    written.description,
                    written.generation_status.map(|s| s.as_str()),
                    body,
                    key,
                ],
            )?;
            tx.commit()?;

            debug!("Replaced SAM {}", key);
            Ok(true)
        })
        .await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM sams WHERE key = ?", params![key])?;
            debug!("Delete SAM {}: {} row(s)", key, removed);
            Ok(removed > 0)
        })
        .await
    }

    async fn close(&mut self) -> bool {
        let Some(handle) = self.conn.take() else {
            return false;
        };

        match Arc::try_unwrap(handle) {
            Ok(mutex) => {
                let conn = mutex
                    .into_inner()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                match conn.close() {
                    Ok(()) => {
                        info!("Closed SQLite store at {:?}", self.path);
                        true
                    }
                    Err((_, e)) => {
                        warn!("Failed to close SQLite store at {:?}: {}", self.path, e);
                        false
                    }
                }
            }
            Err(_) => {
                // A detached blocking task still holds the handle; the
                // connection is released when it finishes.
                info!("SQLite store at {:?} closed with a task in flight", self.path);
                true
            }
        }
    }
}

/// Columns shared by every metadata query
const METADATA_COLUMNS: &str = "key, created_at, modified_at, name, description, generation_status";

/// Raw column values before conversion into model types
struct SamRow {
    key: String,
    created_at: i64,
    modified_at: i64,
    name: Option<String>,
    description: Option<String>,
    generation_status: Option<String>,
}

impl SamRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            created_at: row.get(1)?,
            modified_at: row.get(2)?,
            name: row.get(3)?,
            description: row.get(4)?,
            generation_status: row.get(5)?,
        })
    }

    fn into_metadata(self) -> StorageResult<SamMetadata> {
        let created_at = timestamp(&self.key, self.created_at)?;
        let modified_at = timestamp(&self.key, self.modified_at)?;
        let generation_status = match self.generation_status {
            Some(s) => Some(s.parse::<GenerationStatus>().map_err(|e| {
                StorageError::InvalidRecord {
                    key: self.key.clone(),
                    details: e.to_string(),
                }
            })?),
            None => None,
        };

        Ok(SamMetadata {
            key: self.key,
            created_at,
            modified_at,
            name: self.name,
            description: self.description,
            generation_status,
        })
    }
}

fn timestamp(key: &str, millis: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| StorageError::InvalidRecord {
        key: key.to_string(),
        details: format!("timestamp {} out of range", millis),
    })
}

fn select_all_metadata(conn: &Connection) -> StorageResult<Vec<SamMetadata>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM sams ORDER BY created_at, key",
        METADATA_COLUMNS
    ))?;

    let rows = stmt.query_map([], SamRow::from_row)?;

    let mut list = Vec::new();
    for row in rows {
        list.push(row?.into_metadata()?);
    }
    Ok(list)
}

fn select_document(conn: &Connection, key: &str) -> StorageResult<Option<SamDocument>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, body FROM sams WHERE key = ?",
        METADATA_COLUMNS
    ))?;

    let found = stmt
        .query_row(params![key], |row| {
            Ok((SamRow::from_row(row)?, row.get::<_, String>(6)?))
        })
        .optional()?;

    let Some((row, body)) = found else {
        return Ok(None);
    };

    let meta = row.into_metadata()?;
    let body = serde_json::from_str(&body)?;
    Ok(Some(SamDocument {
        key: meta.key,
        created_at: meta.created_at,
        modified_at: meta.modified_at,
        name: meta.name,
        description: meta.description,
        generation_status: meta.generation_status,
        body,
    }))
}

fn insert_document(conn: &Connection, doc: &SamDocument) -> StorageResult<()> {
    let body = serde_json::to_string(&doc.body)?;
    conn.execute(
        "INSERT INTO sams (key, created_at, modified_at, name, description, generation_status, body)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            doc.key,
            doc.created_at.timestamp_millis(),
            doc.modified_at.timestamp_millis(),
            doc.name,
            doc.description,
            doc.generation_status.map(|s| s.as_str()),
            body,
        ],
    )
    .map_err(|e| StorageError::from_write(e, &doc.key))?;
    Ok(())
}
