//! Storage engine factory
//!
//! Maps a backend tag to a constructor. Each `create` call returns a
//! fresh, unopened engine owned by the caller; nothing is cached or shared
//! except what a constructor closes over (the memory backend's table).
//!
//! Adding a backend means calling [`EngineFactory::register`] with a new
//! tag. No other component needs to change.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use super::engine::StorageEngine;
use super::error::{StorageError, StorageResult};
use super::memory::{MemoryEngine, MemoryTable, MEMORY_BACKEND};
use super::sqlite::{SqliteEngine, SQLITE_BACKEND};
use crate::config::Config;

/// Builds an unopened engine
pub type EngineConstructor = Box<dyn Fn() -> Box<dyn StorageEngine> + Send + Sync>;

/// Registry of storage backends by tag
pub struct EngineFactory {
    constructors: HashMap<String, EngineConstructor>,
    default_backend: String,
}

impl EngineFactory {
    /// Create an empty factory whose default backend is `default_backend`
    pub fn new(default_backend: impl Into<String>) -> Self {
        Self {
            constructors: HashMap::new(),
            default_backend: normalize(&default_backend.into()),
        }
    }

    /// Factory with the built-in `sqlite` and `memory` backends
    ///
    /// The SQLite backend points at the configured database file. Memory
    /// engines built by this factory share one table.
    pub fn with_defaults(config: &Config) -> Self {
        let mut factory = Self::new(config.backend.clone());

        let path = config.sqlite_path();
        factory.register(SQLITE_BACKEND, move || Box::new(SqliteEngine::new(path.clone())));

        let table = MemoryTable::new();
        factory.register(MEMORY_BACKEND, move || Box::new(MemoryEngine::new(table.clone())));

        factory
    }

    /// Register (or replace) the constructor for `tag`
    pub fn register<F>(&mut self, tag: &str, constructor: F)
    where
        F: Fn() -> Box<dyn StorageEngine> + Send + Sync + 'static,
    {
        self.constructors.insert(normalize(tag), Box::new(constructor));
    }

    /// Whether `tag` has a registered constructor
    pub fn is_registered(&self, tag: &str) -> bool {
        self.constructors.contains_key(&normalize(tag))
    }

    /// Registered tags in alphabetical order
    pub fn backends(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Tag used by [`create_default`](Self::create_default)
    pub fn default_backend(&self) -> &str {
        &self.default_backend
    }

    /// Build a fresh, unopened engine for `tag`
    ///
    /// Fails with [`StorageError::UnknownBackend`] before any I/O when the
    /// tag is not registered.
    pub fn create(&self, tag: &str) -> StorageResult<Box<dyn StorageEngine>> {
        let tag = normalize(tag);
        let constructor = self
            .constructors
            .get(&tag)
            .ok_or_else(|| StorageError::UnknownBackend { tag: tag.clone() })?;
        debug!("Creating {} storage engine", tag);
        Ok(constructor())
    }

    /// Build a fresh, unopened engine for the default backend
    pub fn create_default(&self) -> StorageResult<Box<dyn StorageEngine>> {
        self.create(&self.default_backend)
    }
}

impl fmt::Debug for EngineFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineFactory")
            .field("backends", &self.backends())
            .field("default_backend", &self.default_backend)
            .finish()
    }
}

fn normalize(tag: &str) -> String {
    tag.trim().to_ascii_lowercase()
}
