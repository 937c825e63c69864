//! Storage layer
//!
//! Persists SAM documents behind the [`StorageEngine`] contract.
//!
//! ## Architecture
//!
//! - **Contract**: `StorageEngine` defines open/list/create/read/replace/delete/close
//! - **SQLite**: the durable local store (default backend)
//! - **Memory**: process-local store for tests and scratch sessions
//! - **Factory**: `EngineFactory` maps a backend tag to a fresh engine
//!
//! Engines are owned by whoever asked the factory for them. The owner opens
//! the engine, runs its operations, and closes it.

pub mod engine;
pub mod error;
pub mod factory;
pub mod memory;
pub mod schema;
pub mod sqlite;

pub use engine::{next_modified_at, now_millis, StorageEngine, MAX_KEY_ATTEMPTS};
pub use error::{StorageError, StorageResult};
pub use factory::{EngineConstructor, EngineFactory};
pub use memory::{MemoryEngine, MemoryTable, MEMORY_BACKEND};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use sqlite::{SqliteEngine, SQLITE_BACKEND};
