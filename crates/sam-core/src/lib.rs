//! SAM Core Library
//!
//! This crate provides local persistence for Social Accounting Matrix (SAM)
//! documents: named records with metadata and an opaque structured body.
//!
//! # Architecture
//!
//! - **Storage engines**: a backend-neutral contract with SQLite and
//!   in-memory implementations, selected by tag through a factory
//! - **State projection**: in-memory slices for the current document and
//!   the document list, kept in step with storage
//!
//! # Quick Start
//!
//! ```text
//! let store = Store::open()?;
//!
//! let meta = store.list().create_entry(NewSam::named("Base 2020")).await?;
//! let doc = store.current().load(&meta.key).await?;
//! ```
//!
//! # Modules
//!
//! - `store`: Configuration plus both state slices (main entry point)
//! - `state`: Current-document and document-list slices
//! - `storage`: Engine contract, backends, and factory
//! - `models`: Documents, metadata, create and patch payloads
//! - `key`: Document key generation
//! - `config`: Application configuration

pub mod config;
pub mod key;
pub mod models;
pub mod state;
pub mod storage;
pub mod store;

pub use config::Config;
pub use models::{GenerationStatus, NewSam, SamDocument, SamMetadata, SamPatch};
pub use state::{CurrentSam, SamList, SliceEvent, SliceState, SliceStatus};
pub use storage::{EngineFactory, StorageEngine, StorageError, StorageResult};
pub use store::Store;
