//! Application state entry point
//!
//! The `Store` wires configuration, the engine factory, and both state
//! slices together:
//! - `current`: the SAM being edited
//! - `list`: metadata of every stored SAM
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::open()?;
//!
//! store.list().fetch_all().await?;
//! let meta = store.list().create_entry(NewSam::named("Base 2020")).await?;
//!
//! store.current().load(&meta.key).await?;
//! store.current().save(SamPatch::new(&meta.key).name(Some("Revised".into()))).await?;
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::state::{CurrentSam, SamList};
use crate::storage::{EngineFactory, StorageError};

/// Configuration, engine factory, and the two state slices
pub struct Store {
    config: Config,
    factory: Arc<EngineFactory>,
    current: CurrentSam,
    list: SamList,
}

impl Store {
    /// Open the store with configuration from the default locations
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open the store with a specific configuration
    ///
    /// Fails when the configured backend is not registered. No connection
    /// is opened here; each slice operation opens its own.
    pub fn open_with_config(config: Config) -> Result<Self> {
        let factory = EngineFactory::with_defaults(&config);
        Self::open_with_factory(config, factory)
    }

    /// Open the store with a caller-built factory
    pub fn open_with_factory(config: Config, factory: EngineFactory) -> Result<Self> {
        let backend = factory.default_backend().to_string();
        if !factory.is_registered(&backend) {
            let available = factory.backends().join(", ");
            return Err(StorageError::UnknownBackend {
                tag: backend.clone(),
            })
            .with_context(|| {
                format!("Cannot open '{}' storage. Available: {}", backend, available)
            });
        }

        info!("Using {} storage in {:?}", backend, config.data_dir);

        let factory = Arc::new(factory);
        Ok(Self {
            current: CurrentSam::with_backend(factory.clone(), backend.clone()),
            list: SamList::with_backend(factory.clone(), backend),
            factory,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn factory(&self) -> &Arc<EngineFactory> {
        &self.factory
    }

    /// Backend tag both slices use
    pub fn backend(&self) -> &str {
        self.factory.default_backend()
    }

    /// The current-document slice
    pub fn current(&self) -> &CurrentSam {
        &self.current
    }

    /// The document-list slice
    pub fn list(&self) -> &SamList {
        &self.list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewSam, SamPatch};
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir, backend: &str) -> Config {
        Config {
            data_dir: temp_dir.path().to_path_buf(),
            backend: backend.to_string(),
            log_file: None,
        }
    }

    #[test]
    fn test_open_rejects_unknown_backend() {
        let temp_dir = TempDir::new().unwrap();
        let err = Store::open_with_config(test_config(&temp_dir, "indexeddb"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("indexeddb"));
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::UnknownBackend { tag }) if tag == "indexeddb"
        ));
    }

    #[tokio::test]
    async fn test_slices_share_storage() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open_with_config(test_config(&temp_dir, "sqlite")).unwrap();
        assert_eq!(store.backend(), "sqlite");

        let meta = store
            .list()
            .create_entry(NewSam::named("Base 2020"))
            .await
            .unwrap();

        store.current().load(&meta.key).await.unwrap();
        store
            .current()
            .save(SamPatch::new(&meta.key).name(Some("Base 2020 Revised".to_string())))
            .await
            .unwrap();

        let listed = store.list().fetch_all().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name.as_deref(), Some("Base 2020 Revised"));
    }

    #[tokio::test]
    async fn test_data_persists_across_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir, "sqlite");

        let key = {
            let store = Store::open_with_config(config.clone()).unwrap();
            store
                .list()
                .create_entry(NewSam::named("Persistent"))
                .await
                .unwrap()
                .key
        };

        let store = Store::open_with_config(config).unwrap();
        let doc = store.current().load(&key).await.unwrap();
        assert_eq!(doc.name.as_deref(), Some("Persistent"));
    }
}
