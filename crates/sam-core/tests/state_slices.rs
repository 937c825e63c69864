//! State slices driven through a `Store`, against every registered backend

use std::sync::Arc;

use sam_core::storage::{MEMORY_BACKEND, SQLITE_BACKEND};
use sam_core::{
    Config, CurrentSam, EngineFactory, NewSam, SamList, SamPatch, SliceStatus, StorageError,
    Store,
};
use serde_json::json;
use tempfile::TempDir;

const BACKENDS: [&str; 2] = [SQLITE_BACKEND, MEMORY_BACKEND];

fn store(temp_dir: &TempDir, backend: &str) -> Store {
    let config = Config {
        data_dir: temp_dir.path().to_path_buf(),
        backend: backend.to_string(),
        log_file: None,
    };
    Store::open_with_config(config).unwrap()
}

#[tokio::test]
async fn save_on_missing_key_records_error() {
    for backend in BACKENDS {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir, backend);

        let err = store
            .current()
            .save(SamPatch::new("missing").name(Some("ghost".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }), "{}", backend);

        let state = store.current().snapshot();
        assert_eq!(state.status, SliceStatus::Rejected);
        assert!(!state.loading, "{}", backend);
        let message = state.error.unwrap();
        assert!(message.contains("not found"), "{}: {}", backend, message);
        assert!(state.data.is_none());
    }
}

#[tokio::test]
async fn list_and_current_stay_consistent() {
    for backend in BACKENDS {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir, backend);

        assert!(store.list().fetch_all().await.unwrap().is_empty());

        let meta = store
            .list()
            .create_entry(NewSam::named("Base 2020").with_body(json!({"cells": []})))
            .await
            .unwrap();
        assert_eq!(store.list().entries().len(), 1);

        let loaded = store.current().load(&meta.key).await.unwrap();
        assert_eq!(loaded.metadata(), meta, "{}", backend);

        assert!(store.current().edit_body(json!({"cells": [[1]]})));
        let patch = store.current().pending_body_patch().unwrap();
        let saved = store.current().save(patch).await.unwrap();
        assert_eq!(saved.body, json!({"cells": [[1]]}));
        assert!(saved.modified_at > saved.created_at, "{}", backend);

        let refetched = store.list().fetch_all().await.unwrap();
        assert_eq!(refetched, vec![saved.metadata()], "{}", backend);

        store.list().drop_entry(&meta.key).await.unwrap();
        assert!(store.list().entries().is_empty());
        assert!(matches!(
            store.current().load(&meta.key).await,
            Err(StorageError::NotFound { .. })
        ));
        // Failed load keeps the last loaded document
        assert_eq!(store.current().document(), Some(saved));
    }
}

#[tokio::test]
async fn subscribers_observe_busy_then_settled() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir, MEMORY_BACKEND);
    let mut rx = store.list().subscribe();

    store
        .list()
        .create_entry(NewSam::named("watched"))
        .await
        .unwrap();

    assert!(rx.has_changed().unwrap());
    let state = rx.borrow_and_update().clone();
    assert_eq!(state.status, SliceStatus::Fulfilled);
    assert!(!state.loading);
    assert_eq!(state.data.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_saves_on_one_key_all_land() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        data_dir: temp_dir.path().to_path_buf(),
        backend: SQLITE_BACKEND.to_string(),
        log_file: None,
    };
    let factory = Arc::new(EngineFactory::with_defaults(&config));

    let key = SamList::new(factory.clone())
        .create_entry(NewSam::named("contended"))
        .await
        .unwrap()
        .key;

    let mut writers = Vec::new();
    for writer in 0..8 {
        let factory = factory.clone();
        let key = key.clone();
        writers.push(tokio::spawn(async move {
            let current = CurrentSam::new(factory);
            let mut failures = Vec::new();
            for round in 0..10 {
                let patch = SamPatch::new(&key).body(json!({"writer": writer, "round": round}));
                if let Err(e) = current.save(patch).await {
                    failures.push(e.to_string());
                }
            }
            failures
        }));
    }

    for writer in writers {
        let failures = writer.await.unwrap();
        assert!(failures.is_empty(), "save failed: {:?}", failures);
    }

    // Last writer wins: the stored body is one complete write
    let doc = CurrentSam::new(factory).load(&key).await.unwrap();
    assert!(doc.body["writer"].is_number());
    assert!(doc.body["round"].is_number());
    assert!(doc.modified_at > doc.created_at);
}
