//! Slice lifecycle shared by the projection types
//!
//! A slice holds a piece of in-memory state plus a busy flag and the last
//! error message. Every asynchronous operation moves it through
//! `Idle -> Pending -> Fulfilled | Rejected` and emits a matching
//! [`SliceEvent`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch, OwnedMutexGuard};

/// Event channel capacity; slow receivers see `Lagged` past this
const EVENT_CAPACITY: usize = 64;

/// Where a slice is in its operation life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceStatus {
    /// No operation has run yet
    Idle,
    /// An operation is in flight
    Pending,
    /// The last operation succeeded
    Fulfilled,
    /// The last operation failed; see `error`
    Rejected,
}

/// Operations a slice can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Load,
    Save,
    FetchAll,
    Create,
    Drop,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Load => "load",
            Operation::Save => "save",
            Operation::FetchAll => "fetch_all",
            Operation::Create => "create",
            Operation::Drop => "drop",
        }
    }
}

/// Snapshot of a slice
#[derive(Debug, Clone, PartialEq)]
pub struct SliceState<T> {
    pub data: T,
    pub status: SliceStatus,
    /// Busy flag: true while an operation is pending
    pub loading: bool,
    /// Message of the last failed operation, cleared when a new one starts
    pub error: Option<String>,
}

impl<T: Default> Default for SliceState<T> {
    fn default() -> Self {
        Self {
            data: T::default(),
            status: SliceStatus::Idle,
            loading: false,
            error: None,
        }
    }
}

/// Notification emitted for every operation
#[derive(Debug, Clone, PartialEq)]
pub enum SliceEvent<P> {
    Started(Operation),
    Succeeded(Operation, P),
    Failed(Operation, String),
}

/// State cell plus event channel for one slice
pub(crate) struct Slice<T, P> {
    state: watch::Sender<SliceState<T>>,
    events: broadcast::Sender<SliceEvent<P>>,
}

impl<T: Clone + Default, P: Clone> Slice<T, P> {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(SliceState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { state, events }
    }

    pub(crate) fn snapshot(&self) -> SliceState<T> {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SliceState<T>> {
        self.state.subscribe()
    }

    pub(crate) fn events(&self) -> broadcast::Receiver<SliceEvent<P>> {
        self.events.subscribe()
    }

    pub(crate) fn start(&self, op: Operation) {
        self.state.send_modify(|s| {
            s.status = SliceStatus::Pending;
            s.loading = true;
            s.error = None;
        });
        self.emit(SliceEvent::Started(op));
    }

    pub(crate) fn succeed(&self, op: Operation, payload: P, apply: impl FnOnce(&mut T)) {
        self.state.send_modify(|s| {
            apply(&mut s.data);
            s.status = SliceStatus::Fulfilled;
            s.loading = false;
            s.error = None;
        });
        self.emit(SliceEvent::Succeeded(op, payload));
    }

    pub(crate) fn fail(&self, op: Operation, message: String) {
        self.state.send_modify(|s| {
            s.status = SliceStatus::Rejected;
            s.loading = false;
            s.error = Some(message.clone());
        });
        self.emit(SliceEvent::Failed(op, message));
    }

    /// Change the data synchronously without touching status or error
    pub(crate) fn modify_data(&self, apply: impl FnOnce(&mut T) -> bool) -> bool {
        self.state.send_if_modified(|s| apply(&mut s.data))
    }

    fn emit(&self, event: SliceEvent<P>) {
        // No receivers is fine: events are optional for consumers
        let _ = self.events.send(event);
    }
}

/// Async mutex per document key
#[derive(Default)]
pub(crate) struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    /// Wait for exclusive access to `key`
    pub(crate) async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_lifecycle_transitions() {
        let slice: Slice<Vec<u32>, u32> = Slice::new();
        let mut events = slice.events();
        assert_eq!(slice.snapshot().status, SliceStatus::Idle);

        slice.start(Operation::FetchAll);
        let pending = slice.snapshot();
        assert_eq!(pending.status, SliceStatus::Pending);
        assert!(pending.loading);

        slice.succeed(Operation::FetchAll, 7, |data| data.push(7));
        let done = slice.snapshot();
        assert_eq!(done.status, SliceStatus::Fulfilled);
        assert!(!done.loading);
        assert_eq!(done.data, vec![7]);

        assert_eq!(
            events.try_recv().unwrap(),
            SliceEvent::Started(Operation::FetchAll)
        );
        assert_eq!(
            events.try_recv().unwrap(),
            SliceEvent::Succeeded(Operation::FetchAll, 7)
        );
    }

    #[test]
    fn test_failure_records_message_and_start_clears_it() {
        let slice: Slice<Option<String>, String> = Slice::new();

        slice.start(Operation::Load);
        slice.fail(Operation::Load, "boom".to_string());
        let failed = slice.snapshot();
        assert_eq!(failed.status, SliceStatus::Rejected);
        assert!(!failed.loading);
        assert_eq!(failed.error.as_deref(), Some("boom"));

        slice.start(Operation::Load);
        assert!(slice.snapshot().error.is_none());
    }

    #[test]
    fn test_modify_data_keeps_status() {
        let slice: Slice<Option<String>, String> = Slice::new();
        let mut rx = slice.subscribe();

        assert!(slice.modify_data(|data| {
            *data = Some("edited".to_string());
            true
        }));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().data.as_deref(), Some("edited"));
        assert_eq!(slice.snapshot().status, SliceStatus::Idle);

        assert!(!slice.modify_data(|_| false));
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_key_locks_serialize_same_key() {
        let locks = Arc::new(KeyLocks::default());

        let first = locks.lock("a").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("a").await;
            })
        };

        // Different keys do not block each other
        let _other = tokio::time::timeout(Duration::from_secs(1), locks.lock("b"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }
}
