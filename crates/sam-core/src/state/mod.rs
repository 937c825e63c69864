//! In-memory projection of stored SAMs
//!
//! Two independent slices, each with its own busy flag and error message:
//!
//! - [`CurrentSam`]: the one document being edited
//! - [`SamList`]: metadata for every stored document
//!
//! Each slice operation opens its own engine through the factory and closes
//! it before settling. Operations are not serialized across slices, so two
//! writers racing on one key resolve as last-writer-wins at the storage
//! layer. `CurrentSam::save` serializes saves to the same key issued
//! through the same slice.
//!
//! Consumers read snapshots synchronously, watch for state changes with
//! `subscribe()`, or receive started/succeeded/failed events via `events()`.

mod current;
mod list;
mod session;
mod slice;

pub use current::{CurrentSam, CurrentSamState};
pub use list::{ListChange, SamList, SamListState};
pub use slice::{Operation, SliceEvent, SliceState, SliceStatus};
