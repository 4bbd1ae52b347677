//! Task registry and the event channel that keeps views up to date.

pub mod task_events;
pub mod task_store;

pub use task_events::{TaskEvent, TaskEventBroadcaster, TaskEventKind};
pub use task_store::{TaskStore, UpdateOutcome};
