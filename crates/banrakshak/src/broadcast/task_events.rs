//! Task event broadcaster for push-style registry updates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::task::{Task, TaskStatus};

/// What happened to a task.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    Created,
    Updated,
    Removed,
}

/// A registry mutation, carrying the task as it looks afterwards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    pub task_id: String,
    /// Snapshot after the mutation (before it, for `Removed`).
    pub task: Task,
    pub timestamp: DateTime<Utc>,
}

impl TaskEvent {
    pub fn new(kind: TaskEventKind, task: &Task) -> Self {
        Self {
            kind,
            task_id: task.id.clone(),
            task: task.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.task.status
    }

    /// True when this event moved the task into a terminal state or removed it.
    pub fn is_final(&self) -> bool {
        self.kind == TaskEventKind::Removed || self.task.is_finished()
    }
}

/// Broadcasts task events to any number of subscribers.
#[derive(Clone)]
pub struct TaskEventBroadcaster {
    sender: Arc<broadcast::Sender<TaskEvent>>,
}

impl TaskEventBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: TaskEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for TaskEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskMetadata;

    fn task(id: &str) -> Task {
        Task::processing(id, "claim.pdf", TaskMetadata::new(0, "English"))
    }

    #[test]
    fn test_broadcaster_send_receive() {
        let broadcaster = TaskEventBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        broadcaster.send(TaskEvent::new(TaskEventKind::Created, &task("t1")));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.task_id, "t1");
        assert_eq!(received.kind, TaskEventKind::Created);
        assert_eq!(received.status(), TaskStatus::Processing);
        assert!(!received.is_final());
    }

    #[test]
    fn test_send_without_receivers() {
        let broadcaster = TaskEventBroadcaster::default();
        assert_eq!(broadcaster.receiver_count(), 0);
        broadcaster.send(TaskEvent::new(TaskEventKind::Created, &task("t1")));
    }

    #[test]
    fn test_removed_is_final() {
        let event = TaskEvent::new(TaskEventKind::Removed, &task("t1"));
        assert!(event.is_final());
    }
}
