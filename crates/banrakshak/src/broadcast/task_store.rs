//! In-memory task registry.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::broadcast::task_events::{TaskEvent, TaskEventBroadcaster, TaskEventKind};
use crate::task::{Task, TaskResult, TaskStatus};

/// Outcome of a registry mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// The task is not in the registry (never created or already deleted).
    Missing,
    /// The task already reached a state the mutation may not leave.
    Rejected,
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied)
    }
}

#[derive(Default)]
struct StoreInner {
    tasks: HashMap<String, Task>,
    /// Ids in insertion order.
    order: Vec<String>,
}

/// Sole owner of task records.
///
/// Every mutation happens under one write lock and publishes a [`TaskEvent`]
/// before the lock is released, so subscribers observe mutations in the
/// order they were applied.
pub struct TaskStore {
    inner: RwLock<StoreInner>,
    events: TaskEventBroadcaster,
}

impl TaskStore {
    pub fn new(events: TaskEventBroadcaster) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            events,
        }
    }

    pub fn events(&self) -> &TaskEventBroadcaster {
        &self.events
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Task store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Task store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Registers a new task.
    ///
    /// A non-terminal record with the same id is replaced in place. A
    /// terminal one is kept and the insert is rejected.
    pub fn insert(&self, task: Task) -> UpdateOutcome {
        let mut inner = self.write();
        if let Some(existing) = inner.tasks.get(&task.id) {
            if existing.status.is_terminal() {
                log::warn!(
                    "Not replacing task {} already in {} state",
                    task.id,
                    existing.status
                );
                return UpdateOutcome::Rejected;
            }
        }

        let id = task.id.clone();
        self.events.send(TaskEvent::new(TaskEventKind::Created, &task));
        if inner.tasks.insert(id.clone(), task).is_none() {
            inner.order.push(id);
        }
        UpdateOutcome::Applied
    }

    /// Applies a status check result.
    ///
    /// Terminal tasks are never moved again and progress never goes backwards
    /// while processing.
    pub fn apply_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        progress: u8,
        error: Option<&str>,
    ) -> UpdateOutcome {
        let mut inner = self.write();
        let Some(task) = inner.tasks.get_mut(task_id) else {
            return UpdateOutcome::Missing;
        };

        if task.status.is_terminal() {
            log::debug!(
                "Ignoring {} update for task {} already in {} state",
                status,
                task_id,
                task.status
            );
            return UpdateOutcome::Rejected;
        }

        task.status = status;
        task.progress = task.progress.max(progress.min(100));

        match status {
            TaskStatus::Processing => {}
            TaskStatus::Completed => {
                task.completed_at = Some(Utc::now());
            }
            TaskStatus::Error => {
                task.completed_at = Some(Utc::now());
                task.error = Some(error.unwrap_or("Processing failed").to_string());
            }
        }

        self.events.send(TaskEvent::new(TaskEventKind::Updated, task));
        UpdateOutcome::Applied
    }

    /// Fills in the result of a completed task and sets progress to 100.
    pub fn complete_with_result(&self, task_id: &str, result: TaskResult) -> UpdateOutcome {
        let mut inner = self.write();
        let Some(task) = inner.tasks.get_mut(task_id) else {
            return UpdateOutcome::Missing;
        };

        if task.status != TaskStatus::Completed {
            return UpdateOutcome::Rejected;
        }

        task.extracted_text = Some(result.extracted_text);
        task.entities = Some(result.entities);
        task.extracted_fields = Some(result.extracted_fields);
        task.classification = result.classification;
        task.progress = 100;
        task.result_error = None;

        self.events.send(TaskEvent::new(TaskEventKind::Updated, task));
        UpdateOutcome::Applied
    }

    /// Records that the result of a completed task could not be fetched.
    pub fn mark_result_failed(&self, task_id: &str, message: &str) -> UpdateOutcome {
        let mut inner = self.write();
        let Some(task) = inner.tasks.get_mut(task_id) else {
            return UpdateOutcome::Missing;
        };

        if task.status != TaskStatus::Completed {
            return UpdateOutcome::Rejected;
        }

        task.result_error = Some(message.to_string());
        self.events.send(TaskEvent::new(TaskEventKind::Updated, task));
        UpdateOutcome::Applied
    }

    /// Removes a task, returning it if it was present.
    pub fn remove(&self, task_id: &str) -> Option<Task> {
        let mut inner = self.write();
        let removed = inner.tasks.remove(task_id)?;
        inner.order.retain(|id| id != task_id);
        self.events
            .send(TaskEvent::new(TaskEventKind::Removed, &removed));
        Some(removed)
    }

    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.read().tasks.get(task_id).cloned()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.read().tasks.contains_key(task_id)
    }

    /// Returns all tasks in insertion order.
    pub fn get_all(&self) -> Vec<Task> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect()
    }

    pub fn get_processing(&self) -> Vec<Task> {
        self.get_all()
            .into_iter()
            .filter(|t| t.status == TaskStatus::Processing)
            .collect()
    }

    /// Returns `(processing, completed, error)` counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        let inner = self.read();
        let mut processing = 0;
        let mut completed = 0;
        let mut error = 0;

        for task in inner.tasks.values() {
            match task.status {
                TaskStatus::Processing => processing += 1,
                TaskStatus::Completed => completed += 1,
                TaskStatus::Error => error += 1,
            }
        }

        (processing, completed, error)
    }

    pub fn len(&self) -> usize {
        self.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes a task for download.
    pub fn export_json(&self, task_id: &str) -> Option<Result<String, serde_json::Error>> {
        self.get(task_id)
            .map(|task| serde_json::to_string_pretty(&task))
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new(TaskEventBroadcaster::default())
    }
}
