//! Read-only view of the registry for the presentation layer.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use crate::broadcast::{TaskEvent, TaskStore};
use crate::task::{Entity, Task};

/// Exposes all tasks and the selected one.
///
/// Only the selected id is held here; the task itself is looked up in the
/// store on every read, so the view never shows a stale copy.
pub struct TaskView {
    store: Arc<TaskStore>,
    selected: RwLock<Option<String>>,
}

impl TaskView {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self {
            store,
            selected: RwLock::new(None),
        }
    }

    /// All tasks in insertion order.
    pub fn tasks(&self) -> Vec<Task> {
        self.store.get_all()
    }

    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.store.get(task_id)
    }

    /// Selects a task. An unknown id clears the selection and returns `None`.
    pub fn select(&self, task_id: &str) -> Option<Task> {
        let task = self.store.get(task_id);
        let mut selected = match self.selected.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *selected = task.as_ref().map(|t| t.id.clone());
        task
    }

    pub fn selected_id(&self) -> Option<String> {
        match self.selected.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The selected task as currently stored, or `None` if it was removed.
    pub fn selected(&self) -> Option<Task> {
        self.selected_id().and_then(|id| self.store.get(&id))
    }

    pub fn clear_selection(&self) {
        match self.selected.write() {
            Ok(mut g) => *g = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    /// Clears the selection if it points at `task_id`. Returns whether it did.
    pub fn clear_if_selected(&self, task_id: &str) -> bool {
        let mut selected = match self.selected.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if selected.as_deref() == Some(task_id) {
            *selected = None;
            true
        } else {
            false
        }
    }

    /// Entities of the selected task grouped by label.
    pub fn entities_by_label(&self) -> BTreeMap<String, Vec<Entity>> {
        let mut grouped: BTreeMap<String, Vec<Entity>> = BTreeMap::new();
        let entities = self
            .selected()
            .and_then(|t| t.entities)
            .unwrap_or_default();

        for entity in entities {
            grouped.entry(entity.label.clone()).or_default().push(entity);
        }
        grouped
    }

    /// Returns `(processing, completed, error)` counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.store.counts()
    }

    /// Receives every registry mutation as it happens.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.store.events().subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::TaskEventKind;
    use crate::task::{TaskMetadata, TaskResult, TaskStatus};

    fn view_with(ids: &[&str]) -> (Arc<TaskStore>, TaskView) {
        let store = Arc::new(TaskStore::default());
        for id in ids {
            store.insert(Task::processing(id, "claim.pdf", TaskMetadata::new(0, "English")));
        }
        let view = TaskView::new(Arc::clone(&store));
        (store, view)
    }

    #[test]
    fn test_select_unknown_is_no_selection() {
        let (_store, view) = view_with(&["t1"]);
        assert!(view.select("missing").is_none());
        assert!(view.selected().is_none());
        assert!(view.selected_id().is_none());
    }

    #[test]
    fn test_select_unknown_replaces_previous_selection() {
        let (_store, view) = view_with(&["t1"]);
        view.select("t1");
        assert!(view.select("missing").is_none());
        assert!(view.selected().is_none());
    }

    #[test]
    fn test_selected_reflects_store_updates() {
        let (store, view) = view_with(&["t1", "t2"]);
        view.select("t1");

        store.apply_status("t1", TaskStatus::Processing, 60, None);
        assert_eq!(view.selected().unwrap().progress, 60);

        store.remove("t1");
        assert!(view.selected().is_none());
    }

    #[test]
    fn test_clear_if_selected() {
        let (_store, view) = view_with(&["t1", "t2"]);
        view.select("t1");

        assert!(!view.clear_if_selected("t2"));
        assert_eq!(view.selected_id().as_deref(), Some("t1"));
        assert!(view.clear_if_selected("t1"));
        assert!(view.selected_id().is_none());
    }

    #[test]
    fn test_tasks_in_insertion_order() {
        let (_store, view) = view_with(&["t2", "t1"]);
        let ids: Vec<String> = view.tasks().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["t2", "t1"]);
    }

    #[test]
    fn test_subscribe_pushes_updates() {
        let (store, view) = view_with(&[]);
        let mut rx = view.subscribe();

        store.insert(Task::processing("t1", "claim.pdf", TaskMetadata::new(0, "English")));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, TaskEventKind::Created);
        assert_eq!(event.task_id, "t1");
    }

    #[test]
    fn test_entities_by_label() {
        let (store, view) = view_with(&["t1"]);
        store.apply_status("t1", TaskStatus::Completed, 100, None);
        let entity = |text: &str, label: &str| Entity {
            text: text.to_string(),
            label: label.to_string(),
            confidence: 0.9,
            start: 0,
            end: 0,
        };
        store.complete_with_result(
            "t1",
            TaskResult {
                extracted_text: "text".to_string(),
                entities: vec![
                    entity("Rampur", "LOCATION"),
                    entity("Ram Kumar Sharma", "PERSON"),
                    entity("Seoni", "LOCATION"),
                ],
                ..Default::default()
            },
        );

        assert!(view.entities_by_label().is_empty());
        view.select("t1");
        let grouped = view.entities_by_label();
        assert_eq!(grouped["LOCATION"].len(), 2);
        assert_eq!(grouped["PERSON"].len(), 1);
    }
}
