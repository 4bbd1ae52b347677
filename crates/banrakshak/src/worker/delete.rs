//! Task removal.

use log::{info, warn};
use serde::Serialize;

use crate::backend::OcrBackend;
use crate::task::is_local_id;

/// What happened on the backend side of a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result", content = "reason")]
pub enum RemoteDelete {
    Deleted,
    /// No request was sent (placeholder id or no backend configured).
    Skipped,
    /// The request failed; local removal still happened.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// Whether a local record existed and was removed.
    pub removed: bool,
    pub remote: RemoteDelete,
}

/// Asks the backend to forget a task. Never fails; the caller removes the
/// local record whatever this returns.
pub(crate) async fn delete_remote(backend: Option<&dyn OcrBackend>, task_id: &str) -> RemoteDelete {
    if is_local_id(task_id) {
        return RemoteDelete::Skipped;
    }

    let Some(backend) = backend else {
        return RemoteDelete::Skipped;
    };

    match backend.delete(task_id).await {
        Ok(()) => {
            info!("Deleted task {} on backend", task_id);
            RemoteDelete::Deleted
        }
        Err(e) => {
            warn!("Backend delete of task {} failed: {}", task_id, e);
            RemoteDelete::Failed(e.to_string())
        }
    }
}
