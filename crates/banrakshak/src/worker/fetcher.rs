//! One-shot retrieval of a completed task's result.

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::backend::{normalize_result, OcrBackend};
use crate::broadcast::{TaskStore, UpdateOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// The request failed; the task stays completed with `result_error` set.
    Failed(String),
    Cancelled,
    /// The task disappeared from the registry while the request was in flight.
    Missing,
}

pub(crate) async fn fetch_result(
    backend: &dyn OcrBackend,
    store: &TaskStore,
    task_id: &str,
    token: &CancellationToken,
) -> FetchOutcome {
    let response = tokio::select! {
        biased;
        _ = token.cancelled() => return FetchOutcome::Cancelled,
        response = backend.result(task_id) => response,
    };

    if token.is_cancelled() {
        return FetchOutcome::Cancelled;
    }

    match response {
        Ok(response) => {
            let result = normalize_result(response);
            let entity_count = result.entities.len();
            match store.complete_with_result(task_id, result) {
                UpdateOutcome::Applied => {
                    info!(
                        "Fetched result for task {} ({} entities)",
                        task_id, entity_count
                    );
                    FetchOutcome::Applied
                }
                _ => FetchOutcome::Missing,
            }
        }
        Err(e) => {
            warn!("Failed to fetch result for task {}: {}", task_id, e);
            let message = e.to_string();
            match store.mark_result_failed(task_id, &message) {
                UpdateOutcome::Applied => FetchOutcome::Failed(message),
                _ => FetchOutcome::Missing,
            }
        }
    }
}
