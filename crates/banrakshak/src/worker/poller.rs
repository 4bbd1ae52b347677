//! Per-task status polling.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::fetcher::{fetch_result, FetchOutcome};
use crate::backend::OcrBackend;
use crate::broadcast::{TaskStore, UpdateOutcome};
use crate::task::TaskStatus;

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollExit {
    /// The backend reported completion; carries the result fetch outcome.
    Completed(FetchOutcome),
    /// The backend reported an error or a status check failed.
    Failed,
    /// The task was still processing when the poll deadline passed.
    TimedOut,
    /// The loop was cancelled (task deleted or manager shut down).
    Cancelled,
    /// The task left the registry without the loop being cancelled.
    Missing,
}

/// Everything a poll loop needs, cloned into its spawned task.
#[derive(Clone)]
pub(crate) struct PollContext {
    pub backend: Arc<dyn OcrBackend>,
    pub store: Arc<TaskStore>,
    pub interval: Duration,
    pub max_duration: Duration,
}

fn outcome_exit(outcome: UpdateOutcome, otherwise: PollExit) -> PollExit {
    match outcome {
        UpdateOutcome::Applied => otherwise,
        UpdateOutcome::Missing | UpdateOutcome::Rejected => PollExit::Missing,
    }
}

/// Polls a task until it reaches a terminal state, is cancelled, or times out.
///
/// Only one status request is in flight at a time. Nothing is written to the
/// registry once `token` is cancelled.
pub(crate) async fn poll_task(
    ctx: PollContext,
    task_id: String,
    token: CancellationToken,
) -> PollExit {
    let deadline = Instant::now() + ctx.max_duration;
    let mut ticker = tokio::time::interval(ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // skip immediate first tick

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return PollExit::Cancelled,
            _ = ticker.tick() => {}
        }

        if Instant::now() >= deadline {
            warn!(
                "Task {} still processing after {:?}, giving up",
                task_id, ctx.max_duration
            );
            let message = format!("Processing timed out after {}s", ctx.max_duration.as_secs());
            let outcome = ctx
                .store
                .apply_status(&task_id, TaskStatus::Error, 0, Some(&message));
            return outcome_exit(outcome, PollExit::TimedOut);
        }

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return PollExit::Cancelled,
            response = ctx.backend.status(&task_id) => response,
        };

        if token.is_cancelled() {
            return PollExit::Cancelled;
        }

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!("Status check for task {} failed: {}", task_id, e);
                let message = format!("Status check failed: {}", e);
                let outcome = ctx
                    .store
                    .apply_status(&task_id, TaskStatus::Error, 0, Some(&message));
                return outcome_exit(outcome, PollExit::Failed);
            }
        };

        let progress = response.progress_percent();
        let status = match response.task_status() {
            Ok(status) => status,
            Err(message) => {
                warn!("Task {}: {}", task_id, message);
                let outcome = ctx
                    .store
                    .apply_status(&task_id, TaskStatus::Error, progress, Some(&message));
                return outcome_exit(outcome, PollExit::Failed);
            }
        };

        debug!("Task {} is {} ({}%)", task_id, status, progress);

        match status {
            TaskStatus::Processing => {
                let outcome = ctx
                    .store
                    .apply_status(&task_id, status, progress, None);
                if !outcome.is_applied() {
                    return PollExit::Missing;
                }
            }
            TaskStatus::Completed => {
                let outcome = ctx.store.apply_status(&task_id, status, progress, None);
                if !outcome.is_applied() {
                    return PollExit::Missing;
                }
                info!("Task {} completed, fetching result", task_id);
                let fetched =
                    fetch_result(ctx.backend.as_ref(), &ctx.store, &task_id, &token).await;
                return PollExit::Completed(fetched);
            }
            TaskStatus::Error => {
                let message = response
                    .error_message
                    .as_deref()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or("Backend reported an error");
                warn!("Task {} failed: {}", task_id, message);
                let outcome = ctx
                    .store
                    .apply_status(&task_id, status, progress, Some(message));
                return outcome_exit(outcome, PollExit::Failed);
            }
        }
    }
}
