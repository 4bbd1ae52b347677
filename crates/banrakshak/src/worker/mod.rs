pub mod delete;
pub mod fetcher;
pub mod poller;
pub mod upload;

pub use delete::{DeleteOutcome, RemoteDelete};
pub use fetcher::FetchOutcome;
pub use poller::PollExit;
pub use upload::{is_accepted_mime, UploadFile};

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use crate::backend::{HealthResponse, HttpBackend, OcrBackend, TaskListResponse};
use crate::broadcast::{TaskEvent, TaskEventBroadcaster, TaskStore};
use crate::config::ClientConfig;
use crate::error::{ConfigError, OcrError, Result};
use crate::task::{Task, TaskStatus};
use crate::view::TaskView;
use delete::delete_remote;
use poller::{poll_task, PollContext};
use upload::submit;

/// `tokio::time::interval` panics on a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

struct PollHandle {
    generation: u64,
    token: CancellationToken,
    _handle: JoinHandle<PollExit>,
}

type PollerMap = HashMap<String, PollHandle>;

fn lock_pollers(pollers: &Mutex<PollerMap>) -> MutexGuard<'_, PollerMap> {
    match pollers.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Drives the upload, poll, fetch and delete workflow for every task.
///
/// All task state lives in the shared [`TaskStore`]; the manager only owns
/// the poll loops. Must be used from within a tokio runtime.
pub struct TaskManager {
    config: ClientConfig,
    backend: Option<Arc<dyn OcrBackend>>,
    store: Arc<TaskStore>,
    view: TaskView,
    pollers: Arc<Mutex<PollerMap>>,
    next_generation: AtomicU64,
    shutdown: CancellationToken,
}

impl TaskManager {
    /// Creates a manager talking to the HTTP backend named in `config`.
    ///
    /// A missing or invalid base URL is not an error here; it surfaces on
    /// the first upload.
    pub fn new(config: ClientConfig) -> Self {
        let backend: Option<Arc<dyn OcrBackend>> = if config.has_base_url() {
            match HttpBackend::new(&config) {
                Ok(backend) => Some(Arc::new(backend)),
                Err(e) => {
                    warn!("Backend client unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self::build(config, backend)
    }

    /// Creates a manager with an explicit backend implementation.
    pub fn with_backend(config: ClientConfig, backend: Arc<dyn OcrBackend>) -> Self {
        Self::build(config, Some(backend))
    }

    fn build(config: ClientConfig, backend: Option<Arc<dyn OcrBackend>>) -> Self {
        let events = TaskEventBroadcaster::new(config.event_capacity);
        let store = Arc::new(TaskStore::new(events));
        let view = TaskView::new(Arc::clone(&store));

        Self {
            config,
            backend,
            store,
            view,
            pollers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn view(&self) -> &TaskView {
        &self.view
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.store.events().subscribe()
    }

    fn backend(&self) -> Result<&Arc<dyn OcrBackend>> {
        self.config.require_base_url()?;
        self.backend
            .as_ref()
            .ok_or_else(|| ConfigError::MissingBaseUrl.into())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shutdown() {
            return Err(OcrError::ShutDown);
        }
        Ok(())
    }

    /// Submits a document and starts polling it.
    ///
    /// A configuration problem, or a manager that was already shut down, is
    /// returned as an error before any request is made. A failed submission
    /// is still registered, as a task in the error state, and returned as
    /// `Ok`.
    pub async fn upload(&self, file: UploadFile) -> Result<Task> {
        self.ensure_running()?;
        let backend = Arc::clone(self.backend()?);

        let span = info_span!("task.upload", filename = %file.filename);
        let task = submit(backend.as_ref(), &self.store, &file, &self.config.language)
            .instrument(span)
            .await;

        if task.status != TaskStatus::Processing {
            return Ok(task);
        }

        if self.is_shutdown() {
            // The upload went out but nothing will poll it.
            warn!("Task {} uploaded after shutdown, not polling", task.id);
            self.store.apply_status(
                &task.id,
                TaskStatus::Error,
                0,
                Some("Task manager shut down before polling started"),
            );
            return Ok(self.store.get(&task.id).unwrap_or(task));
        }

        self.start_polling(&task.id);
        Ok(task)
    }

    /// Reads a file from disk and uploads it.
    pub async fn upload_path(&self, path: &Path) -> Result<Task> {
        self.ensure_running()?;
        self.backend()?;
        let file = UploadFile::from_path(path).await?;
        self.upload(file).await
    }

    fn start_polling(&self, task_id: &str) {
        let Some(backend) = self.backend.clone() else {
            return;
        };

        let ctx = PollContext {
            backend,
            store: Arc::clone(&self.store),
            interval: self.config.poll_interval().max(MIN_POLL_INTERVAL),
            max_duration: self.config.max_poll_duration(),
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown.child_token();
        let loop_token = token.clone();
        let pollers = Arc::clone(&self.pollers);
        let id = task_id.to_string();
        let span = info_span!("task.poll", task_id = %id);

        // Held across the spawn so the loop cannot deregister before it is registered.
        let mut active = lock_pollers(&self.pollers);
        if let Some(previous) = active.remove(task_id) {
            previous.token.cancel();
        }

        let handle = tokio::spawn(
            async move {
                let exit = poll_task(ctx, id.clone(), loop_token).await;
                debug!("Poll loop for task {} ended: {:?}", id, exit);

                let mut active = lock_pollers(&pollers);
                if active.get(&id).is_some_and(|h| h.generation == generation) {
                    active.remove(&id);
                }
                exit
            }
            .instrument(span),
        );

        active.insert(
            task_id.to_string(),
            PollHandle {
                generation,
                token,
                _handle: handle,
            },
        );
    }

    /// Stops polling a task. Returns whether a loop was running.
    pub fn cancel_polling(&self, task_id: &str) -> bool {
        match lock_pollers(&self.pollers).remove(task_id) {
            Some(poller) => {
                poller.token.cancel();
                debug!("Cancelled polling for task {}", task_id);
                true
            }
            None => false,
        }
    }

    pub fn is_polling(&self, task_id: &str) -> bool {
        lock_pollers(&self.pollers).contains_key(task_id)
    }

    pub fn active_pollers(&self) -> usize {
        lock_pollers(&self.pollers).len()
    }

    /// Removes a task everywhere. Never fails.
    ///
    /// Polling stops and the local record is removed before the backend is
    /// contacted. The backend delete is best-effort and skipped for tasks
    /// the backend never saw.
    pub async fn delete(&self, task_id: &str) -> DeleteOutcome {
        self.cancel_polling(task_id);
        self.view.clear_if_selected(task_id);
        let removed = self.store.remove(task_id).is_some();

        let remote = delete_remote(self.backend.as_deref(), task_id).await;

        info!(
            "Deleted task {} (local: {}, remote: {:?})",
            task_id, removed, remote
        );
        DeleteOutcome { removed, remote }
    }

    /// Waits until a task has no further changes coming.
    ///
    /// Returns `None` if the task is (or becomes) unknown, and the current
    /// snapshot if the manager shuts down first.
    pub async fn wait_until_settled(&self, task_id: &str) -> Option<Task> {
        let mut events = self.subscribe();

        loop {
            let task = self.store.get(task_id)?;
            if task.is_settled() {
                return Some(task);
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return self.store.get(task_id),
                event = events.recv() => match event {
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return self.store.get(task_id),
                },
            }
        }
    }

    /// Lists the tasks the backend currently knows about.
    pub async fn list_remote_tasks(&self) -> Result<TaskListResponse> {
        Ok(self.backend()?.list_tasks().await?)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        Ok(self.backend()?.health().await?)
    }

    /// Cancels every poll loop. Records stay in the store.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let mut active = lock_pollers(&self.pollers);
        let count = active.len();
        active.clear();
        if count > 0 {
            info!("Stopped {} poll loop(s)", count);
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("config", &self.config)
            .field("has_backend", &self.backend.is_some())
            .field("tasks", &self.store.len())
            .field("active_pollers", &self.active_pollers())
            .finish()
    }
}
