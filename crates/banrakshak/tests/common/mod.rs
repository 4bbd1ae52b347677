//! Shared test utilities for banrakshak integration tests.
//!
//! `FakeBackend` plays scripted status sequences per task and counts every
//! call, so tests can assert both the registry state and the traffic.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use banrakshak::backend::{
    BackendResult, HealthResponse, OcrBackend, ResultResponse, StatusResponse, TaskListResponse,
    UploadResponse,
};
use banrakshak::{BackendError, ClientConfig, TaskEvent, TaskManager, UploadFile};
use tokio::sync::broadcast;

pub const FAKE_BASE_URL: &str = "http://ocr.test";

/// One scripted reply to a status request.
#[derive(Debug, Clone)]
pub enum StatusStep {
    Reply(StatusResponse),
    Fail(String),
}

pub fn processing(progress: f64) -> StatusStep {
    status("processing", progress)
}

pub fn completed() -> StatusStep {
    status("completed", 100.0)
}

pub fn backend_error(message: &str) -> StatusStep {
    StatusStep::Reply(StatusResponse {
        status: "error".to_string(),
        progress: 0.0,
        error_message: Some(message.to_string()),
    })
}

pub fn status(status: &str, progress: f64) -> StatusStep {
    StatusStep::Reply(StatusResponse {
        status: status.to_string(),
        progress,
        error_message: None,
    })
}

/// The canonical result body returned by the backend for a Form A claim.
pub fn sample_result_json() -> serde_json::Value {
    serde_json::json!({
        "result": {
            "extraction": {
                "full_text": "Form A - Claim for Rights to Forest Land. Name: Ram Kumar Sharma, Village: Rampur",
                "entities": [
                    {"text": "Ram Kumar Sharma", "label": "PERSON", "confidence": 0.95, "start_pos": 51, "end_pos": 67},
                    {"word": "Rampur", "label": "LOCATION", "confidence": 0.88},
                    {"word": "Ram"}
                ],
                "extracted_fields": {
                    "claimant_name": "Ram Kumar Sharma",
                    "village": "Rampur",
                    "area_hectares": 2.5
                }
            },
            "classification": {
                "document_type": "FRA Form A - Individual Forest Rights Claim",
                "confidence_level": "HIGH",
                "confidence_score": 92,
                "reasoning": "Mentions Form A and forest land claim",
                "key_indicators": ["Form A", "Forest Rights"],
                "suggested_actions": ["Verify with Gram Sabha"],
                "document_purpose": "Claim individual forest rights",
                "issuing_authority": "Gram Sabha"
            }
        }
    })
}

pub fn sample_result() -> ResultResponse {
    serde_json::from_value(sample_result_json()).expect("sample result should decode")
}

#[derive(Default)]
struct FakeState {
    next_id: usize,
    upload_failure: Option<String>,
    scripts: HashMap<String, VecDeque<StatusStep>>,
    last_step: HashMap<String, StatusStep>,
    status_delays: HashMap<String, Duration>,
    result_failures: HashMap<String, String>,
    delete_failure: Option<String>,
    hang_deletes: bool,
    upload_delay: Option<Duration>,
    fixed_upload_id: Option<String>,
    deleted: Vec<String>,
}

/// Scripted in-memory backend.
///
/// Upload ids are `t1`, `t2`, ... in call order. A task's status script is
/// consumed one step per request; once exhausted the last step repeats.
/// Tasks without a script report `processing` at 0%.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    pub upload_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub result_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn script(&self, task_id: &str, steps: Vec<StatusStep>) {
        self.state()
            .scripts
            .insert(task_id.to_string(), steps.into_iter().collect());
    }

    pub fn fail_uploads(&self, message: &str) {
        self.state().upload_failure = Some(message.to_string());
    }

    pub fn delay_status(&self, task_id: &str, delay: Duration) {
        self.state()
            .status_delays
            .insert(task_id.to_string(), delay);
    }

    pub fn fail_result(&self, task_id: &str, message: &str) {
        self.state()
            .result_failures
            .insert(task_id.to_string(), message.to_string());
    }

    pub fn fail_deletes(&self, message: &str) {
        self.state().delete_failure = Some(message.to_string());
    }

    /// Makes every delete request wait forever.
    pub fn hang_deletes(&self) {
        self.state().hang_deletes = true;
    }

    pub fn delay_uploads(&self, delay: Duration) {
        self.state().upload_delay = Some(delay);
    }

    /// Makes every upload answer with the same task id.
    pub fn reuse_upload_id(&self, task_id: &str) {
        self.state().fixed_upload_id = Some(task_id.to_string());
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    pub fn status_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn result_count(&self) -> usize {
        self.result_calls.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn next_step(&self, task_id: &str) -> (StatusStep, Option<Duration>) {
        let mut state = self.state();
        let delay = state.status_delays.get(task_id).copied();

        let next = state
            .scripts
            .get_mut(task_id)
            .and_then(|steps| steps.pop_front());

        let step = match next {
            Some(step) => {
                state.last_step.insert(task_id.to_string(), step.clone());
                step
            }
            None => state
                .last_step
                .get(task_id)
                .cloned()
                .unwrap_or_else(|| processing(0.0)),
        };
        (step, delay)
    }
}

#[async_trait]
impl OcrBackend for FakeBackend {
    async fn upload(&self, file: &UploadFile) -> BackendResult<UploadResponse> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.state().upload_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();

        if let Some(message) = &state.upload_failure {
            return Err(BackendError::Status {
                endpoint: "/api/ocr/upload".to_string(),
                status: 500,
                body: message.clone(),
            });
        }

        state.next_id += 1;
        let task_id = state
            .fixed_upload_id
            .clone()
            .unwrap_or_else(|| format!("t{}", state.next_id));
        Ok(UploadResponse {
            task_id,
            filename: Some(file.filename.clone()),
            status: Some("queued".to_string()),
            message: None,
        })
    }

    async fn status(&self, task_id: &str) -> BackendResult<StatusResponse> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let (step, delay) = self.next_step(task_id);

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match step {
            StatusStep::Reply(response) => Ok(response),
            StatusStep::Fail(message) => Err(BackendError::Request {
                endpoint: "/api/ocr/status".to_string(),
                message,
            }),
        }
    }

    async fn result(&self, task_id: &str) -> BackendResult<ResultResponse> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.state().result_failures.get(task_id) {
            return Err(BackendError::Status {
                endpoint: "/api/ocr/result".to_string(),
                status: 500,
                body: message.clone(),
            });
        }
        Ok(sample_result())
    }

    async fn delete(&self, task_id: &str) -> BackendResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let hang = self.state().hang_deletes;
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.state();

        if let Some(message) = &state.delete_failure {
            return Err(BackendError::Request {
                endpoint: "/api/ocr/task".to_string(),
                message: message.clone(),
            });
        }
        state.deleted.push(task_id.to_string());
        Ok(())
    }

    async fn list_tasks(&self) -> BackendResult<TaskListResponse> {
        Ok(TaskListResponse {
            tasks: vec![],
            total: 0,
        })
    }

    async fn health(&self) -> BackendResult<HealthResponse> {
        Ok(HealthResponse {
            status: "healthy".to_string(),
            timestamp: None,
            services: Default::default(),
        })
    }
}

/// Config pointing at the fake backend with the default 2s poll interval.
pub fn test_config() -> ClientConfig {
    ClientConfig::default().with_base_url(FAKE_BASE_URL)
}

pub fn manager_with(backend: &Arc<FakeBackend>, config: ClientConfig) -> TaskManager {
    TaskManager::with_backend(config, Arc::clone(backend) as Arc<dyn OcrBackend>)
}

pub fn manager(backend: &Arc<FakeBackend>) -> TaskManager {
    manager_with(backend, test_config())
}

pub fn pdf(name: &str) -> UploadFile {
    UploadFile::from_bytes(name, b"%PDF-1.4 test".to_vec())
}

/// Drains every event currently buffered on the receiver.
pub fn drain(rx: &mut broadcast::Receiver<TaskEvent>) -> Vec<TaskEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Lets the paused clock run forward, driving any poll loops due in between.
pub async fn run_for(duration: Duration) {
    tokio::time::sleep(duration).await;
}
