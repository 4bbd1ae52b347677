//! Boundary to the OCR/NER backend service.

pub mod http;
pub mod wire;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::worker::upload::UploadFile;

pub use http::HttpBackend;
pub use wire::{
    normalize_entities, normalize_entity, normalize_result, HealthResponse, RawEntity,
    RemoteTaskSummary, ResultResponse, StatusResponse, TaskListResponse, UploadResponse,
};

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Operations the task workflow needs from the backend.
///
/// Every call is a suspension point; implementations must not block.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Submits a document and returns the backend-issued task id.
    async fn upload(&self, file: &UploadFile) -> BackendResult<UploadResponse>;

    async fn status(&self, task_id: &str) -> BackendResult<StatusResponse>;

    async fn result(&self, task_id: &str) -> BackendResult<ResultResponse>;

    async fn delete(&self, task_id: &str) -> BackendResult<()>;

    async fn list_tasks(&self) -> BackendResult<TaskListResponse>;

    async fn health(&self) -> BackendResult<HealthResponse>;
}
