//! HTTP/JSON client for the OCR backend.

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;

use super::wire::{
    HealthResponse, ResultResponse, StatusResponse, TaskListResponse, UploadResponse,
};
use super::{BackendResult, OcrBackend};
use crate::config::ClientConfig;
use crate::error::BackendError;
use crate::worker::upload::UploadFile;

/// Endpoint paths relative to the configured base URL.
pub mod endpoints {
    pub const UPLOAD: &str = "/api/ocr/upload";
    pub const STATUS: &str = "/api/ocr/status";
    pub const RESULT: &str = "/api/ocr/result";
    pub const TASKS: &str = "/api/ocr/tasks";
    pub const DELETE: &str = "/api/ocr/task";
    pub const HEALTH: &str = "/api/health";
}

/// Maximum length for error bodies kept in errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_error_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", truncated)
    } else {
        body.to_string()
    }
}

fn create_http_client(config: &ClientConfig) -> Result<Client, BackendError> {
    Client::builder()
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| BackendError::Request {
            endpoint: "client".to_string(),
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Backend reached over HTTP with `reqwest`.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Creates a backend client; fails when the base URL is not configured.
    pub fn new(config: &ClientConfig) -> Result<Self, crate::error::OcrError> {
        let base_url = config.require_base_url()?;
        let client = create_http_client(config)?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn task_url(&self, path: &str, task_id: &str) -> String {
        format!("{}{}/{}", self.base_url, path, task_id)
    }

    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> BackendResult<Response> {
        let response = request.send().await.map_err(|e| BackendError::Request {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                endpoint: endpoint.to_string(),
                status,
                body: truncate_error_body(&body),
            });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(
        endpoint: &str,
        response: Response,
    ) -> BackendResult<T> {
        response.json().await.map_err(|e| BackendError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, url: String) -> BackendResult<T> {
        let response = self.send(endpoint, self.client.get(&url)).await?;
        Self::decode(endpoint, response).await
    }
}

#[async_trait]
impl OcrBackend for HttpBackend {
    async fn upload(&self, file: &UploadFile) -> BackendResult<UploadResponse> {
        info!(
            "Uploading {} ({}, {} bytes)",
            file.filename,
            file.mime_type,
            file.bytes.len()
        );

        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| BackendError::Request {
                endpoint: endpoints::UPLOAD.to_string(),
                message: format!("Invalid MIME type '{}': {}", file.mime_type, e),
            })?;
        let form = multipart::Form::new().part("file", part);

        let request = self
            .client
            .post(self.url(endpoints::UPLOAD))
            .multipart(form);
        let response = self.send(endpoints::UPLOAD, request).await?;
        let upload: UploadResponse = Self::decode(endpoints::UPLOAD, response).await?;

        if upload.task_id.trim().is_empty() {
            return Err(BackendError::Decode {
                endpoint: endpoints::UPLOAD.to_string(),
                message: "empty task_id".to_string(),
            });
        }

        debug!("Upload of {} accepted as task {}", file.filename, upload.task_id);
        Ok(upload)
    }

    async fn status(&self, task_id: &str) -> BackendResult<StatusResponse> {
        self.get_json(endpoints::STATUS, self.task_url(endpoints::STATUS, task_id))
            .await
    }

    async fn result(&self, task_id: &str) -> BackendResult<ResultResponse> {
        self.get_json(endpoints::RESULT, self.task_url(endpoints::RESULT, task_id))
            .await
    }

    async fn delete(&self, task_id: &str) -> BackendResult<()> {
        let request = self
            .client
            .delete(self.task_url(endpoints::DELETE, task_id));
        self.send(endpoints::DELETE, request).await?;
        Ok(())
    }

    async fn list_tasks(&self) -> BackendResult<TaskListResponse> {
        self.get_json(endpoints::TASKS, self.url(endpoints::TASKS))
            .await
    }

    async fn health(&self) -> BackendResult<HealthResponse> {
        self.get_json(endpoints::HEALTH, self.url(endpoints::HEALTH))
            .await
    }
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .finish()
    }
}
