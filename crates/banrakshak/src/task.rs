//! Task records tracked by the registry.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix for ids generated locally when the backend never issued one.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Label given to entities the backend did not classify.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Status of a submitted document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Processing,
    Completed,
    Error,
}

impl TaskStatus {
    /// Completed and Error are final; nothing leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Error => write!(f, "error"),
        }
    }
}

/// A named entity recognized in the extracted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub text: String,
    pub label: String,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// Parses the backend's level string; anything unrecognized is `Low`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => ConfidenceLevel::High,
            "MEDIUM" => ConfidenceLevel::Medium,
            _ => ConfidenceLevel::Low,
        }
    }
}

/// Document classification produced by the backend's reasoning agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub document_type: String,
    pub confidence_level: ConfidenceLevel,
    /// Score in `0..=100` as reported by the backend.
    pub confidence_score: f64,
    pub reasoning: String,
    #[serde(default)]
    pub key_indicators: Vec<String>,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    #[serde(default)]
    pub document_purpose: String,
    #[serde(default)]
    pub issuing_authority: String,
}

/// Best-effort file details captured at upload time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    pub page_count: u32,
    pub language: String,
    pub file_size: String,
}

impl TaskMetadata {
    pub fn new(size_bytes: u64, language: &str) -> Self {
        Self {
            page_count: 1,
            language: language.to_string(),
            file_size: format_file_size(size_bytes),
        }
    }
}

/// Formats a byte count the way the upload list shows it, e.g. `"2.30 MB"`.
pub fn format_file_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Normalized result of a completed task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskResult {
    pub extracted_text: String,
    pub entities: Vec<Entity>,
    pub extracted_fields: BTreeMap<String, String>,
    pub classification: Option<Classification>,
}

/// One document submitted for asynchronous processing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub filename: String,
    pub upload_time: DateTime<Utc>,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<Entity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_fields: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    pub metadata: TaskMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Reason for the `Error` status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the result could not be fetched after completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a freshly uploaded task, waiting on the backend.
    pub fn processing(id: &str, filename: &str, metadata: TaskMetadata) -> Self {
        Self {
            id: id.to_string(),
            filename: filename.to_string(),
            upload_time: Utc::now(),
            status: TaskStatus::Processing,
            progress: 0,
            extracted_text: None,
            entities: None,
            extracted_fields: None,
            classification: None,
            metadata,
            mime_type: None,
            error: None,
            result_error: None,
            completed_at: None,
        }
    }

    /// Creates a task for an upload that failed before the backend issued an id.
    pub fn failed_upload(filename: &str, metadata: TaskMetadata, error: &str) -> Self {
        let now = Utc::now();
        Self {
            status: TaskStatus::Error,
            error: Some(error.to_string()),
            completed_at: Some(now),
            upload_time: now,
            ..Self::processing(&local_task_id(), filename, metadata)
        }
    }

    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }

    /// False for placeholder ids that the backend never saw.
    pub fn has_remote_id(&self) -> bool {
        !is_local_id(&self.id)
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// True once a result has been applied.
    pub fn has_result(&self) -> bool {
        self.extracted_text.is_some()
    }

    /// True when no further change is expected: failed, or completed with
    /// its result (or result failure) recorded.
    pub fn is_settled(&self) -> bool {
        match self.status {
            TaskStatus::Processing => false,
            TaskStatus::Error => true,
            TaskStatus::Completed => self.has_result() || self.result_error.is_some(),
        }
    }
}

/// True for placeholder ids generated by [`local_task_id`].
pub fn is_local_id(task_id: &str) -> bool {
    task_id.starts_with(LOCAL_ID_PREFIX)
}

/// Generates a registry-only id for tasks without a backend id.
pub fn local_task_id() -> String {
    format!("{}{}", LOCAL_ID_PREFIX, uuid::Uuid::new_v4())
}
