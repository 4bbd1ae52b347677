//! Wire formats of the OCR backend and their normalization into task types.
//!
//! The backend is lenient about field names and presence, so every response
//! type here is tolerant: unknown fields are ignored, missing or `null` ones default.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::task::{
    Classification, ConfidenceLevel, Entity, TaskResult, TaskStatus, UNKNOWN_LABEL,
};

/// Reads an explicit `null` as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response to `POST /api/ocr/upload`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadResponse {
    pub task_id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response to `GET /api/ocr/status/{task_id}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress: f64,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl StatusResponse {
    /// Maps the wire status onto a task status.
    ///
    /// `queued` is the backend's state between upload and the first
    /// processing step and counts as processing.
    pub fn task_status(&self) -> Result<TaskStatus, String> {
        match self.status.trim().to_ascii_lowercase().as_str() {
            "processing" | "queued" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "error" | "failed" => Ok(TaskStatus::Error),
            other => Err(format!("unknown task status '{}'", other)),
        }
    }

    /// Progress as a whole percentage within `0..=100`.
    pub fn progress_percent(&self) -> u8 {
        percent(self.progress)
    }
}

fn percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// Response to `GET /api/ocr/result/{task_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultResponse {
    #[serde(default)]
    pub result: Option<ResultPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultPayload {
    #[serde(default)]
    pub extraction: Option<Extraction>,
    #[serde(default)]
    pub classification: Option<RawClassification>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Extraction {
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entities: Vec<RawEntity>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub extracted_fields: serde_json::Map<String, serde_json::Value>,
}

/// Entity as sent by the backend; the text may arrive as `text` or `word`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntity {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub word: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, alias = "start")]
    pub start_pos: Option<f64>,
    #[serde(default, alias = "end")]
    pub end_pos: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClassification {
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub confidence_level: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_indicators: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suggested_actions: Vec<String>,
    #[serde(default)]
    pub document_purpose: Option<String>,
    #[serde(default)]
    pub issuing_authority: Option<String>,
}

/// One entry of `GET /api/ocr/tasks`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteTaskSummary {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filename: String,
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress: f64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_result: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskListResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<RemoteTaskSummary>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u64,
}

/// Response to `GET /api/health`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub services: BTreeMap<String, bool>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

fn position(value: Option<f64>) -> usize {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v as usize,
        _ => 0,
    }
}

fn confidence(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => {
            // Some extractors report tesseract-style percentages.
            let v = if v > 1.0 { v / 100.0 } else { v };
            v.clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

/// Maps a raw entity onto the canonical shape.
///
/// `text` wins over `word`; a missing label becomes `UNKNOWN`, missing
/// confidence and positions become 0.
pub fn normalize_entity(raw: RawEntity) -> Entity {
    let text = raw
        .text
        .filter(|t| !t.is_empty())
        .or(raw.word)
        .unwrap_or_default();

    let label = raw
        .label
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string());

    Entity {
        text,
        label,
        confidence: confidence(raw.confidence),
        start: position(raw.start_pos),
        end: position(raw.end_pos),
    }
}

pub fn normalize_entities(raw: Vec<RawEntity>) -> Vec<Entity> {
    raw.into_iter().map(normalize_entity).collect()
}

fn field_value(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn normalize_classification(raw: RawClassification) -> Classification {
    Classification {
        document_type: raw.document_type.unwrap_or_else(|| "Unknown".to_string()),
        confidence_level: raw
            .confidence_level
            .as_deref()
            .map(ConfidenceLevel::parse)
            .unwrap_or(ConfidenceLevel::Low),
        confidence_score: raw
            .confidence_score
            .filter(|s| s.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, 100.0),
        reasoning: raw.reasoning.unwrap_or_default(),
        key_indicators: raw.key_indicators,
        suggested_actions: raw.suggested_actions,
        document_purpose: raw.document_purpose.unwrap_or_default(),
        issuing_authority: raw.issuing_authority.unwrap_or_default(),
    }
}

/// Normalizes a result response. Missing sections become empty values.
pub fn normalize_result(response: ResultResponse) -> TaskResult {
    let payload = response.result.unwrap_or_default();
    let extraction = payload.extraction.unwrap_or_default();

    TaskResult {
        extracted_text: extraction.full_text.unwrap_or_default(),
        entities: normalize_entities(extraction.entities),
        extracted_fields: extraction
            .extracted_fields
            .into_iter()
            .map(|(k, v)| (k, field_value(v)))
            .collect(),
        classification: payload.classification.map(normalize_classification),
    }
}
