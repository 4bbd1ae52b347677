//! Document submission.

use std::path::Path;

use log::{info, warn};

use crate::backend::OcrBackend;
use crate::broadcast::TaskStore;
use crate::error::BackendError;
use crate::task::{Task, TaskMetadata};

/// A document ready to be submitted.
#[derive(Clone)]
pub struct UploadFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        }
    }

    /// Builds an upload with the MIME type guessed from the file name.
    pub fn from_bytes(filename: &str, bytes: Vec<u8>) -> Self {
        let mime_type = mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self::new(filename, &mime_type, bytes)
    }

    /// Reads a file from disk.
    pub async fn from_path(path: &Path) -> Result<Self, BackendError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| BackendError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());

        Ok(Self::from_bytes(&filename, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_accepted(&self) -> bool {
        is_accepted_mime(&self.mime_type)
    }
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// PDFs and any `image/*` type are accepted for OCR.
pub fn is_accepted_mime(mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence == "application/pdf" || essence.starts_with("image/")
}

/// Submits a file and registers exactly one task for the attempt.
///
/// A failed submission is registered too, in the error state under a
/// local placeholder id.
pub(crate) async fn submit(
    backend: &dyn OcrBackend,
    store: &TaskStore,
    file: &UploadFile,
    language: &str,
) -> Task {
    let metadata = TaskMetadata::new(file.size(), language);

    let task = match backend.upload(file).await {
        Ok(response) => {
            info!(
                "Uploaded {} as task {}",
                file.filename, response.task_id
            );
            Task::processing(&response.task_id, &file.filename, metadata)
        }
        Err(e) => {
            warn!("Upload of {} failed: {}", file.filename, e);
            Task::failed_upload(&file.filename, metadata, &e.to_string())
        }
    }
    .with_mime_type(&file.mime_type);

    if !store.insert(task.clone()).is_applied() {
        // The backend reused the id of a finished task; keep the finished record.
        return store.get(&task.id).unwrap_or(task);
    }
    task
}
