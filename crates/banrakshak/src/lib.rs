pub mod backend;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod task;
pub mod view;
pub mod worker;

pub use backend::{HttpBackend, OcrBackend};
pub use broadcast::{TaskEvent, TaskEventBroadcaster, TaskEventKind, TaskStore, UpdateOutcome};
pub use config::{load_config, load_config_from_str, ClientConfig};
pub use error::{BackendError, ConfigError, OcrError, Result};
pub use task::{
    Classification, ConfidenceLevel, Entity, Task, TaskMetadata, TaskResult, TaskStatus,
};
pub use view::TaskView;
pub use worker::{is_accepted_mime, DeleteOutcome, RemoteDelete, TaskManager, UploadFile};
