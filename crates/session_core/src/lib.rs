//! Orchestration core for a mammogram diagnosis session: state store, request
//! coordination against the inference service, view gating, and notifications.

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod notify;
pub mod runtime;
pub mod store;
pub mod view_gate;

use std::path::Path;

pub use backend::{DiagnosePayload, DiagnosisBackend, ExplainPayload, HttpDiagnosisBackend};
pub use config::{load_settings, Settings};
pub use coordinator::{ApplyOutcome, RequestCoordinator, Ticket};
pub use error::{BackendError, SessionError};
pub use notify::{
    BroadcastSink, Notification, NotificationKind, NotificationSink, Operation, TracingSink,
};
pub use runtime::{Completion, SessionRuntime, UserAction};
pub use store::SessionStore;

use shared::domain::ImageAsset;

/// Reads an image from disk, keeping its file name and guessing its media type.
pub async fn load_image(path: &Path) -> Result<ImageAsset, SessionError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| SessionError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(ImageAsset::from_named_bytes(file_name, bytes)?)
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
