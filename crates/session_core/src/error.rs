use reqwest::StatusCode;
use shared::error::ImageAssetError;
use thiserror::Error;

/// Failure of a single backend call. Always recoverable by issuing the call again.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid api base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("request to inference service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("inference service returned {status}{}", detail_suffix(.detail))]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },
    #[error("invalid response from inference service: {0}")]
    Decode(String),
    #[error("heatmap payload is not valid base64: {0}")]
    InvalidHeatmap(#[from] base64::DecodeError),
    #[error("backend task ended without a response: {0}")]
    TaskAborted(String),
}

impl BackendError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Transport(err) if err.is_timeout())
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(": {detail}"),
        None => String::new(),
    }
}

/// Caller-side contract violations, rejected before anything is dispatched.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no image selected")]
    NoImageSelected,
    #[error(transparent)]
    UnsupportedImage(#[from] ImageAssetError),
    #[error("failed to read image '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}
