use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the inference service on non-success statuses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

impl ApiErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageAssetError {
    #[error("'{file_name}' is not a supported image (expected png, jpg, jpeg, gif, bmp or webp)")]
    UnsupportedExtension { file_name: String },
    #[error("'{file_name}' is empty")]
    Empty { file_name: String },
}
