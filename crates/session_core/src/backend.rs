//! Transport to the inference service: payload builders, the backend seam and
//! its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ImageAsset, PatientMetadata},
    error::ApiErrorBody,
    protocol::{DiagnosisResult, GradcamResponse, HealthStatus},
};
use url::Url;

use crate::error::BackendError;

const MAX_ERROR_DETAIL_LEN: usize = 200;

/// Multipart body of `POST /api/diagnose`, minus transport details.
#[derive(Debug, Clone)]
pub struct DiagnosePayload {
    image: ImageAsset,
    fields: Vec<(&'static str, String)>,
}

impl DiagnosePayload {
    pub fn new(image: ImageAsset, metadata: &PatientMetadata) -> Self {
        let mut fields = vec![("enhance", true.to_string())];
        if let Some(age) = metadata.age {
            fields.push(("age", age.to_string()));
        }
        if let Some(pain_level) = metadata.pain_level {
            fields.push(("pain_level", pain_level.to_string()));
        }
        fields.push(("family_history", metadata.family_history.to_string()));
        fields.push(("lump_detected", metadata.lump_detected.to_string()));
        fields.push(("nipple_discharge", metadata.nipple_discharge.to_string()));
        Self { image, fields }
    }

    pub fn image(&self) -> &ImageAsset {
        &self.image
    }

    pub fn text_fields(&self) -> &[(&'static str, String)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    fn into_form(self) -> Result<Form, BackendError> {
        let mut form = Form::new().part("image", image_part(&self.image)?);
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        Ok(form)
    }
}

/// Multipart body of `POST /api/gradcam`: the image alone.
#[derive(Debug, Clone)]
pub struct ExplainPayload {
    image: ImageAsset,
}

impl ExplainPayload {
    pub fn new(image: ImageAsset) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &ImageAsset {
        &self.image
    }

    fn into_form(self) -> Result<Form, BackendError> {
        Ok(Form::new().part("image", image_part(&self.image)?))
    }
}

fn image_part(image: &ImageAsset) -> Result<Part, BackendError> {
    Ok(Part::bytes(image.bytes().to_vec())
        .file_name(image.file_name().to_string())
        .mime_str(image.media_type())?)
}

#[async_trait]
pub trait DiagnosisBackend: Send + Sync {
    async fn diagnose(&self, payload: DiagnosePayload) -> Result<DiagnosisResult, BackendError>;
    /// Returns the base64-encoded heatmap.
    async fn explain(&self, payload: ExplainPayload) -> Result<String, BackendError>;
    async fn health(&self) -> Result<HealthStatus, BackendError>;
}

pub struct HttpDiagnosisBackend {
    http: Client,
    base_url: String,
}

impl HttpDiagnosisBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }
}

#[async_trait]
impl DiagnosisBackend for HttpDiagnosisBackend {
    async fn diagnose(&self, payload: DiagnosePayload) -> Result<DiagnosisResult, BackendError> {
        let response = self
            .http
            .post(self.endpoint("diagnose"))
            .multipart(payload.into_form()?)
            .send()
            .await?;
        decode_json(ensure_success(response).await?).await
    }

    async fn explain(&self, payload: ExplainPayload) -> Result<String, BackendError> {
        let response = self
            .http
            .post(self.endpoint("gradcam"))
            .multipart(payload.into_form()?)
            .send()
            .await?;
        let body: GradcamResponse = decode_json(ensure_success(response).await?).await?;
        STANDARD.decode(body.heatmap.as_bytes())?;
        Ok(body.heatmap)
    }

    async fn health(&self) -> Result<HealthStatus, BackendError> {
        let response = self.http.get(self.endpoint("health")).send().await?;
        decode_json(ensure_success(response).await?).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let raw = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ApiErrorBody>(&raw) {
        Ok(body) => body.detail,
        Err(_) => {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| trimmed.chars().take(MAX_ERROR_DETAIL_LEN).collect())
        }
    };
    Err(BackendError::Status { status, detail })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
}

/// Trims whitespace and trailing slashes and checks the value is an http(s) URL.
pub fn normalize_base_url(raw: &str) -> Result<String, BackendError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|e| BackendError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(BackendError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
