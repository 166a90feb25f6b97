use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::ImageAssetError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
        )]
        pub struct $name(pub u64);
    };
}

id_newtype!(ImageId);
id_newtype!(RequestSeq);

impl RequestSeq {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// File extensions accepted when an image is picked from disk.
pub const ACCEPTED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// An image picked by the user, kept with enough context to upload and preview it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    file_name: String,
    media_type: String,
    bytes: Vec<u8>,
    preview: String,
}

impl ImageAsset {
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let media_type = media_type.into();
        let preview = format!("data:{media_type};base64,{}", STANDARD.encode(&bytes));
        Self {
            file_name: file_name.into(),
            media_type,
            bytes,
            preview,
        }
    }

    /// Builds an asset whose media type is guessed from the file extension.
    pub fn from_named_bytes(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, ImageAssetError> {
        let file_name = file_name.into();
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !ACCEPTED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ImageAssetError::UnsupportedExtension { file_name });
        }

        let media_type = mime_guess::from_ext(&extension)
            .first()
            .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
            .ok_or_else(|| ImageAssetError::UnsupportedExtension {
                file_name: file_name.clone(),
            })?;
        if bytes.is_empty() {
            return Err(ImageAssetError::Empty { file_name });
        }

        Ok(Self::new(file_name, media_type.essence_str(), bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `data:` URL suitable for rendering the image inline.
    pub fn preview(&self) -> &str {
        &self.preview
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientMetadata {
    pub age: Option<u16>,
    pub pain_level: Option<u8>,
    pub family_history: bool,
    pub lump_detected: bool,
    pub nipple_discharge: bool,
}

impl PatientMetadata {
    pub fn apply(&mut self, patch: PatientMetadataPatch) {
        if let Some(age) = patch.age {
            self.age = age;
        }
        if let Some(pain_level) = patch.pain_level {
            self.pain_level = pain_level;
        }
        if let Some(v) = patch.family_history {
            self.family_history = v;
        }
        if let Some(v) = patch.lump_detected {
            self.lump_detected = v;
        }
        if let Some(v) = patch.nipple_discharge {
            self.nipple_discharge = v;
        }
    }
}

/// Partial metadata update. `None` leaves a field untouched; for the optional
/// fields `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientMetadataPatch {
    pub age: Option<Option<u16>>,
    pub pain_level: Option<Option<u8>>,
    pub family_history: Option<bool>,
    pub lump_detected: Option<bool>,
    pub nipple_discharge: Option<bool>,
}

impl PatientMetadataPatch {
    pub fn age(mut self, age: u16) -> Self {
        self.age = Some(Some(age));
        self
    }

    pub fn clear_age(mut self) -> Self {
        self.age = Some(None);
        self
    }

    pub fn pain_level(mut self, pain_level: u8) -> Self {
        self.pain_level = Some(Some(pain_level));
        self
    }

    pub fn clear_pain_level(mut self) -> Self {
        self.pain_level = Some(None);
        self
    }

    pub fn family_history(mut self, value: bool) -> Self {
        self.family_history = Some(value);
        self
    }

    pub fn lump_detected(mut self, value: bool) -> Self {
        self.lump_detected = Some(value);
        self
    }

    pub fn nipple_discharge(mut self, value: bool) -> Self {
        self.nipple_discharge = Some(value);
        self
    }
}

/// Grad-CAM overlay returned for one specific image selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatmapResult {
    pub image_id: ImageId,
    pub encoded: String,
}

impl HeatmapResult {
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.encoded.as_bytes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionView {
    Overview,
    Upload,
    Results,
    Details,
    Explainability,
}

impl SessionView {
    pub const ALL: [SessionView; 5] = [
        SessionView::Overview,
        SessionView::Upload,
        SessionView::Results,
        SessionView::Details,
        SessionView::Explainability,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SessionView::Overview => "overview",
            SessionView::Upload => "upload",
            SessionView::Results => "results",
            SessionView::Details => "details",
            SessionView::Explainability => "explainability",
        }
    }
}

/// Presentation variant. `Sidebar` adds an overview page in front of upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewLayout {
    #[default]
    Tabs,
    Sidebar,
}

impl ViewLayout {
    pub fn initial_view(self) -> SessionView {
        match self {
            ViewLayout::Tabs => SessionView::Upload,
            ViewLayout::Sidebar => SessionView::Overview,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tabs" => Some(ViewLayout::Tabs),
            "sidebar" => Some(ViewLayout::Sidebar),
            _ => None,
        }
    }
}
