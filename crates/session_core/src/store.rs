//! Session-scoped state and the only operations allowed to mutate it.

use shared::{
    domain::{
        HeatmapResult, ImageAsset, ImageId, PatientMetadata, PatientMetadataPatch, SessionView,
        ViewLayout,
    },
    protocol::DiagnosisResult,
};

use crate::view_gate::{self, EnabledViews};

#[derive(Debug, Clone)]
struct SelectedImage {
    id: ImageId,
    asset: ImageAsset,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    layout: ViewLayout,
    last_image_id: ImageId,
    image: Option<SelectedImage>,
    metadata: PatientMetadata,
    diagnosis: Option<DiagnosisResult>,
    heatmap: Option<HeatmapResult>,
    active_view: SessionView,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(ViewLayout::default())
    }
}

impl SessionStore {
    pub fn new(layout: ViewLayout) -> Self {
        Self {
            layout,
            last_image_id: ImageId(0),
            image: None,
            metadata: PatientMetadata::default(),
            diagnosis: None,
            heatmap: None,
            active_view: layout.initial_view(),
        }
    }

    /// Replaces the image. Anything computed for the previous image is dropped.
    pub fn select_image(&mut self, asset: ImageAsset) -> ImageId {
        self.last_image_id = ImageId(self.last_image_id.0 + 1);
        let id = self.last_image_id;
        tracing::debug!(image_id = id.0, file = asset.file_name(), "image selected");
        self.image = Some(SelectedImage { id, asset });
        self.diagnosis = None;
        self.heatmap = None;
        self.reconcile_view();
        id
    }

    pub fn update_patient_metadata(&mut self, patch: PatientMetadataPatch) {
        self.metadata.apply(patch);
    }

    pub fn set_diagnosis_result(&mut self, result: Option<DiagnosisResult>) {
        self.diagnosis = result;
        self.reconcile_view();
    }

    pub fn set_heatmap(&mut self, heatmap: Option<HeatmapResult>) {
        self.heatmap = heatmap;
    }

    pub fn reset(&mut self) {
        self.image = None;
        self.metadata = PatientMetadata::default();
        self.diagnosis = None;
        self.heatmap = None;
        self.active_view = self.layout.initial_view();
    }

    /// Moves to `view` if it is currently enabled; otherwise leaves state alone.
    pub fn navigate(&mut self, view: SessionView) -> bool {
        if !self.enabled_views().contains(view) {
            tracing::debug!(view = view.as_str(), "ignoring navigation to disabled view");
            return false;
        }
        self.active_view = view;
        true
    }

    pub fn layout(&self) -> ViewLayout {
        self.layout
    }

    pub fn image(&self) -> Option<&ImageAsset> {
        self.image.as_ref().map(|selected| &selected.asset)
    }

    pub fn image_id(&self) -> Option<ImageId> {
        self.image.as_ref().map(|selected| selected.id)
    }

    pub fn metadata(&self) -> &PatientMetadata {
        &self.metadata
    }

    pub fn diagnosis(&self) -> Option<&DiagnosisResult> {
        self.diagnosis.as_ref()
    }

    /// The heatmap, but only while it belongs to the selected image.
    pub fn heatmap(&self) -> Option<&HeatmapResult> {
        let current = self.image_id()?;
        self.heatmap
            .as_ref()
            .filter(|heatmap| heatmap.image_id == current)
    }

    pub fn active_view(&self) -> SessionView {
        self.active_view
    }

    pub fn enabled_views(&self) -> EnabledViews {
        view_gate::enabled_views(self.layout, self.image.is_some(), self.diagnosis.is_some())
    }

    fn reconcile_view(&mut self) {
        if !self.enabled_views().contains(self.active_view) {
            self.active_view = self.layout.initial_view();
        }
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
