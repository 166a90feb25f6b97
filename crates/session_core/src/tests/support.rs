use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use shared::{
    domain::ImageAsset,
    protocol::{
        CombinedRecommendation, ConfidenceAssessment, DiagnosisResult, ExpertAnalysis, FiredRule,
        FollowUp, FuzzyAnalysis, HealthStatus, MlPrediction, RiskCategory, UncertaintyLevel,
    },
};
use tokio::sync::{mpsc, oneshot};

use crate::{
    backend::{DiagnosePayload, DiagnosisBackend, ExplainPayload},
    error::BackendError,
    notify::{Notification, NotificationSink},
};

pub(crate) fn image(name: &str) -> ImageAsset {
    ImageAsset::new(name, "image/png", name.as_bytes().to_vec())
}

pub(crate) fn sample_diagnosis(predicted_class: &str, confidence: f64) -> DiagnosisResult {
    let malignant = if predicted_class == "malignant" {
        confidence
    } else {
        1.0 - confidence
    };
    DiagnosisResult {
        ml_prediction: MlPrediction {
            predicted_class: predicted_class.to_string(),
            confidence,
            probabilities: BTreeMap::from([
                ("benign".to_string(), 1.0 - malignant),
                ("malignant".to_string(), malignant),
            ]),
            severity_score: malignant * 100.0,
        },
        expert_analysis: ExpertAnalysis {
            rules_fired: vec![FiredRule {
                id: "R001".to_string(),
                name: "Confidence check".to_string(),
                description: "Model confidence evaluated".to_string(),
            }],
            explanations: vec!["Model output is consistent with history".to_string()],
            additional_considerations: Vec::new(),
            follow_up: FollowUp {
                recommended_days: Some(365),
                description: "Annual routine screening".to_string(),
            },
            confidence_assessment: ConfidenceAssessment {
                level: "very_high".to_string(),
                description: "Very high confidence in prediction".to_string(),
                reliability: "Results are highly reliable".to_string(),
            },
        },
        fuzzy_analysis: FuzzyAnalysis {
            fuzzy_risk_score: malignant * 100.0,
            risk_category: Some(RiskCategory::Low),
            uncertainty_level: UncertaintyLevel::Low,
            interpretation: "Low risk".to_string(),
        },
        combined_recommendation: CombinedRecommendation {
            summary: format!("likely {predicted_class}"),
            final_risk_category: RiskCategory::Low,
            composite_risk_score: malignant * 100.0,
            recommended_action: None,
            confidence_level: Some("high".to_string()),
            top_recommendations: vec!["Continue routine screening".to_string()],
            needs_immediate_attention: false,
        },
        image_stats: None,
    }
}

pub(crate) fn server_error(detail: &str) -> BackendError {
    BackendError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        detail: Some(detail.to_string()),
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub(crate) fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.lock().expect("sink lock"))
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .expect("sink lock")
            .push(notification);
    }
}

pub(crate) struct PendingDiagnose {
    pub payload: DiagnosePayload,
    pub respond: oneshot::Sender<Result<DiagnosisResult, BackendError>>,
}

pub(crate) struct PendingExplain {
    pub payload: ExplainPayload,
    pub respond: oneshot::Sender<Result<String, BackendError>>,
}

/// Backend whose calls stay pending until the test answers them, in any order.
pub(crate) struct ScriptedBackend {
    diagnose_tx: mpsc::UnboundedSender<PendingDiagnose>,
    explain_tx: mpsc::UnboundedSender<PendingExplain>,
}

pub(crate) struct BackendControl {
    pub diagnose_rx: mpsc::UnboundedReceiver<PendingDiagnose>,
    pub explain_rx: mpsc::UnboundedReceiver<PendingExplain>,
}

impl BackendControl {
    pub(crate) async fn next_diagnose(&mut self) -> PendingDiagnose {
        self.diagnose_rx.recv().await.expect("diagnose call")
    }

    pub(crate) async fn next_explain(&mut self) -> PendingExplain {
        self.explain_rx.recv().await.expect("explain call")
    }
}

pub(crate) fn scripted_backend() -> (ScriptedBackend, BackendControl) {
    let (diagnose_tx, diagnose_rx) = mpsc::unbounded_channel();
    let (explain_tx, explain_rx) = mpsc::unbounded_channel();
    (
        ScriptedBackend {
            diagnose_tx,
            explain_tx,
        },
        BackendControl {
            diagnose_rx,
            explain_rx,
        },
    )
}

#[async_trait]
impl DiagnosisBackend for ScriptedBackend {
    async fn diagnose(&self, payload: DiagnosePayload) -> Result<DiagnosisResult, BackendError> {
        let (respond, rx) = oneshot::channel();
        let _ = self.diagnose_tx.send(PendingDiagnose { payload, respond });
        rx.await
            .unwrap_or_else(|_| Err(BackendError::Decode("test dropped responder".to_string())))
    }

    async fn explain(&self, payload: ExplainPayload) -> Result<String, BackendError> {
        let (respond, rx) = oneshot::channel();
        let _ = self.explain_tx.send(PendingExplain { payload, respond });
        rx.await
            .unwrap_or_else(|_| Err(BackendError::Decode("test dropped responder".to_string())))
    }

    async fn health(&self) -> Result<HealthStatus, BackendError> {
        Ok(HealthStatus {
            status: "healthy".to_string(),
            service: None,
            version: None,
            model_accuracy: None,
        })
    }
}
