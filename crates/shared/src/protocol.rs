use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyLevel {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Immediate,
    Urgent,
    Soon,
    Routine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlPrediction {
    pub predicted_class: String,
    pub confidence: f64,
    #[serde(default)]
    pub probabilities: BTreeMap<String, f64>,
    pub severity_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredRule {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUp {
    #[serde(default)]
    pub recommended_days: Option<u32>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    pub level: String,
    pub description: String,
    pub reliability: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertAnalysis {
    #[serde(default)]
    pub rules_fired: Vec<FiredRule>,
    #[serde(default)]
    pub explanations: Vec<String>,
    #[serde(default)]
    pub additional_considerations: Vec<String>,
    pub follow_up: FollowUp,
    pub confidence_assessment: ConfidenceAssessment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyAnalysis {
    pub fuzzy_risk_score: f64,
    #[serde(default)]
    pub risk_category: Option<RiskCategory>,
    pub uncertainty_level: UncertaintyLevel,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRecommendation {
    pub summary: String,
    pub final_risk_category: RiskCategory,
    pub composite_risk_score: f64,
    #[serde(default)]
    pub recommended_action: Option<RecommendedAction>,
    #[serde(default)]
    pub confidence_level: Option<String>,
    #[serde(default)]
    pub top_recommendations: Vec<String>,
    pub needs_immediate_attention: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageStats {
    pub width: u32,
    pub height: u32,
    pub mean_intensity: f64,
    pub std_intensity: f64,
    #[serde(default)]
    pub min_intensity: Option<u8>,
    #[serde(default)]
    pub max_intensity: Option<u8>,
    pub contrast_ratio: f64,
}

/// Full response of `POST /api/diagnose`. Held only as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub ml_prediction: MlPrediction,
    pub expert_analysis: ExpertAnalysis,
    pub fuzzy_analysis: FuzzyAnalysis,
    pub combined_recommendation: CombinedRecommendation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_stats: Option<ImageStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradcamResponse {
    pub heatmap: String,
    #[serde(default)]
    pub heatmap_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub model_accuracy: Option<String>,
}
