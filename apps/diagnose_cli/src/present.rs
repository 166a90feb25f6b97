//! Terminal rendering of session output.

use session_core::{Notification, NotificationKind};
use shared::protocol::{DiagnosisResult, HealthStatus, RiskCategory, UncertaintyLevel};

fn risk_label(risk: RiskCategory) -> &'static str {
    match risk {
        RiskCategory::VeryLow => "Very Low",
        RiskCategory::Low => "Low",
        RiskCategory::Moderate => "Moderate",
        RiskCategory::High => "High",
        RiskCategory::VeryHigh => "Very High",
    }
}

fn uncertainty_label(level: UncertaintyLevel) -> &'static str {
    match level {
        UncertaintyLevel::Low => "Low",
        UncertaintyLevel::Moderate => "Moderate",
        UncertaintyLevel::High => "High",
    }
}

pub fn print_notification(notification: &Notification) {
    let marker = match notification.kind {
        NotificationKind::Success => "ok",
        NotificationKind::Failure => "error",
    };
    eprintln!(
        "[{marker}] {}: {}",
        notification.message, notification.description
    );
}

pub fn print_diagnosis(result: &DiagnosisResult) {
    let ml = &result.ml_prediction;
    let combined = &result.combined_recommendation;
    let fuzzy = &result.fuzzy_analysis;
    let expert = &result.expert_analysis;

    println!(
        "Prediction:     {} ({:.1}% confidence)",
        ml.predicted_class.to_ascii_uppercase(),
        ml.confidence * 100.0
    );
    for (class, probability) in &ml.probabilities {
        println!("  {class:<12} {:.1}%", probability * 100.0);
    }
    println!("Severity:       {:.1}", ml.severity_score);
    println!(
        "Risk:           {} (composite {:.1})",
        risk_label(combined.final_risk_category),
        combined.composite_risk_score
    );
    if combined.needs_immediate_attention {
        println!("URGENT:         immediate medical attention recommended");
    }
    println!(
        "Uncertainty:    {} (fuzzy risk {:.1})",
        uncertainty_label(fuzzy.uncertainty_level),
        fuzzy.fuzzy_risk_score
    );
    println!();
    println!("{}", combined.summary);
    println!("{}", fuzzy.interpretation);

    if !combined.top_recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for (idx, rec) in combined.top_recommendations.iter().enumerate() {
            println!("  {}. {rec}", idx + 1);
        }
    }

    println!();
    println!("Follow-up:      {}", expert.follow_up.description);
    println!("Reliability:    {}", expert.confidence_assessment.reliability);

    if !expert.rules_fired.is_empty() {
        println!();
        println!("Rules activated:");
        for rule in &expert.rules_fired {
            println!("  [{}] {}: {}", rule.id, rule.name, rule.description);
        }
    }

    if !expert.additional_considerations.is_empty() {
        println!();
        println!("Additional considerations:");
        for consideration in &expert.additional_considerations {
            println!("  - {consideration}");
        }
    }

    if let Some(stats) = &result.image_stats {
        println!();
        println!(
            "Image:          {} x {}, mean {:.1}, std {:.1}, contrast {:.1}%",
            stats.width,
            stats.height,
            stats.mean_intensity,
            stats.std_intensity,
            stats.contrast_ratio * 100.0
        );
    }
}

pub fn print_health(health: &HealthStatus) {
    println!("status:   {}", health.status);
    if let Some(service) = &health.service {
        println!("service:  {service}");
    }
    if let Some(version) = &health.version {
        println!("version:  {version}");
    }
    if let Some(accuracy) = &health.model_accuracy {
        println!("accuracy: {accuracy}");
    }
}
