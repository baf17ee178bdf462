//! File classification
//!
//! The API only depends on [`ThreatClassifier`]. The shipped
//! [`SimulatedClassifier`] draws random results; a real model plugs in by
//! implementing the trait.

pub mod features;
pub mod rules;
pub mod simulated;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{IndicatorType, NewAnalysis, NewIndicator, Payload, Severity, ThreatType};

pub use simulated::SimulatedClassifier;

/// An uploaded file under analysis
#[derive(Debug, Clone, Copy)]
pub struct FileSample<'a> {
    pub file_name: &'a str,
    pub content: &'a [u8],
}

/// Classifier verdict plus the metadata recorded as analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub threat_type: ThreatType,
    pub severity: Severity,
    pub confidence: f64,
    pub description: String,
    pub model_name: String,
    pub model_version: String,
    pub prediction_scores: BTreeMap<String, f64>,
    pub features_analyzed: Payload,
    pub analysis_time_ms: i32,
    pub raw_data: Payload,
}

impl Detection {
    pub fn to_analysis(&self) -> NewAnalysis {
        NewAnalysis {
            model_name: self.model_name.clone(),
            model_version: Some(self.model_version.clone()),
            prediction_scores: self.prediction_scores.clone(),
            features_analyzed: self.features_analyzed.clone(),
            analysis_time_ms: self.analysis_time_ms,
        }
    }
}

pub trait ThreatClassifier: Send + Sync {
    fn classify(&self, sample: &FileSample<'_>) -> Detection;
}

/// Map a confidence percentage onto a severity band
pub fn severity_for_confidence(confidence: f64) -> Severity {
    if confidence > rules::CRITICAL_CONFIDENCE {
        Severity::Critical
    } else if confidence > rules::HIGH_CONFIDENCE {
        Severity::High
    } else if confidence > rules::MEDIUM_CONFIDENCE {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Indicators recorded alongside a detection: the file hash, and the
/// reporting host when known
pub fn indicators_for(file_hash: &str, source_ip: Option<&str>) -> Vec<NewIndicator> {
    let mut indicators = vec![NewIndicator::new(IndicatorType::Hash, file_hash)];
    if let Some(ip) = source_ip {
        indicators.push(NewIndicator::new(IndicatorType::Ip, ip));
    }
    indicators
}
