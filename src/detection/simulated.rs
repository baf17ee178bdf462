//! Simulated classifier
//!
//! Stands in for the CNN model: the verdict is random, the static features
//! are real.

use std::collections::BTreeMap;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use uuid::Uuid;

use super::features::{count_suspicious_markers, normalized_entropy};
use super::rules::{
    MAX_ANALYSIS_MS, MAX_CONFIDENCE, MIN_ANALYSIS_MS, MIN_CONFIDENCE, MODEL_NAME, MODEL_VERSION,
    SCANNER_VERSION,
};
use super::{severity_for_confidence, Detection, FileSample, ThreatClassifier};
use crate::models::{Payload, ThreatType};

#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedClassifier;

impl SimulatedClassifier {
    pub fn new() -> Self {
        Self
    }
}

/// Round to two decimals
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn into_payload(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}

impl ThreatClassifier for SimulatedClassifier {
    fn classify(&self, sample: &FileSample<'_>) -> Detection {
        let mut rng = rand::thread_rng();

        let threat_type = *ThreatType::ALL
            .choose(&mut rng)
            .unwrap_or(&ThreatType::Malware);
        let confidence = round2(rng.gen_range(MIN_CONFIDENCE..MAX_CONFIDENCE));
        let severity = severity_for_confidence(confidence);

        // Random class scores normalized to 100
        let raw: Vec<f64> = ThreatType::ALL.iter().map(|_| rng.gen_range(1.0..100.0)).collect();
        let total: f64 = raw.iter().sum();
        let prediction_scores: BTreeMap<String, f64> = ThreatType::ALL
            .iter()
            .zip(raw)
            .map(|(t, score)| (t.as_str().to_string(), score / total * 100.0))
            .collect();

        let features_analyzed = into_payload(json!({
            "file_size": sample.content.len(),
            "file_name": sample.file_name,
            "entropy": normalized_entropy(sample.content),
            "suspicious_strings": count_suspicious_markers(sample.content),
        }));

        let raw_data = into_payload(json!({
            "timestamp": Utc::now().to_rfc3339(),
            "scanner_version": SCANNER_VERSION,
            "scan_id": Uuid::new_v4(),
        }));

        Detection {
            threat_type,
            severity,
            confidence,
            description: format!("Detected {} with {} severity", threat_type, severity),
            model_name: MODEL_NAME.to_string(),
            model_version: MODEL_VERSION.to_string(),
            prediction_scores,
            features_analyzed,
            analysis_time_ms: rng.gen_range(MIN_ANALYSIS_MS..MAX_ANALYSIS_MS),
            raw_data,
        }
    }
}
