//! Demo data seeding

use axum::{extract::State, Json};
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use super::ApiResponse;
use crate::cache::keys;
use crate::models::{NewThreat, Severity, ThreatStatus, ThreatType};
use crate::{AppResult, AppState};

/// Seeded detections spread over this many past days
const SEED_SPREAD_DAYS: i64 = 7;

#[derive(Debug, Serialize)]
pub struct SeedSummary {
    pub count: usize,
}

/// Insert synthetic threats for the dashboard
pub async fn seed_demo_data(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<SeedSummary>>> {
    let threats = demo_threats(state.config.seed_count, Utc::now());
    let count = state.store.create_many(threats).await?;

    state.cache.invalidate_prefix(keys::THREATS_PREFIX).await;

    tracing::info!("Seeded {} demo threats", count);

    Ok(Json(
        ApiResponse::ok(SeedSummary { count })
            .with_message(format!("Seeded {} demo threats", count)),
    ))
}

/// Random threats detected within the last week
pub fn demo_threats(count: usize, now: DateTime<Utc>) -> Vec<NewThreat> {
    let mut rng = rand::thread_rng();

    (0..count)
        .map(|i| {
            let threat_type = *ThreatType::ALL.choose(&mut rng).unwrap_or(&ThreatType::Malware);
            let severity = *Severity::ALL.choose(&mut rng).unwrap_or(&Severity::Low);
            let status = *ThreatStatus::ALL.choose(&mut rng).unwrap_or(&ThreatStatus::Active);
            let confidence = (rng.gen_range(60.0..100.0_f64) * 100.0).round() / 100.0;
            let days_ago = rng.gen_range(0..SEED_SPREAD_DAYS);

            let mut threat = NewThreat::new(threat_type, severity, confidence);
            threat.status = status;
            threat.file_name = Some(format!("suspicious_file_{}.exe", i));
            threat.file_size = Some(rng.gen_range(1_000..51_000));
            threat.source_ip = Some(format!(
                "192.168.{}.{}",
                rng.gen_range(0..255),
                rng.gen_range(0..255)
            ));
            threat.description = Some(format!("Detected {} with {} severity", threat_type, severity));
            threat.detected_at = Some(now - Duration::days(days_ago));
            threat
        })
        .collect()
}
