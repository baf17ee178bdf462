//! Threat analysis model

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor};

use super::Payload;

/// How a threat was classified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ThreatAnalysis {
    pub id: i64,
    pub threat_id: i64,
    pub model_name: String,
    pub model_version: Option<String>,
    /// class -> score, sums to ~100
    #[sqlx(json)]
    pub prediction_scores: BTreeMap<String, f64>,
    #[sqlx(json)]
    pub features_analyzed: Payload,
    pub analysis_time_ms: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalysis {
    pub model_name: String,
    pub model_version: Option<String>,
    pub prediction_scores: BTreeMap<String, f64>,
    pub features_analyzed: Payload,
    pub analysis_time_ms: i32,
}

impl ThreatAnalysis {
    pub async fn create<'e, E>(
        executor: E,
        threat_id: i64,
        data: &NewAnalysis,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ThreatAnalysis>(
            r#"
            INSERT INTO threat_analysis (
                threat_id, model_name, model_version,
                prediction_scores, features_analyzed, analysis_time_ms
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#
        )
        .bind(threat_id)
        .bind(&data.model_name)
        .bind(&data.model_version)
        .bind(Json(&data.prediction_scores))
        .bind(Json(&data.features_analyzed))
        .bind(data.analysis_time_ms)
        .fetch_one(executor)
        .await
    }

    pub async fn latest_for_threat<'e, E>(
        executor: E,
        threat_id: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ThreatAnalysis>(
            r#"
            SELECT * FROM threat_analysis
            WHERE threat_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#
        )
        .bind(threat_id)
        .fetch_optional(executor)
        .await
    }
}
