//! Threat indicator model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

use super::ParseEnumError;

/// Kind of artifact an indicator carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorType {
    Ip,
    Domain,
    Hash,
    Url,
    Email,
}

impl IndicatorType {
    pub const ALL: [IndicatorType; 5] = [
        IndicatorType::Ip,
        IndicatorType::Domain,
        IndicatorType::Hash,
        IndicatorType::Url,
        IndicatorType::Email,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorType::Ip => "ip",
            IndicatorType::Domain => "domain",
            IndicatorType::Hash => "hash",
            IndicatorType::Url => "url",
            IndicatorType::Email => "email",
        }
    }
}

impl FromStr for IndicatorType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndicatorType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("indicator_type", s))
    }
}

impl TryFrom<String> for IndicatorType {
    type Error = ParseEnumError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ThreatIndicator {
    pub id: i64,
    pub threat_id: i64,
    #[sqlx(try_from = "String")]
    pub indicator_type: IndicatorType,
    pub indicator_value: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIndicator {
    pub indicator_type: IndicatorType,
    pub indicator_value: String,
}

impl NewIndicator {
    pub fn new(indicator_type: IndicatorType, value: impl Into<String>) -> Self {
        Self {
            indicator_type,
            indicator_value: value.into(),
        }
    }
}

impl ThreatIndicator {
    pub async fn create<'e, E>(
        executor: E,
        threat_id: i64,
        data: &NewIndicator,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ThreatIndicator>(
            r#"
            INSERT INTO threat_indicators (threat_id, indicator_type, indicator_value)
            VALUES ($1, $2, $3)
            RETURNING *
            "#
        )
        .bind(threat_id)
        .bind(data.indicator_type.as_str())
        .bind(&data.indicator_value)
        .fetch_one(executor)
        .await
    }

    pub async fn list_by_threat<'e, E>(executor: E, threat_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ThreatIndicator>(
            "SELECT * FROM threat_indicators WHERE threat_id = $1 ORDER BY id"
        )
        .bind(threat_id)
        .fetch_all(executor)
        .await
    }
}
