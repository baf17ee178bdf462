//! Threat model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor};
use validator::Validate;

use super::{ParseEnumError, Payload, ThreatAnalysis, ThreatIndicator};

// ============================================================================
// ENUMERATIONS
// ============================================================================

/// Threat classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatType {
    Malware,
    ZeroDay,
    Apt,
}

impl ThreatType {
    pub const ALL: [ThreatType; 3] = [ThreatType::Malware, ThreatType::ZeroDay, ThreatType::Apt];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatType::Malware => "malware",
            ThreatType::ZeroDay => "zero_day",
            ThreatType::Apt => "apt",
        }
    }
}

/// Severity, declared from lowest to highest so `Ord` follows urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Severity::Critical, Severity::High, Severity::Medium, Severity::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatStatus {
    #[default]
    Active,
    Resolved,
    FalsePositive,
}

impl ThreatStatus {
    pub const ALL: [ThreatStatus; 3] = [
        ThreatStatus::Active,
        ThreatStatus::Resolved,
        ThreatStatus::FalsePositive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatStatus::Active => "active",
            ThreatStatus::Resolved => "resolved",
            ThreatStatus::FalsePositive => "false_positive",
        }
    }
}

impl FromStr for ThreatType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThreatType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("threat_type", s))
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("severity", s))
    }
}

impl FromStr for ThreatStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThreatStatus::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("status", s))
    }
}

// Column decoding goes through `#[sqlx(try_from = "String")]`
impl TryFrom<String> for ThreatType {
    type Error = ParseEnumError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for Severity {
    type Error = ParseEnumError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for ThreatStatus {
    type Error = ParseEnumError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ThreatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ThreatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Threat {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub threat_type: ThreatType,
    #[sqlx(try_from = "String")]
    pub severity: Severity,
    pub confidence: f64,
    pub file_hash: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub source_ip: Option<String>,
    pub destination_ip: Option<String>,
    pub description: Option<String>,
    #[sqlx(json)]
    pub raw_data: Payload,
    #[sqlx(try_from = "String")]
    pub status: ThreatStatus,
    pub detected_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated insert payload. `detected_at` defaults to now.
#[derive(Debug, Clone, PartialEq)]
pub struct NewThreat {
    pub threat_type: ThreatType,
    pub severity: Severity,
    pub confidence: f64,
    pub file_hash: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub source_ip: Option<String>,
    pub destination_ip: Option<String>,
    pub description: Option<String>,
    pub raw_data: Payload,
    pub status: ThreatStatus,
    pub detected_at: Option<DateTime<Utc>>,
}

impl NewThreat {
    pub fn new(threat_type: ThreatType, severity: Severity, confidence: f64) -> Self {
        Self {
            threat_type,
            severity,
            confidence,
            file_hash: None,
            file_name: None,
            file_size: None,
            source_ip: None,
            destination_ip: None,
            description: None,
            raw_data: Payload::new(),
            status: ThreatStatus::Active,
            detected_at: None,
        }
    }
}

/// Body of `POST /threats`
#[derive(Debug, Deserialize, Validate)]
pub struct CreateThreatRequest {
    #[validate(required)]
    pub threat_type: Option<String>,
    #[validate(required)]
    pub severity: Option<String>,
    #[validate(required, range(min = 0.0, max = 100.0))]
    pub confidence: Option<f64>,
    #[validate(length(max = 128))]
    pub file_hash: Option<String>,
    #[validate(length(max = 512))]
    pub file_name: Option<String>,
    #[validate(range(min = 0))]
    pub file_size: Option<i64>,
    #[validate(ip)]
    pub source_ip: Option<String>,
    #[validate(ip)]
    pub destination_ip: Option<String>,
    pub description: Option<String>,
    pub raw_data: Option<serde_json::Value>,
    pub status: Option<String>,
}

/// Body of `PATCH /threats/:id`
#[derive(Debug, Deserialize)]
pub struct UpdateThreatStatus {
    pub status: Option<String>,
}

/// Threat with its indicators and latest analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatDetail {
    #[serde(flatten)]
    pub threat: Threat,
    pub indicators: Vec<ThreatIndicator>,
    pub analysis: Option<ThreatAnalysis>,
}

// ============================================================================
// AGGREGATES
// ============================================================================

/// Per-type counts over the last 24 hours. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ThreatStatistics {
    #[sqlx(try_from = "String")]
    pub threat_type: ThreatType,
    pub total: i64,
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
    pub resolved: i64,
    pub false_positive: i64,
}

impl ThreatStatistics {
    pub fn empty(threat_type: ThreatType) -> Self {
        Self {
            threat_type,
            total: 0,
            critical: 0,
            high: 0,
            medium: 0,
            low: 0,
            resolved: 0,
            false_positive: 0,
        }
    }

    /// Fold one threat into the counters
    pub fn record(&mut self, threat: &Threat) {
        self.total += 1;
        match threat.severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
        match threat.status {
            ThreatStatus::Resolved => self.resolved += 1,
            ThreatStatus::FalsePositive => self.false_positive += 1,
            ThreatStatus::Active => {}
        }
    }
}

/// Detections per day and type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TrendPoint {
    pub date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub threat_type: ThreatType,
    pub count: i64,
}

// ============================================================================
// QUERIES
// ============================================================================

/// Days are bucketed in UTC regardless of the session time zone
const TRENDS_SQL: &str = r#"
    SELECT
        DATE(detected_at AT TIME ZONE 'UTC') as date,
        threat_type,
        COUNT(*) as count
    FROM threats
    WHERE detected_at >= NOW() - ($1::int * INTERVAL '1 day')
    GROUP BY DATE(detected_at AT TIME ZONE 'UTC'), threat_type
    ORDER BY date DESC, threat_type
"#;

impl Threat {
    pub async fn create<'e, E>(executor: E, data: &NewThreat) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Threat>(
            r#"
            INSERT INTO threats (
                threat_type, severity, confidence, file_hash, file_name,
                file_size, source_ip, destination_ip, description, raw_data,
                status, detected_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, COALESCE($12, NOW()))
            RETURNING *
            "#
        )
        .bind(data.threat_type.as_str())
        .bind(data.severity.as_str())
        .bind(data.confidence)
        .bind(&data.file_hash)
        .bind(&data.file_name)
        .bind(data.file_size)
        .bind(&data.source_ip)
        .bind(&data.destination_ip)
        .bind(&data.description)
        .bind(Json(&data.raw_data))
        .bind(data.status.as_str())
        .bind(data.detected_at)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Threat>("SELECT * FROM threats WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list_recent<'e, E>(executor: E, limit: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Threat>(
            "SELECT * FROM threats ORDER BY detected_at DESC, id DESC LIMIT $1"
        )
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    pub async fn update_status<'e, E>(
        executor: E,
        id: i64,
        status: ThreatStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Threat>(
            r#"
            UPDATE threats
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(executor)
        .await
    }

    pub async fn statistics<'e, E>(executor: E) -> Result<Vec<ThreatStatistics>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ThreatStatistics>(
            r#"
            SELECT
                threat_type,
                COUNT(*) as total,
                COUNT(*) FILTER (WHERE severity = 'critical') as critical,
                COUNT(*) FILTER (WHERE severity = 'high') as high,
                COUNT(*) FILTER (WHERE severity = 'medium') as medium,
                COUNT(*) FILTER (WHERE severity = 'low') as low,
                COUNT(*) FILTER (WHERE status = 'resolved') as resolved,
                COUNT(*) FILTER (WHERE status = 'false_positive') as false_positive
            FROM threats
            WHERE detected_at >= NOW() - INTERVAL '24 hours'
            GROUP BY threat_type
            ORDER BY threat_type
            "#
        )
        .fetch_all(executor)
        .await
    }

    pub async fn trends<'e, E>(executor: E, days: i32) -> Result<Vec<TrendPoint>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TrendPoint>(TRENDS_SQL)
            .bind(days)
            .fetch_all(executor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trends_bucket_by_utc_day() {
        // Same day boundary as the in-memory store's `date_naive()`
        assert_eq!(TRENDS_SQL.matches("DATE(detected_at AT TIME ZONE 'UTC')").count(), 2);
        assert!(!TRENDS_SQL.contains("DATE(detected_at)"));
    }

    #[test]
    fn test_enum_round_trip_strings() {
        for t in ThreatType::ALL {
            assert_eq!(t.as_str().parse::<ThreatType>().unwrap(), t);
        }
        for s in ThreatStatus::ALL {
            assert_eq!(s.as_str().parse::<ThreatStatus>().unwrap(), s);
        }
        assert_eq!("zero_day".parse::<ThreatType>().unwrap(), ThreatType::ZeroDay);
        assert!("ransomware".parse::<ThreatType>().is_err());
        assert!("Resolved".parse::<ThreatStatus>().is_err());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&ThreatStatus::FalsePositive).unwrap();
        assert_eq!(json, "\"false_positive\"");
        let parsed: ThreatType = serde_json::from_str("\"zero_day\"").unwrap();
        assert_eq!(parsed, ThreatType::ZeroDay);
    }

    #[test]
    fn test_statistics_record() {
        let now = Utc::now();
        let threat = Threat {
            id: 1,
            threat_type: ThreatType::Apt,
            severity: Severity::High,
            confidence: 88.0,
            file_hash: None,
            file_name: None,
            file_size: None,
            source_ip: None,
            destination_ip: None,
            description: None,
            raw_data: Payload::new(),
            status: ThreatStatus::Resolved,
            detected_at: now,
            created_at: now,
            updated_at: now,
        };

        let mut stats = ThreatStatistics::empty(ThreatType::Apt);
        stats.record(&threat);
        stats.record(&Threat { severity: Severity::Low, status: ThreatStatus::Active, ..threat.clone() });

        assert_eq!(stats.total, 2);
        assert_eq!(stats.high, 1);
        assert_eq!(stats.low, 1);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.false_positive, 0);
    }
}
