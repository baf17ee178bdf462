//! In-process store (demo mode and tests)

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use super::{StoreResult, ThreatStore};
use crate::models::{
    NewAnalysis, NewIndicator, NewThreat, Threat, ThreatAnalysis, ThreatIndicator,
    ThreatStatistics, ThreatStatus, TrendPoint,
};

#[derive(Default)]
struct Tables {
    threats: Vec<Threat>,
    indicators: Vec<ThreatIndicator>,
    analyses: Vec<ThreatAnalysis>,
    next_threat_id: i64,
    next_indicator_id: i64,
    next_analysis_id: i64,
}

impl Tables {
    fn insert_threat(&mut self, data: NewThreat) -> Threat {
        self.next_threat_id += 1;
        let now = Utc::now();

        let threat = Threat {
            id: self.next_threat_id,
            threat_type: data.threat_type,
            severity: data.severity,
            confidence: data.confidence,
            file_hash: data.file_hash,
            file_name: data.file_name,
            file_size: data.file_size,
            source_ip: data.source_ip,
            destination_ip: data.destination_ip,
            description: data.description,
            raw_data: data.raw_data,
            status: data.status,
            detected_at: data.detected_at.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };
        self.threats.push(threat.clone());
        threat
    }
}

/// Same contract as the Postgres store, held behind a single lock so every
/// operation is atomic
#[derive(Default)]
pub struct MemoryThreatStore {
    tables: RwLock<Tables>,
}

impl MemoryThreatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreatStore for MemoryThreatStore {
    async fn list_recent(&self, limit: i64) -> StoreResult<Vec<Threat>> {
        let tables = self.tables.read().await;
        let mut threats = tables.threats.clone();
        threats.sort_by(|a, b| {
            b.detected_at
                .cmp(&a.detected_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        threats.truncate(limit.max(0) as usize);
        Ok(threats)
    }

    async fn get_by_id(&self, id: i64) -> StoreResult<Option<Threat>> {
        let tables = self.tables.read().await;
        Ok(tables.threats.iter().find(|t| t.id == id).cloned())
    }

    async fn create(&self, threat: NewThreat) -> StoreResult<Threat> {
        let mut tables = self.tables.write().await;
        Ok(tables.insert_threat(threat))
    }

    async fn create_detection(
        &self,
        threat: NewThreat,
        indicators: Vec<NewIndicator>,
        analysis: NewAnalysis,
    ) -> StoreResult<Threat> {
        let mut tables = self.tables.write().await;
        let created = tables.insert_threat(threat);
        let now = created.created_at;

        for indicator in indicators {
            tables.next_indicator_id += 1;
            let id = tables.next_indicator_id;
            tables.indicators.push(ThreatIndicator {
                id,
                threat_id: created.id,
                indicator_type: indicator.indicator_type,
                indicator_value: indicator.indicator_value,
                created_at: now,
            });
        }

        tables.next_analysis_id += 1;
        let id = tables.next_analysis_id;
        tables.analyses.push(ThreatAnalysis {
            id,
            threat_id: created.id,
            model_name: analysis.model_name,
            model_version: analysis.model_version,
            prediction_scores: analysis.prediction_scores,
            features_analyzed: analysis.features_analyzed,
            analysis_time_ms: analysis.analysis_time_ms,
            created_at: now,
        });

        Ok(created)
    }

    async fn create_many(&self, threats: Vec<NewThreat>) -> StoreResult<usize> {
        let mut tables = self.tables.write().await;
        let count = threats.len();
        for threat in threats {
            tables.insert_threat(threat);
        }
        Ok(count)
    }

    async fn update_status(&self, id: i64, status: ThreatStatus) -> StoreResult<Option<Threat>> {
        let mut tables = self.tables.write().await;
        let Some(threat) = tables.threats.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };

        threat.status = status;
        threat.updated_at = Utc::now();
        Ok(Some(threat.clone()))
    }

    async fn statistics(&self) -> StoreResult<Vec<ThreatStatistics>> {
        let tables = self.tables.read().await;
        let cutoff = Utc::now() - Duration::hours(24);

        // Keyed by the text form to match the SQL ORDER BY
        let mut by_type: BTreeMap<&'static str, ThreatStatistics> = BTreeMap::new();
        for threat in tables.threats.iter().filter(|t| t.detected_at >= cutoff) {
            by_type
                .entry(threat.threat_type.as_str())
                .or_insert_with(|| ThreatStatistics::empty(threat.threat_type))
                .record(threat);
        }

        Ok(by_type.into_values().collect())
    }

    async fn trends(&self, days: i32) -> StoreResult<Vec<TrendPoint>> {
        let tables = self.tables.read().await;
        let cutoff = Utc::now() - Duration::days(i64::from(days));

        let mut buckets: BTreeMap<_, TrendPoint> = BTreeMap::new();
        for threat in tables.threats.iter().filter(|t| t.detected_at >= cutoff) {
            let date = threat.detected_at.date_naive();
            buckets
                .entry((date, threat.threat_type.as_str()))
                .or_insert_with(|| TrendPoint {
                    date,
                    threat_type: threat.threat_type,
                    count: 0,
                })
                .count += 1;
        }

        let mut points: Vec<TrendPoint> = buckets.into_values().collect();
        points.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| a.threat_type.as_str().cmp(b.threat_type.as_str()))
        });
        Ok(points)
    }

    async fn list_indicators(&self, threat_id: i64) -> StoreResult<Vec<ThreatIndicator>> {
        let tables = self.tables.read().await;
        Ok(tables
            .indicators
            .iter()
            .filter(|i| i.threat_id == threat_id)
            .cloned()
            .collect())
    }

    async fn latest_analysis(&self, threat_id: i64) -> StoreResult<Option<ThreatAnalysis>> {
        let tables = self.tables.read().await;
        Ok(tables
            .analyses
            .iter()
            .filter(|a| a.threat_id == threat_id)
            .max_by_key(|a| (a.created_at, a.id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndicatorType, Payload, Severity, ThreatType};
    use std::collections::BTreeMap;

    fn sample(threat_type: ThreatType, severity: Severity) -> NewThreat {
        NewThreat::new(threat_type, severity, 90.0)
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let store = MemoryThreatStore::new();
        let threat = store.create(sample(ThreatType::Malware, Severity::High)).await.unwrap();

        assert_eq!(threat.id, 1);
        assert_eq!(threat.status, ThreatStatus::Active);
        assert!(threat.file_name.is_none());
        assert!(threat.raw_data.is_empty());
    }

    #[tokio::test]
    async fn test_update_status_then_get() {
        let store = MemoryThreatStore::new();
        let threat = store.create(sample(ThreatType::Apt, Severity::Low)).await.unwrap();

        for status in ThreatStatus::ALL {
            let updated = store.update_status(threat.id, status).await.unwrap().unwrap();
            assert_eq!(updated.status, status);

            let fetched = store.get_by_id(threat.id).await.unwrap().unwrap();
            assert_eq!(fetched.status, status);
            assert!(fetched.updated_at >= threat.updated_at);
        }
    }

    #[tokio::test]
    async fn test_update_missing_is_noop() {
        let store = MemoryThreatStore::new();
        store.create(sample(ThreatType::Apt, Severity::Low)).await.unwrap();
        let before = store.list_recent(10).await.unwrap();

        let result = store.update_status(999, ThreatStatus::Resolved).await.unwrap();
        assert!(result.is_none());
        assert_eq!(store.list_recent(10).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_list_recent_orders_newest_first() {
        let store = MemoryThreatStore::new();
        let mut old = sample(ThreatType::Malware, Severity::Low);
        old.detected_at = Some(Utc::now() - Duration::days(2));
        store.create(old).await.unwrap();

        let fresh = store.create(sample(ThreatType::ZeroDay, Severity::Critical)).await.unwrap();

        let listed = store.list_recent(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, fresh.id);

        assert_eq!(store.list_recent(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_statistics_window_and_breakdown() {
        let store = MemoryThreatStore::new();
        store.create(sample(ThreatType::Malware, Severity::Critical)).await.unwrap();
        let second = store.create(sample(ThreatType::Malware, Severity::Low)).await.unwrap();
        store.update_status(second.id, ThreatStatus::Resolved).await.unwrap();
        store.create(sample(ThreatType::Apt, Severity::High)).await.unwrap();

        // Outside the 24h window
        let mut stale = sample(ThreatType::Apt, Severity::Critical);
        stale.detected_at = Some(Utc::now() - Duration::hours(30));
        store.create(stale).await.unwrap();

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].threat_type, ThreatType::Apt);
        assert_eq!(stats[0].total, 1);
        assert_eq!(stats[0].critical, 0);
        assert_eq!(stats[1].threat_type, ThreatType::Malware);
        assert_eq!(stats[1].total, 2);
        assert_eq!(stats[1].critical, 1);
        assert_eq!(stats[1].resolved, 1);
    }

    #[tokio::test]
    async fn test_trends_group_by_day() {
        let store = MemoryThreatStore::new();
        let now = Utc::now();
        for offset in [0, 0, 3, 10] {
            let mut threat = sample(ThreatType::Malware, Severity::Medium);
            threat.detected_at = Some(now - Duration::days(offset));
            store.create(threat).await.unwrap();
        }

        let trends = store.trends(7).await.unwrap();
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].date, now.date_naive());
        assert_eq!(trends[0].count, 2);
        assert_eq!(trends[1].count, 1);
    }

    #[tokio::test]
    async fn test_detection_writes_artifacts() {
        let store = MemoryThreatStore::new();
        let analysis = NewAnalysis {
            model_name: "ThreatDetectionCNN".to_string(),
            model_version: Some("1.0.0".to_string()),
            prediction_scores: BTreeMap::from([("malware".to_string(), 100.0)]),
            features_analyzed: Payload::new(),
            analysis_time_ms: 120,
        };
        let indicators = vec![NewIndicator::new(IndicatorType::Ip, "10.0.0.1")];

        let threat = store
            .create_detection(sample(ThreatType::Malware, Severity::High), indicators, analysis)
            .await
            .unwrap();

        let indicators = store.list_indicators(threat.id).await.unwrap();
        assert_eq!(indicators.len(), 1);
        assert_eq!(indicators[0].indicator_type, IndicatorType::Ip);

        let analysis = store.latest_analysis(threat.id).await.unwrap().unwrap();
        assert_eq!(analysis.analysis_time_ms, 120);
        assert!(store.latest_analysis(threat.id + 1).await.unwrap().is_none());
    }
}
