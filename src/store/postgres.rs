//! PostgreSQL-backed store

use async_trait::async_trait;
use sqlx::PgPool;

use super::{StoreResult, ThreatStore};
use crate::models::{
    NewAnalysis, NewIndicator, NewThreat, Threat, ThreatAnalysis, ThreatIndicator,
    ThreatStatistics, ThreatStatus, TrendPoint,
};

#[derive(Clone)]
pub struct PgThreatStore {
    pool: PgPool,
}

impl PgThreatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ThreatStore for PgThreatStore {
    async fn list_recent(&self, limit: i64) -> StoreResult<Vec<Threat>> {
        Threat::list_recent(&self.pool, limit).await
    }

    async fn get_by_id(&self, id: i64) -> StoreResult<Option<Threat>> {
        Threat::find_by_id(&self.pool, id).await
    }

    async fn create(&self, threat: NewThreat) -> StoreResult<Threat> {
        Threat::create(&self.pool, &threat).await
    }

    async fn create_detection(
        &self,
        threat: NewThreat,
        indicators: Vec<NewIndicator>,
        analysis: NewAnalysis,
    ) -> StoreResult<Threat> {
        let mut tx = self.pool.begin().await?;

        let created = Threat::create(&mut *tx, &threat).await?;
        for indicator in &indicators {
            ThreatIndicator::create(&mut *tx, created.id, indicator).await?;
        }
        ThreatAnalysis::create(&mut *tx, created.id, &analysis).await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn create_many(&self, threats: Vec<NewThreat>) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;
        for threat in &threats {
            Threat::create(&mut *tx, threat).await?;
        }
        tx.commit().await?;
        Ok(threats.len())
    }

    async fn update_status(&self, id: i64, status: ThreatStatus) -> StoreResult<Option<Threat>> {
        Threat::update_status(&self.pool, id, status).await
    }

    async fn statistics(&self) -> StoreResult<Vec<ThreatStatistics>> {
        Threat::statistics(&self.pool).await
    }

    async fn trends(&self, days: i32) -> StoreResult<Vec<TrendPoint>> {
        Threat::trends(&self.pool, days).await
    }

    async fn list_indicators(&self, threat_id: i64) -> StoreResult<Vec<ThreatIndicator>> {
        ThreatIndicator::list_by_threat(&self.pool, threat_id).await
    }

    async fn latest_analysis(&self, threat_id: i64) -> StoreResult<Option<ThreatAnalysis>> {
        ThreatAnalysis::latest_for_threat(&self.pool, threat_id).await
    }
}
