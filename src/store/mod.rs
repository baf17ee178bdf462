//! Query service over the persistent store
//!
//! Handlers only see [`ThreatStore`]; the backing implementation is picked
//! once at startup and shared behind an `Arc`.

pub mod postgres;
pub mod memory;

use async_trait::async_trait;

use crate::models::{
    NewAnalysis, NewIndicator, NewThreat, Threat, ThreatAnalysis, ThreatIndicator,
    ThreatStatistics, ThreatStatus, TrendPoint,
};

pub use memory::MemoryThreatStore;
pub use postgres::PgThreatStore;

pub type StoreResult<T> = Result<T, sqlx::Error>;

#[async_trait]
pub trait ThreatStore: Send + Sync {
    /// Up to `limit` threats, newest detection first
    async fn list_recent(&self, limit: i64) -> StoreResult<Vec<Threat>>;

    async fn get_by_id(&self, id: i64) -> StoreResult<Option<Threat>>;

    async fn create(&self, threat: NewThreat) -> StoreResult<Threat>;

    /// Insert a threat together with its indicators and analysis, all or nothing
    async fn create_detection(
        &self,
        threat: NewThreat,
        indicators: Vec<NewIndicator>,
        analysis: NewAnalysis,
    ) -> StoreResult<Threat>;

    /// Insert a batch in one transaction, returns the inserted count
    async fn create_many(&self, threats: Vec<NewThreat>) -> StoreResult<usize>;

    /// `None` when the id does not exist; nothing is written in that case
    async fn update_status(&self, id: i64, status: ThreatStatus) -> StoreResult<Option<Threat>>;

    /// Per-type counts over the last 24 hours
    async fn statistics(&self) -> StoreResult<Vec<ThreatStatistics>>;

    /// Per-day, per-type counts over the trailing `days` days
    async fn trends(&self, days: i32) -> StoreResult<Vec<TrendPoint>>;

    async fn list_indicators(&self, threat_id: i64) -> StoreResult<Vec<ThreatIndicator>>;

    async fn latest_analysis(&self, threat_id: i64) -> StoreResult<Option<ThreatAnalysis>>;
}
