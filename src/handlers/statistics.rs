//! Statistics handler

use axum::{
    extract::rejection::QueryRejection,
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::cache::{keys, ttl};
use crate::models::{ThreatStatistics, TrendPoint};
use crate::{AppResult, AppState};

pub const DEFAULT_TREND_DAYS: i32 = 7;
pub const MAX_TREND_DAYS: i32 = 365;

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    pub days: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct StatisticsReport {
    /// Last 24 hours, per type
    pub statistics: Vec<ThreatStatistics>,
    /// Trailing `days`, per day and type
    pub trends: Vec<TrendPoint>,
}

/// Aggregates for the dashboard charts
pub async fn get(
    State(state): State<AppState>,
    query: Result<Query<StatisticsQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<StatisticsReport>>> {
    let Query(query) = query?;
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS).clamp(1, MAX_TREND_DAYS);

    let trends_key = keys::trends(days);
    let (cached_stats, cached_trends) = tokio::join!(
        state.cache.get_cached::<Vec<ThreatStatistics>>(keys::STATISTICS),
        state.cache.get_cached::<Vec<TrendPoint>>(&trends_key),
    );

    // Only a full hit is served from cache
    if let (Some(statistics), Some(trends)) = (cached_stats, cached_trends) {
        let report = StatisticsReport { statistics, trends };
        return Ok(Json(ApiResponse::ok(report).cached(true)));
    }

    let (statistics, trends) =
        tokio::try_join!(state.store.statistics(), state.store.trends(days))?;

    tokio::join!(
        state.cache.set_cached(keys::STATISTICS, &statistics, ttl::STATISTICS),
        state.cache.set_cached(&trends_key, &trends, ttl::TRENDS),
    );

    let report = StatisticsReport { statistics, trends };
    Ok(Json(ApiResponse::ok(report).cached(false)))
}
