//! Threat handlers
//!
//! Reads go through the cache (hit → `cached: true`, miss → store → fill).
//! Writes hit the store first, then invalidate the affected cache entries.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use validator::Validate;

use super::ApiResponse;
use crate::cache::{keys, ttl};
use crate::models::{
    CreateThreatRequest, NewThreat, Payload, Threat, ThreatDetail, ThreatStatus,
    UpdateThreatStatus,
};
use crate::{AppError, AppResult, AppState};

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

/// List recent threats
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<Vec<Threat>>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

    let cache_key = keys::threats_list(limit);
    if let Some(threats) = state.cache.get_cached::<Vec<Threat>>(&cache_key).await {
        return Ok(Json(ApiResponse::ok(threats).with_count().cached(true)));
    }

    let threats = state.store.list_recent(limit).await?;
    state.cache.set_cached(&cache_key, &threats, ttl::THREATS_LIST).await;

    Ok(Json(ApiResponse::ok(threats).with_count().cached(false)))
}

/// Create a threat manually
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<CreateThreatRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<Threat>>)> {
    let Json(req) = body?;
    let new_threat = into_new_threat(req)?;

    let threat = state.store.create(new_threat).await?;

    // Lists and aggregates all change
    state.cache.invalidate_prefix(keys::THREATS_PREFIX).await;

    tracing::info!("Threat {} created ({}, {})", threat.id, threat.threat_type, threat.severity);

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(threat))))
}

/// Get single threat with indicators and latest analysis
pub async fn get(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<ApiResponse<ThreatDetail>>> {
    let Path(id) = id?;

    let cache_key = keys::threat_detail(id);
    if let Some(detail) = state.cache.get_cached::<ThreatDetail>(&cache_key).await {
        return Ok(Json(ApiResponse::ok(detail).cached(true)));
    }

    let threat = state
        .store
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Threat not found".to_string()))?;

    let (indicators, analysis) = tokio::try_join!(
        state.store.list_indicators(id),
        state.store.latest_analysis(id),
    )?;

    let detail = ThreatDetail { threat, indicators, analysis };
    state.cache.set_cached(&cache_key, &detail, ttl::THREAT_DETAIL).await;

    Ok(Json(ApiResponse::ok(detail).cached(false)))
}

/// Update threat status
pub async fn update_status(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateThreatStatus>, JsonRejection>,
) -> AppResult<Json<ApiResponse<Threat>>> {
    let Path(id) = id?;
    let Json(req) = body?;

    let status: ThreatStatus = req
        .status
        .as_deref()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| AppError::ValidationError("Invalid status value".to_string()))?;

    let threat = state
        .store
        .update_status(id, status)
        .await?
        .ok_or_else(|| AppError::NotFound("Threat not found".to_string()))?;

    // Detail view, plus lists and aggregates that embed the status
    state.cache.delete_cached(&keys::threat_detail(id)).await;
    state.cache.invalidate_prefix(keys::THREATS_PREFIX).await;

    tracing::info!("Threat {} marked {}", id, status);

    Ok(Json(ApiResponse::ok(threat)))
}

/// Validate a create request into an insertable threat
pub fn into_new_threat(req: CreateThreatRequest) -> AppResult<NewThreat> {
    req.validate()?;

    let (Some(threat_type), Some(severity), Some(confidence)) =
        (req.threat_type.as_deref(), req.severity.as_deref(), req.confidence)
    else {
        return Err(AppError::ValidationError("Missing required fields".to_string()));
    };

    let raw_data = match req.raw_data {
        None | Some(serde_json::Value::Null) => Payload::new(),
        Some(serde_json::Value::Object(map)) => map,
        Some(_) => {
            return Err(AppError::ValidationError(
                "raw_data must be a JSON object".to_string(),
            ))
        }
    };

    let status = match req.status.as_deref() {
        None => ThreatStatus::Active,
        Some(s) => s.parse().map_err(invalid)?,
    };

    Ok(NewThreat {
        threat_type: threat_type.parse().map_err(invalid)?,
        severity: severity.parse().map_err(invalid)?,
        confidence,
        file_hash: req.file_hash,
        file_name: req.file_name,
        file_size: req.file_size,
        source_ip: req.source_ip,
        destination_ip: req.destination_ip,
        description: req.description,
        raw_data,
        status,
        detected_at: None,
    })
}

fn invalid(err: crate::models::ParseEnumError) -> AppError {
    AppError::ValidationError(err.to_string())
}
