//! File upload detection handler

use std::net::IpAddr;

use axum::{
    body::Bytes,
    extract::multipart::MultipartRejection,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

use super::ApiResponse;
use crate::cache::keys;
use crate::detection::{features::sha256_hex, indicators_for, Detection, FileSample};
use crate::models::{NewThreat, Threat};
use crate::{AppError, AppResult, AppState};

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Serialize)]
pub struct DetectionResponse {
    pub threat: Threat,
    pub detection: Detection,
}

/// Scan an uploaded file and record the result
pub async fn detect(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<DetectionResponse>>)> {
    // Throttle before touching the body
    let client = client_identifier(&headers);
    let limit = state.config.detect_rate_limit;
    let allowed = state
        .cache
        .check_rate_limit(&format!("scan:{}", client), limit.max_requests, limit.window)
        .await;
    if !allowed {
        tracing::warn!("Detection rate limit exceeded for {}", client);
        return Err(AppError::RateLimited);
    }

    let mut multipart = multipart?;
    let mut upload: Option<(String, Bytes)> = None;
    let mut source_ip: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let content = field.bytes().await?;
                upload = Some((file_name, content));
            }
            "source_ip" => {
                let value = field.text().await?;
                let value = value.trim();
                if !value.is_empty() {
                    source_ip = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    let (file_name, content) =
        upload.ok_or_else(|| AppError::ValidationError("No file provided".to_string()))?;

    if let Some(ip) = &source_ip {
        ip.parse::<IpAddr>()
            .map_err(|_| AppError::ValidationError(format!("Invalid source_ip '{}'", ip)))?;
    }

    let detection = state.classifier.classify(&FileSample {
        file_name: &file_name,
        content: &content,
    });

    let file_hash = sha256_hex(&content);
    let mut new_threat = NewThreat::new(detection.threat_type, detection.severity, detection.confidence);
    new_threat.file_hash = Some(file_hash.clone());
    new_threat.file_name = Some(file_name);
    new_threat.file_size = Some(content.len() as i64);
    new_threat.source_ip = source_ip.clone();
    new_threat.description = Some(detection.description.clone());
    new_threat.raw_data = detection.raw_data.clone();

    let indicators = indicators_for(&file_hash, source_ip.as_deref());
    let threat = state
        .store
        .create_detection(new_threat, indicators, detection.to_analysis())
        .await?;

    state.cache.invalidate_prefix(keys::THREATS_PREFIX).await;

    tracing::info!(
        "Detection {} recorded: {} ({}, {:.2}%)",
        threat.id,
        threat.threat_type,
        threat.severity,
        threat.confidence
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(DetectionResponse { threat, detection })),
    ))
}

/// Rate-limit identity: first `X-Forwarded-For` hop, else "unknown"
pub fn client_identifier(headers: &HeaderMap) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
