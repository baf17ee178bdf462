//! End-to-end tests for the HTTP API against the in-memory store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use threatscope::cache::{Cache, MemoryBackend};
use threatscope::config::{Config, RateLimitConfig};
use threatscope::detection::{features::sha256_hex, SimulatedClassifier};
use threatscope::models::{
    NewAnalysis, NewIndicator, NewThreat, Threat, ThreatAnalysis, ThreatIndicator,
    ThreatStatistics, ThreatStatus, TrendPoint,
};
use threatscope::store::{MemoryThreatStore, StoreResult, ThreatStore};
use threatscope::{create_router, AppState};

const BOUNDARY: &str = "threatscope-test-boundary";

fn state_with(config: Config, cache: Cache, store: Arc<dyn ThreatStore>) -> AppState {
    AppState {
        store,
        cache,
        classifier: Arc::new(SimulatedClassifier::new()),
        config,
    }
}

fn app() -> Router {
    create_router(state_with(
        Config::default(),
        Cache::new(Arc::new(MemoryBackend::new())),
        Arc::new(MemoryThreatStore::new()),
    ))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// multipart/form-data body; parts are (name, filename, content)
fn multipart_request(forwarded_for: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
            }
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/detect")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("x-forwarded-for", forwarded_for)
        .body(Body::from(body))
        .unwrap()
}

async fn create_malware(router: &Router) -> i64 {
    let (status, body) = send(
        router,
        json_request(
            Method::POST,
            "/threats",
            json!({ "threat_type": "malware", "severity": "critical", "confidence": 99.5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_create_patch_get_scenario() {
    let router = app();

    let (status, body) = send(
        &router,
        json_request(
            Method::POST,
            "/threats",
            json!({ "threat_type": "malware", "severity": "critical", "confidence": 99.5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["severity"], "critical");
    assert_eq!(body["data"]["status"], "active");
    let id = body["data"]["id"].as_i64().unwrap();

    // Warm the detail cache with the "active" version
    let (_, body) = send(&router, get(&format!("/threats/{}", id))).await;
    assert_eq!(body["cached"], false);
    let (_, body) = send(&router, get(&format!("/threats/{}", id))).await;
    assert_eq!(body["cached"], true);
    assert_eq!(body["data"]["status"], "active");

    let (status, body) = send(
        &router,
        json_request(Method::PATCH, &format!("/threats/{}", id), json!({ "status": "resolved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "resolved");

    let (status, body) = send(&router, get(&format!("/threats/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "resolved");
    assert_eq!(body["cached"], false);
    assert_eq!(body["data"]["indicators"], json!([]));
    assert_eq!(body["data"]["analysis"], Value::Null);
}

#[tokio::test]
async fn test_every_status_round_trips() {
    let router = app();
    let id = create_malware(&router).await;

    for status in ThreatStatus::ALL {
        let (code, _) = send(
            &router,
            json_request(
                Method::PATCH,
                &format!("/threats/{}", id),
                json!({ "status": status.as_str() }),
            ),
        )
        .await;
        assert_eq!(code, StatusCode::OK);

        let (_, body) = send(&router, get(&format!("/threats/{}", id))).await;
        assert_eq!(body["data"]["status"], status.as_str());
    }
}

#[tokio::test]
async fn test_create_validation() {
    let router = app();

    let (status, body) = send(
        &router,
        json_request(Method::POST, "/threats", json!({ "threat_type": "malware" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &router,
        json_request(
            Method::POST,
            "/threats",
            json!({ "threat_type": "malware", "severity": "critical", "confidence": 101 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/threats")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&router, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_patch_errors() {
    let router = app();
    let id = create_malware(&router).await;

    let (status, body) = send(
        &router,
        json_request(Method::PATCH, &format!("/threats/{}", id), json!({ "status": "closed" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid status value");

    let (status, _) = send(
        &router,
        json_request(Method::PATCH, &format!("/threats/{}", id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &router,
        json_request(Method::PATCH, "/threats/9999", json!({ "status": "resolved" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Threat not found");

    // The existing threat was not touched
    let (_, body) = send(&router, get(&format!("/threats/{}", id))).await;
    assert_eq!(body["data"]["status"], "active");
}

#[tokio::test]
async fn test_get_errors() {
    let router = app();

    let (status, body) = send(&router, get("/threats/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, body) = send(&router, get("/threats/not-a-number")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid threat ID");
}

#[tokio::test]
async fn test_list_caching_and_invalidation() {
    let router = app();
    let first = create_malware(&router).await;

    let (status, body) = send(&router, get("/threats?limit=10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], false);
    assert_eq!(body["count"], 1);

    let (_, body) = send(&router, get("/threats?limit=10")).await;
    assert_eq!(body["cached"], true);

    let second = create_malware(&router).await;

    let (_, body) = send(&router, get("/threats?limit=10")).await;
    assert_eq!(body["cached"], false);
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["id"], second);
    assert_eq!(body["data"][1]["id"], first);
}

#[tokio::test]
async fn test_list_limit_bounds() {
    let router = app();

    let (status, body) = send(&router, get("/threats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    create_malware(&router).await;
    create_malware(&router).await;

    // Out-of-range limits are clamped, not rejected
    let (status, body) = send(&router, get("/threats?limit=0")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = send(&router, get("/threats?limit=1000")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    // Clamped request shares the cache entry of the upper bound
    let (_, body) = send(&router, get("/threats?limit=500")).await;
    assert_eq!(body["cached"], true);

    let (status, body) = send(&router, get("/threats?limit=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_statistics_and_trends() {
    let router = app();
    create_malware(&router).await;

    let (status, body) = send(&router, get("/threats/statistics?days=7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], false);
    assert_eq!(body["data"]["statistics"][0]["threat_type"], "malware");
    assert_eq!(body["data"]["statistics"][0]["total"], 1);
    assert_eq!(body["data"]["statistics"][0]["critical"], 1);
    assert_eq!(body["data"]["trends"][0]["count"], 1);

    let (_, body) = send(&router, get("/threats/statistics?days=7")).await;
    assert_eq!(body["cached"], true);

    // A different window misses on trends, so the whole report is recomputed
    let (_, body) = send(&router, get("/threats/statistics?days=30")).await;
    assert_eq!(body["cached"], false);

    let (status, _) = send(&router, get("/threats/statistics?days=0")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, get("/threats/statistics?days=5000")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&router, get("/threats/statistics?days=365")).await;
    assert_eq!(body["cached"], true);

    let (status, _) = send(&router, get("/threats/statistics?days=week")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_change_refreshes_statistics() {
    let router = app();
    let id = create_malware(&router).await;

    let (_, body) = send(&router, get("/threats/statistics")).await;
    assert_eq!(body["data"]["statistics"][0]["resolved"], 0);

    send(
        &router,
        json_request(Method::PATCH, &format!("/threats/{}", id), json!({ "status": "resolved" })),
    )
    .await;

    let (_, body) = send(&router, get("/threats/statistics")).await;
    assert_eq!(body["cached"], false);
    assert_eq!(body["data"]["statistics"][0]["resolved"], 1);
}

#[tokio::test]
async fn test_detect_records_threat_and_artifacts() {
    let router = app();
    let content: &[u8] = b"MZ\x90\x00 powershell -EncodedCommand AAAA";

    let (status, body) = send(
        &router,
        multipart_request(
            "198.51.100.7",
            &[
                ("file", Some("invoice.exe"), content),
                ("source_ip", None, b"10.20.30.40"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);

    let threat = &body["data"]["threat"];
    assert_eq!(threat["file_name"], "invoice.exe");
    assert_eq!(threat["file_size"], content.len());
    assert_eq!(threat["file_hash"], sha256_hex(content));
    assert_eq!(threat["source_ip"], "10.20.30.40");
    assert_eq!(threat["status"], "active");

    let detection = &body["data"]["detection"];
    assert_eq!(detection["model_name"], "ThreatDetectionCNN");
    assert_eq!(detection["threat_type"], threat["threat_type"]);
    let confidence = detection["confidence"].as_f64().unwrap();
    assert!((70.0..=100.0).contains(&confidence));

    let id = threat["id"].as_i64().unwrap();
    let (_, detail) = send(&router, get(&format!("/threats/{}", id))).await;
    let indicators = detail["data"]["indicators"].as_array().unwrap();
    assert_eq!(indicators.len(), 2);
    assert_eq!(indicators[0]["indicator_type"], "hash");
    assert_eq!(indicators[1]["indicator_value"], "10.20.30.40");
    assert_eq!(detail["data"]["analysis"]["model_version"], "1.0.0");
}

#[tokio::test]
async fn test_detect_validation() {
    let router = app();

    let (status, body) = send(
        &router,
        multipart_request("198.51.100.8", &[("source_ip", None, b"10.0.0.1")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");

    let (status, _) = send(
        &router,
        multipart_request(
            "198.51.100.8",
            &[("file", Some("a.bin"), b"abc"), ("source_ip", None, b"999.1.1.1")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let not_multipart = json_request(Method::POST, "/detect", json!({ "file": "x" }));
    let (status, body) = send(&router, not_multipart).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_detect_rate_limit() {
    let config = Config {
        detect_rate_limit: RateLimitConfig {
            max_requests: 2,
            window: Duration::from_secs(60),
        },
        ..Config::default()
    };
    let router = create_router(state_with(
        config,
        Cache::new(Arc::new(MemoryBackend::new())),
        Arc::new(MemoryThreatStore::new()),
    ));

    let upload: &[(&str, Option<&str>, &[u8])] = &[("file", Some("a.bin"), b"abc")];

    for _ in 0..2 {
        let (status, _) = send(&router, multipart_request("203.0.113.1", upload)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&router, multipart_request("203.0.113.1", upload)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);

    // Rejected upload was not recorded
    let (_, body) = send(&router, get("/threats")).await;
    assert_eq!(body["count"], 2);

    // Separate source, separate budget
    let (status, _) = send(&router, multipart_request("203.0.113.2", upload)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_seed_demo_data() {
    let config = Config {
        seed_count: 12,
        ..Config::default()
    };
    let router = create_router(state_with(
        config,
        Cache::new(Arc::new(MemoryBackend::new())),
        Arc::new(MemoryThreatStore::new()),
    ));

    // Cache an empty list first; seeding must invalidate it
    let (_, body) = send(&router, get("/threats")).await;
    assert_eq!(body["count"], 0);

    let seed = Request::builder()
        .method(Method::POST)
        .uri("/seed-demo-data")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&router, seed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 12);
    assert_eq!(body["message"], "Seeded 12 demo threats");

    let (_, body) = send(&router, get("/threats")).await;
    assert_eq!(body["count"], 12);
    assert_eq!(body["cached"], false);
}

#[tokio::test]
async fn test_works_with_cache_disabled() {
    let router = create_router(state_with(
        Config::default(),
        Cache::disabled(),
        Arc::new(MemoryThreatStore::new()),
    ));

    let id = create_malware(&router).await;
    for _ in 0..2 {
        let (status, body) = send(&router, get(&format!("/threats/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cached"], false);
    }

    let (_, body) = send(&router, get("/threats")).await;
    assert_eq!(body["cached"], false);
    assert_eq!(body["count"], 1);
}

/// Store whose every call fails, like a database that went away
struct UnavailableStore;

#[async_trait]
impl ThreatStore for UnavailableStore {
    async fn list_recent(&self, _limit: i64) -> StoreResult<Vec<Threat>> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn get_by_id(&self, _id: i64) -> StoreResult<Option<Threat>> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn create(&self, _threat: NewThreat) -> StoreResult<Threat> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn create_detection(
        &self,
        _threat: NewThreat,
        _indicators: Vec<NewIndicator>,
        _analysis: NewAnalysis,
    ) -> StoreResult<Threat> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn create_many(&self, _threats: Vec<NewThreat>) -> StoreResult<usize> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn update_status(&self, _id: i64, _status: ThreatStatus) -> StoreResult<Option<Threat>> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn statistics(&self) -> StoreResult<Vec<ThreatStatistics>> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn trends(&self, _days: i32) -> StoreResult<Vec<TrendPoint>> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn list_indicators(&self, _threat_id: i64) -> StoreResult<Vec<ThreatIndicator>> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn latest_analysis(&self, _threat_id: i64) -> StoreResult<Option<ThreatAnalysis>> {
        Err(sqlx::Error::PoolTimedOut)
    }
}

#[tokio::test]
async fn test_store_failure_maps_to_500() {
    tokio_test::assert_err!(UnavailableStore.list_recent(1).await);

    let router = create_router(state_with(
        Config::default(),
        Cache::new(Arc::new(MemoryBackend::new())),
        Arc::new(UnavailableStore),
    ));

    let (status, body) = send(&router, get("/threats")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "success": false, "error": "Database error occurred" }));

    let (status, _) = send(
        &router,
        json_request(
            Method::POST,
            "/threats",
            json!({ "threat_type": "apt", "severity": "low", "confidence": 10 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_health() {
    let router = app();
    let (status, body) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["cache"], "memory");
}
