//! ThreatScope backend
//!
//! Threat detection dashboard API: file uploads are classified, persisted
//! and served back through cache-fronted read endpoints.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       THREATSCOPE                          │
//! ├────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │ HTTP API   │──▶│ Cache Layer  │──▶│ Redis / DashMap  │  │
//! │  │ (Axum)     │   │ (TTL, limit) │   └──────────────────┘  │
//! │  └─────┬──────┘   └──────────────┘                         │
//! │        │          ┌──────────────┐   ┌──────────────────┐  │
//! │        ├─────────▶│ ThreatStore  │──▶│ PostgreSQL       │  │
//! │        │          └──────────────┘   └──────────────────┘  │
//! │        │          ┌──────────────┐                         │
//! │        └─────────▶│ Classifier   │                         │
//! │                   └──────────────┘                         │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod db;
pub mod detection;
pub mod error;
pub mod handlers;
pub mod models;
pub mod store;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use cache::Cache;
pub use config::Config;
pub use detection::ThreatClassifier;
pub use error::{AppError, AppResult};
pub use store::ThreatStore;

/// Shared application state, constructed once at startup
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ThreatStore>,
    pub cache: Cache,
    pub classifier: Arc<dyn ThreatClassifier>,
    pub config: Config,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(handlers::health::check))
        // Detection
        .route("/detect", post(handlers::detect::detect))
        .route("/seed-demo-data", post(handlers::seed::seed_demo_data))
        // Threats
        .route("/threats", get(handlers::threats::list).post(handlers::threats::create))
        .route("/threats/statistics", get(handlers::statistics::get))
        .route(
            "/threats/:id",
            get(handlers::threats::get).patch(handlers::threats::update_status),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
