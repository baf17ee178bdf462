//! ThreatScope server entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use threatscope::cache::{Cache, MemoryBackend, RedisBackend};
use threatscope::config::{CacheMode, Config, StorageBackend};
use threatscope::detection::SimulatedClassifier;
use threatscope::store::{MemoryThreatStore, PgThreatStore, ThreatStore};
use threatscope::{create_router, db, AppState};

/// How often the in-memory cache drops expired entries
const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    init_tracing(&config);

    tracing::info!("ThreatScope server starting...");

    let store = build_store(&config).await?;
    let cache = build_cache(&config).await;

    // Build application state
    let state = AppState {
        store,
        cache,
        classifier: Arc::new(SimulatedClassifier::new()),
        config: config.clone(),
    };

    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("ThreatScope server stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "threatscope=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn ThreatStore>> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

            let pool = db::create_pool(&config.database_url, config.database_max_connections)
                .await
                .context("Failed to create database pool")?;

            tracing::info!("Running database migrations...");
            db::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;

            Ok(Arc::new(PgThreatStore::new(pool)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            Ok(Arc::new(MemoryThreatStore::new()))
        }
    }
}

/// Cache problems never stop the server, it just runs uncached
async fn build_cache(config: &Config) -> Cache {
    match (config.cache_mode, config.redis_url.as_deref()) {
        (CacheMode::Redis, Some(url)) => match RedisBackend::connect(url).await {
            Ok(backend) => {
                tracing::info!("Cache: redis");
                Cache::new(Arc::new(backend))
            }
            Err(e) => {
                tracing::warn!("Redis unavailable ({}), caching disabled", e);
                Cache::disabled()
            }
        },
        (CacheMode::Redis, None) => {
            tracing::warn!("CACHE_BACKEND=redis but REDIS_URL is not set, caching disabled");
            Cache::disabled()
        }
        (CacheMode::Memory, _) => {
            tracing::info!("Cache: in-memory");
            let backend = MemoryBackend::new();
            backend.spawn_janitor(JANITOR_INTERVAL);
            Cache::new(Arc::new(backend))
        }
        (CacheMode::Disabled, _) => {
            tracing::info!("Caching disabled");
            Cache::disabled()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
