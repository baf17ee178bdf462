//! Database module - PostgreSQL connection and migrations

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create tables if not exist
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Threats (detections and manual reports)
CREATE TABLE IF NOT EXISTS threats (
    id BIGSERIAL PRIMARY KEY,
    threat_type VARCHAR(20) NOT NULL
        CHECK (threat_type IN ('malware', 'zero_day', 'apt')),
    severity VARCHAR(20) NOT NULL
        CHECK (severity IN ('critical', 'high', 'medium', 'low')),
    confidence DOUBLE PRECISION NOT NULL
        CHECK (confidence >= 0 AND confidence <= 100),
    file_hash VARCHAR(128),
    file_name VARCHAR(512),
    file_size BIGINT CHECK (file_size >= 0),
    source_ip VARCHAR(45),
    destination_ip VARCHAR(45),
    description TEXT,
    raw_data JSONB NOT NULL DEFAULT '{}',
    status VARCHAR(20) NOT NULL DEFAULT 'active'
        CHECK (status IN ('active', 'resolved', 'false_positive')),
    detected_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Indicators of compromise attached to a threat
CREATE TABLE IF NOT EXISTS threat_indicators (
    id BIGSERIAL PRIMARY KEY,
    threat_id BIGINT NOT NULL REFERENCES threats(id) ON DELETE CASCADE,
    indicator_type VARCHAR(20) NOT NULL
        CHECK (indicator_type IN ('ip', 'domain', 'hash', 'url', 'email')),
    indicator_value TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Classifier output per threat
CREATE TABLE IF NOT EXISTS threat_analysis (
    id BIGSERIAL PRIMARY KEY,
    threat_id BIGINT NOT NULL REFERENCES threats(id) ON DELETE CASCADE,
    model_name VARCHAR(255) NOT NULL,
    model_version VARCHAR(50),
    prediction_scores JSONB NOT NULL DEFAULT '{}',
    features_analyzed JSONB NOT NULL DEFAULT '{}',
    analysis_time_ms INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_threats_detected ON threats(detected_at DESC);
CREATE INDEX IF NOT EXISTS idx_threats_type ON threats(threat_type);
CREATE INDEX IF NOT EXISTS idx_threats_status ON threats(status);
CREATE INDEX IF NOT EXISTS idx_indicators_threat ON threat_indicators(threat_id);
CREATE INDEX IF NOT EXISTS idx_analysis_threat ON threat_analysis(threat_id, created_at DESC);
"#;
