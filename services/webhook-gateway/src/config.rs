//! Configuration for webhook-gateway, loaded once at startup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub bus: BusConfig,
    pub outbox: OutboxConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub brokers: String,
    pub topic_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxConfig {
    pub worker_count: usize,
    pub batch_size: i64,
    pub lease_ttl_secs: u64,
    pub poll_interval_ms: u64,
    pub backoff_initial_secs: u64,
    pub backoff_max_secs: u64,
    pub max_retries: i32,
    pub drain_timeout_secs: u64,
}

impl OutboxConfig {
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn backoff_initial(&self) -> Duration {
        Duration::from_secs(self.backoff_initial_secs)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// Shared secrets for every source a signature is verified against, plus
/// the Facebook subscription handshake token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub secret_loyverse: String,
    pub secret_facebook: String,
    pub secret_line: String,
    pub secret_grab: String,
    pub secret_lineman: String,
    pub secret_omise: String,
    pub secret_2c2p: String,
    pub facebook_verify_token: String,
}

impl Config {
    /// Loads configuration from environment variables, applying the same
    /// defaults-with-override pattern every service binary in the corpus
    /// uses so a bare `docker run` still comes up against local infra.
    pub fn from_env() -> Result<Self, String> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                host: std::env::var("WEBHOOK_GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("WEBHOOK_GATEWAY_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8081),
                shutdown_timeout_secs: std::env::var("SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/orderflow".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(10),
            },
            bus: BusConfig {
                brokers: std::env::var("BUS_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string()),
                topic_prefix: std::env::var("BUS_TOPIC_PREFIX").unwrap_or_default(),
            },
            outbox: OutboxConfig {
                worker_count: std::env::var("OUTBOX_WORKER_COUNT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1),
                batch_size: std::env::var("OUTBOX_BATCH_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(100),
                lease_ttl_secs: std::env::var("OUTBOX_LEASE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
                poll_interval_ms: std::env::var("OUTBOX_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(500),
                backoff_initial_secs: std::env::var("OUTBOX_BACKOFF_INITIAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1),
                backoff_max_secs: std::env::var("OUTBOX_BACKOFF_MAX_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
                max_retries: std::env::var("OUTBOX_MAX_RETRIES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
                drain_timeout_secs: std::env::var("OUTBOX_DRAIN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            },
            webhook: WebhookConfig {
                secret_loyverse: std::env::var("WEBHOOK_SECRET_LOYVERSE").unwrap_or_default(),
                secret_facebook: std::env::var("WEBHOOK_SECRET_FACEBOOK").unwrap_or_default(),
                secret_line: std::env::var("WEBHOOK_SECRET_LINE").unwrap_or_default(),
                secret_grab: std::env::var("WEBHOOK_SECRET_GRAB").unwrap_or_default(),
                secret_lineman: std::env::var("WEBHOOK_SECRET_LINEMAN").unwrap_or_default(),
                secret_omise: std::env::var("WEBHOOK_SECRET_OMISE").unwrap_or_default(),
                secret_2c2p: std::env::var("WEBHOOK_SECRET_2C2P").unwrap_or_default(),
                facebook_verify_token: std::env::var("FACEBOOK_VERIFY_TOKEN").unwrap_or_default(),
            },
        })
    }
}
