//! Configuration for realtime-gateway, loaded once at startup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub bus: BusConfig,
    pub hub: HubConfig,
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
    /// How long a processed `chat-messages` event id is remembered by the
    /// idempotent-consumer guard before it's eligible for cleanup.
    pub idempotency_retention_secs: u64,
}

impl DatabaseConfig {
    pub fn idempotency_retention(&self) -> Duration {
        Duration::from_secs(self.idempotency_retention_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub brokers: String,
    pub topic_prefix: String,
    pub consumer_group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    pub queue_capacity: usize,
    pub reap_interval_secs: u64,
    pub stale_after_secs: u64,
}

impl HubConfig {
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn to_hub_config(&self) -> realtime_hub::HubConfig {
        realtime_hub::HubConfig {
            queue_capacity: self.queue_capacity,
            reap_interval: self.reap_interval(),
            stale_after: self.stale_after(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, applying the same
    /// defaults-with-override pattern every service binary in the corpus
    /// uses so a bare `docker run` still comes up against local infra.
    pub fn from_env() -> Result<Self, String> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                host: std::env::var("REALTIME_GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("REALTIME_GATEWAY_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8082),
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
                    .unwrap_or(5),
                idempotency_retention_secs: std::env::var("IDEMPOTENCY_RETENTION_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(7 * 86_400),
            },
            bus: BusConfig {
                brokers: std::env::var("BUS_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string()),
                topic_prefix: std::env::var("BUS_TOPIC_PREFIX").unwrap_or_default(),
                consumer_group: std::env::var("HUB_CONSUMER_GROUP")
                    .unwrap_or_else(|_| "realtime-gateway".to_string()),
            },
            hub: HubConfig {
                queue_capacity: std::env::var("HUB_QUEUE_CAPACITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(256),
                reap_interval_secs: std::env::var("HUB_REAP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(15),
                stale_after_secs: std::env::var("HUB_STALE_AFTER_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(90),
            },
        })
    }
}
