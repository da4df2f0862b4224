//! realtime-gateway: the fan-out hub plus its bus consumer and WebSocket
//! upgrade, behind a small HTTP surface for chat intake and health checks.

pub mod bus_bridge;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod state;

pub use config::Config;
