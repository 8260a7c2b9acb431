pub mod auth;
pub mod config;
pub mod crypto;
pub mod health;
pub mod metrics;
pub mod sender;
pub mod sources;
pub mod telemetry;
pub mod tls;
