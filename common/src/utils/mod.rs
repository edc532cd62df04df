pub mod config;
pub mod idempotency;
