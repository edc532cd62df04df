use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    pub http_port: u16,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_caption_model")]
    pub caption_model: String,
    /// Poll interval of the worker loop in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,
    /// Upper bound of jobs claimed and run concurrently per poll.
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    /// How many recent generations per account block asset reuse.
    #[serde(default = "default_cooldown_window")]
    pub cooldown_window: usize,
    /// Wall-clock budget for one wash_batch invocation, in seconds.
    #[serde(default = "default_wash_budget_secs")]
    pub wash_budget_secs: u64,
    #[serde(default = "default_wash_page_size")]
    pub wash_page_size: usize,
    /// Webhook notified after each generated post. Failures are logged only.
    #[serde(default)]
    pub delivery_webhook_url: Option<String>,
    /// External media processor that rewrites an asset into a washed copy.
    #[serde(default)]
    pub media_wash_url: Option<String>,
    /// Token required on mutating API routes when set.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Process-wide switch that disables enqueue deduplication.
    #[serde(default)]
    pub idempotency_disabled: bool,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_caption_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_worker_concurrency() -> usize {
    2
}

fn default_cooldown_window() -> usize {
    6
}

fn default_wash_budget_secs() -> u64 {
    240
}

fn default_wash_page_size() -> usize {
    25
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
