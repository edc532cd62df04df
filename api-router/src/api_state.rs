use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use common::{storage::db::SurrealDbClient, utils::config::AppConfig};
use curation_pipeline::CurationPipeline;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub pipeline: Arc<CurationPipeline>,
}

impl ApiState {
    pub async fn new(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let surreal_db_client = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        surreal_db_client.ensure_initialized().await?;

        let openai_client = Arc::new(async_openai::Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        ));
        let pipeline = Arc::new(CurationPipeline::new(
            Arc::clone(&surreal_db_client),
            openai_client,
            config,
        ));

        Ok(Self {
            db: surreal_db_client,
            config: config.clone(),
            pipeline,
        })
    }

    /// Assembles a state from pre-built parts, used by tests and by binaries
    /// that already hold a pipeline.
    pub fn from_parts(
        db: Arc<SurrealDbClient>,
        config: AppConfig,
        pipeline: Arc<CurationPipeline>,
    ) -> Self {
        Self {
            db,
            config,
            pipeline,
        }
    }
}
