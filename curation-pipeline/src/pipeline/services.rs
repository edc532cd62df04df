use std::sync::Arc;

use async_openai::types::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
};
use async_trait::async_trait;
use common::{
    error::AppError,
    storage::types::{
        account_strategy::AccountStrategy, generation_record::AssetSnapshot,
        generation_record::GenerationRecord, media_asset::MediaAsset, theme::Theme,
    },
    utils::config::AppConfig,
};
use serde::Deserialize;

const CAPTION_SYSTEM_MESSAGE: &str = "You write short social media captions. \
    Given an account's audience, its visual direction and the images picked for a post, \
    return a caption and a list of hashtags. Keep the caption under 200 characters, \
    no emoji spam, hashtags without the leading # sign.";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CaptionResult {
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WashResponse {
    washed_path: String,
}

/// External collaborators of a generation run. Swapped for mocks in tests so
/// selection logic can be exercised without network access.
#[async_trait]
pub trait CollaboratorServices: Send + Sync {
    async fn generate_caption(
        &self,
        strategy: &AccountStrategy,
        theme: Option<&Theme>,
        assets: &[AssetSnapshot],
    ) -> Result<CaptionResult, AppError>;

    /// Pushes a finished post to the configured delivery webhook. A missing
    /// webhook is a no-op, not an error.
    async fn deliver_post(&self, record: &GenerationRecord) -> Result<(), AppError>;

    /// Sends an asset through the media processor and returns the path of
    /// the washed copy.
    async fn wash_asset(&self, asset: &MediaAsset) -> Result<String, AppError>;
}

pub struct DefaultCollaboratorServices {
    openai_client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
    http_client: reqwest::Client,
    config: AppConfig,
}

impl DefaultCollaboratorServices {
    pub fn new(
        openai_client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
        config: AppConfig,
    ) -> Self {
        Self {
            openai_client,
            http_client: reqwest::Client::new(),
            config,
        }
    }
}

fn caption_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "caption": { "type": "string" },
            "hashtags": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["caption", "hashtags"],
        "additionalProperties": false
    })
}

#[async_trait]
impl CollaboratorServices for DefaultCollaboratorServices {
    async fn generate_caption(
        &self,
        strategy: &AccountStrategy,
        theme: Option<&Theme>,
        assets: &[AssetSnapshot],
    ) -> Result<CaptionResult, AppError> {
        let asset_tags: Vec<String> = assets
            .iter()
            .map(|snapshot| {
                format!(
                    "aesthetic={:?} colors={:?} season={:?}",
                    snapshot.aesthetic, snapshot.colors, snapshot.season
                )
            })
            .collect();

        let user_message = format!(
            "Audience: {}\nVisual direction: {:?}\nTheme: {:?}\nImages:\n{}",
            strategy.target_audience,
            strategy.aesthetic_focus,
            theme.map(|t| t.name.as_str()),
            asset_tags.join("\n")
        );

        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: Some("Caption and hashtags for one post".into()),
                name: "post_caption".into(),
                schema: Some(caption_schema()),
                strict: Some(true),
            },
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.caption_model)
            .messages([
                ChatCompletionRequestSystemMessage::from(CAPTION_SYSTEM_MESSAGE).into(),
                ChatCompletionRequestUserMessage::from(user_message).into(),
            ])
            .response_format(response_format)
            .build()?;

        let response = self.openai_client.chat().create(request).await?;
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .ok_or(AppError::Processing(
                "No content in caption model response".into(),
            ))?;

        serde_json::from_str::<CaptionResult>(content)
            .map_err(|e| AppError::Processing(format!("Failed to parse caption response: {e}")))
    }

    async fn deliver_post(&self, record: &GenerationRecord) -> Result<(), AppError> {
        let Some(webhook_url) = self.config.delivery_webhook_url.as_deref() else {
            tracing::debug!(record_id = %record.id, "no delivery webhook configured, skipping");
            return Ok(());
        };

        let response = self
            .http_client
            .post(webhook_url)
            .json(record)
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }

    async fn wash_asset(&self, asset: &MediaAsset) -> Result<String, AppError> {
        let wash_url = self.config.media_wash_url.as_deref().ok_or_else(|| {
            AppError::Validation("media_wash_url is not configured".into())
        })?;

        let response = self
            .http_client
            .post(wash_url)
            .json(&serde_json::json!({ "asset_path": asset.asset_path }))
            .send()
            .await?
            .error_for_status()?;

        let body: WashResponse = response.json().await?;
        Ok(body.washed_path)
    }
}
