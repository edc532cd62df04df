use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use curation_pipeline::pipeline::RunContext;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub account: String,
    #[serde(default)]
    pub post_count: Option<u32>,
    #[serde(default)]
    pub image_count: Option<u32>,
    /// Set to false to pin every post to the top-ranked theme.
    #[serde(default)]
    pub ensure_variety: Option<bool>,
}

/// Runs a generation synchronously for one account, outside the queue.
/// Intended for operators previewing a strategy change, not for schedules.
pub async fn generate_now(
    State(state): State<ApiState>,
    Json(input): Json<GenerateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(account = %input.account, "synchronous generation requested");

    let mut ctx = RunContext::default();
    let outcome = state
        .pipeline
        .generate(
            &input.account,
            input.post_count,
            input.image_count,
            input.ensure_variety.unwrap_or(true),
            &mut ctx,
        )
        .await?;

    if outcome.is_total_failure() {
        return Err(ApiError::Unprocessable(outcome.failures.join("; ")));
    }

    let record_ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "record_ids": record_ids,
            "metrics": outcome.metrics(),
        })),
    ))
}
