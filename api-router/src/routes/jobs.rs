use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use common::{
    error::AppError,
    storage::types::job_run::{JobPayload, JobRun, JobType},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct EnqueueJobRequest {
    pub job_type: JobType,
    #[serde(default)]
    pub payload: JobPayload,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// Enqueues a job, deduplicated on its idempotency key. A repeat trigger for
/// the same key returns the existing run with 200 instead of a new one with
/// 202, so callers can tell the two apart.
pub async fn enqueue_job(
    State(state): State<ApiState>,
    Json(input): Json<EnqueueJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let before = JobRun::find_by_key(
        &state.db,
        &common::utils::idempotency::compute_idempotency_key(
            input.job_type,
            &input.payload,
            state.config.idempotency_disabled,
        ),
    )
    .await
    .map_err(ApiError::from)?;

    let job = JobRun::enqueue(
        &state.db,
        input.job_type,
        input.payload,
        input.max_attempts,
        state.config.idempotency_disabled,
    )
    .await?;

    let deduplicated = before.is_some_and(|existing| existing.id == job.id);
    info!(
        run_id = %job.id,
        job_type = job.job_type.as_str(),
        deduplicated,
        "job enqueued"
    );

    let status = if deduplicated {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((
        status,
        Json(json!({
            "run_id": job.id,
            "idempotency_key": job.idempotency_key,
            "status": job.status.as_str(),
            "deduplicated": deduplicated,
        })),
    ))
}

pub async fn get_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .db
        .get_item::<JobRun>(&id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("job run {id} not found")))?;

    Ok(Json(json!({
        "run_id": job.id,
        "job_type": job.job_type.as_str(),
        "idempotency_key": job.idempotency_key,
        "status": job.status.as_str(),
        "attempt": job.attempt,
        "max_attempts": job.max_attempts,
        "error_excerpt": job.error_excerpt,
        "metrics": job.metrics,
        "created_at": job.created_at,
        "updated_at": job.updated_at,
    })))
}
