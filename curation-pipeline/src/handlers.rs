use std::time::Duration;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            account_strategy::AccountStrategy,
            job_run::{JobPayload, JobRun, JobType},
        },
    },
    utils::config::AppConfig,
};
use tracing::{info, warn};

use crate::pipeline::{CurationPipeline, RunContext};

/// Dispatches one claimed job to its handler. The match is exhaustive over
/// the job type enum, so an unhandled type cannot reach production.
#[tracing::instrument(
    skip_all,
    fields(
        job_id = %job.id,
        job_type = job.job_type.as_str(),
        attempt = job.attempt,
        worker_id = job.worker_id.as_deref().unwrap_or("unknown-worker")
    )
)]
pub async fn handle_job(
    db: &SurrealDbClient,
    pipeline: &CurationPipeline,
    config: &AppConfig,
    job: &JobRun,
) -> Result<serde_json::Value, AppError> {
    match job.job_type {
        JobType::DailyGenerate => handle_daily_generate(db, pipeline, &job.payload).await,
        JobType::WashBatch => handle_wash_batch(db, pipeline, config, &job.payload).await,
        JobType::RunOnce => Ok(serde_json::json!({ "echo": job.payload.echo })),
    }
}

/// Generates posts for one account, or for every autogen-enabled account
/// when the payload names none. Accounts are isolated: one failing account
/// is recorded and the run continues, and the job only fails when every
/// account failed.
async fn handle_daily_generate(
    db: &SurrealDbClient,
    pipeline: &CurationPipeline,
    payload: &JobPayload,
) -> Result<serde_json::Value, AppError> {
    if payload.post_count == Some(0) || payload.image_count == Some(0) {
        return Err(AppError::Validation(
            "post_count and image_count must be at least 1".to_string(),
        ));
    }

    let accounts: Vec<String> = match &payload.account {
        Some(account) => vec![account.clone()],
        None => AccountStrategy::list_autogen_enabled(db)
            .await?
            .into_iter()
            .map(|strategy| strategy.account)
            .collect(),
    };

    if accounts.is_empty() {
        info!("no autogen-enabled accounts, nothing to do");
        return Ok(serde_json::json!({ "accounts": 0, "generated_posts": 0 }));
    }

    // One context for the whole run: an asset picked for the first account
    // is off the table for the rest, and so is a used theme anchor.
    let mut ctx = RunContext::default();
    let mut account_metrics = Vec::with_capacity(accounts.len());
    let mut generated_posts = 0usize;
    let mut failed_accounts: Vec<String> = Vec::new();

    for account in &accounts {
        match pipeline
            .generate(
                account,
                payload.post_count,
                payload.image_count,
                payload.ensure_variety.unwrap_or(true),
                &mut ctx,
            )
            .await
        {
            Ok(outcome) => {
                if outcome.is_total_failure() {
                    warn!(%account, "every post failed for account");
                    failed_accounts.push(account.clone());
                }
                generated_posts += outcome.records.len();
                account_metrics.push(outcome.metrics());
            }
            Err(err) => {
                warn!(%account, error = %err, "account generation failed");
                failed_accounts.push(account.clone());
                account_metrics.push(serde_json::json!({
                    "account": account,
                    "error": err.to_string(),
                }));
            }
        }
    }

    if generated_posts == 0 && !failed_accounts.is_empty() {
        return Err(AppError::Processing(format!(
            "all {} account(s) failed to generate",
            failed_accounts.len()
        )));
    }

    Ok(serde_json::json!({
        "accounts": accounts.len(),
        "generated_posts": generated_posts,
        "failed_accounts": failed_accounts,
        "per_account": account_metrics,
    }))
}

/// Washes a slice of the unwashed backlog within the configured budget and
/// re-enqueues itself when work remains. The continuation is forced past
/// deduplication: it must run even though a wash job already ran today.
async fn handle_wash_batch(
    db: &SurrealDbClient,
    pipeline: &CurationPipeline,
    config: &AppConfig,
    payload: &JobPayload,
) -> Result<serde_json::Value, AppError> {
    if config.media_wash_url.is_none() {
        info!("media_wash_url not configured, skipping wash batch");
        return Ok(serde_json::json!({ "skipped": true }));
    }

    let outcome = pipeline
        .wash_batch(
            payload.cursor.clone(),
            config.wash_page_size,
            Duration::from_secs(config.wash_budget_secs),
        )
        .await?;

    let mut continuation_id = None;
    if !outcome.finished {
        let continuation = JobRun::enqueue(
            db,
            JobType::WashBatch,
            JobPayload {
                cursor: outcome.next_cursor,
                force: true,
                ..JobPayload::default()
            },
            None,
            config.idempotency_disabled,
        )
        .await?;
        info!(continuation_id = %continuation.id, "re-enqueued wash continuation");
        continuation_id = Some(continuation.id);
    }

    Ok(serde_json::json!({
        "washed": outcome.washed,
        "remaining": outcome.remaining,
        "continuation_id": continuation_id,
    }))
}
