#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod handlers;
pub mod pipeline;

use std::sync::Arc;

use common::{
    storage::{
        db::SurrealDbClient,
        types::job_run::{JobRun, DEFAULT_LEASE_SECS},
    },
    utils::config::AppConfig,
};
use futures::future::join_all;
pub use pipeline::{CurationConfig, CurationPipeline, CurationTuning};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

const ERROR_EXCERPT_LEN: usize = 500;

/// Claims up to the configured number of queued jobs per poll and runs them
/// concurrently. The loop never exits on a job failure: the failure lands on
/// the job row and the poll continues.
pub async fn run_worker_loop(
    db: Arc<SurrealDbClient>,
    pipeline: Arc<CurationPipeline>,
    config: AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let worker_id = format!("curation-worker-{}", Uuid::new_v4());
    let poll_interval = Duration::from_millis(config.worker_poll_interval_ms);
    let lease = Duration::from_secs(DEFAULT_LEASE_SECS);

    loop {
        match JobRun::claim_ready(&db, &worker_id, config.worker_concurrency, lease).await {
            Ok(claimed) if !claimed.is_empty() => {
                info!(%worker_id, count = claimed.len(), "claimed jobs");
                let runs = claimed
                    .into_iter()
                    .map(|job| run_claimed_job(&db, &pipeline, &config, job));
                join_all(runs).await;
            }
            Ok(_) => {
                sleep(poll_interval).await;
            }
            Err(err) => {
                error!(%worker_id, error = %err, "failed to claim jobs");
                warn!("Backing off for 1s after claim error");
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn run_claimed_job(
    db: &SurrealDbClient,
    pipeline: &CurationPipeline,
    config: &AppConfig,
    job: JobRun,
) {
    let result = handlers::handle_job(db, pipeline, config, &job).await;

    let (success, retryable, error_excerpt, metrics) = match result {
        Ok(metrics) => (true, true, None, Some(metrics)),
        Err(err) => {
            error!(job_id = %job.id, error = %err, retryable = err.is_retryable(), "job failed");
            (
                false,
                err.is_retryable(),
                Some(truncate_error(&err.to_string())),
                None,
            )
        }
    };

    if let Err(err) = job
        .complete(db, success, retryable, error_excerpt, metrics)
        .await
    {
        // Another actor moved the row; the next claim will sort it out.
        error!(job_id = %job.id, error = %err, "failed to record job result");
    }
}

fn truncate_error(message: &str) -> String {
    message.chars().take(ERROR_EXCERPT_LEN).collect()
}
