use state_machines::state_machine;
use std::time::Duration;
use surrealdb::sql::Datetime as SurrealDatetime;
use uuid::Uuid;

use crate::{
    error::AppError, storage::db::SurrealDbClient, stored_object,
    utils::idempotency::compute_idempotency_key,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// How long a claimed row stays owned by its worker before another worker
/// may reclaim it.
pub const DEFAULT_LEASE_SECS: u64 = 600;

/// Closed set of job types. Adding one is a compile-time change: the worker
/// dispatch is an exhaustive match over this enum.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    DailyGenerate,
    WashBatch,
    RunOnce,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::DailyGenerate => "daily_generate",
            JobType::WashBatch => "wash_batch",
            JobType::RunOnce => "run_once",
        }
    }
}

/// Structured job payload. Every field is optional so triggers can stay
/// minimal; the idempotency key function and the handlers read what they
/// need and ignore the rest.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct JobPayload {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub post_count: Option<u32>,
    #[serde(default)]
    pub image_count: Option<u32>,
    /// Disables theme rotation so every post draws the top-ranked theme.
    /// Unset means rotation stays on.
    #[serde(default)]
    pub ensure_variety: Option<bool>,
    /// Scopes the idempotency key to an explicit date instead of today.
    #[serde(default)]
    pub date: Option<String>,
    /// Caller-supplied key, used verbatim when present.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    /// Bypasses deduplication entirely.
    #[serde(default)]
    pub force: bool,
    /// Continuation cursor carried by self-enqueued wash batches.
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub echo: Option<serde_json::Value>,
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy)]
enum JobTransition {
    Claim,
    Finish,
    Requeue,
    Fail,
}

impl JobTransition {
    fn as_str(&self) -> &'static str {
        match self {
            JobTransition::Claim => "claim",
            JobTransition::Finish => "finish",
            JobTransition::Requeue => "requeue",
            JobTransition::Fail => "fail",
        }
    }
}

mod lifecycle {
    use super::state_machine;

    state_machine! {
        name: JobLifecycleMachine,
        initial: Queued,
        states: [Queued, Running, Completed, Failed],
        events {
            claim {
                transition: { from: Queued, to: Running }
            }
            finish {
                transition: { from: Running, to: Completed }
            }
            requeue {
                transition: { from: Running, to: Queued }
            }
            fail {
                transition: { from: Running, to: Failed }
            }
        }
    }

    pub(super) fn queued() -> JobLifecycleMachine<(), Queued> {
        JobLifecycleMachine::new(())
    }

    pub(super) fn running() -> JobLifecycleMachine<(), Running> {
        queued()
            .claim()
            .expect("claim transition from Queued should exist")
    }
}

fn invalid_transition(state: JobStatus, event: JobTransition) -> AppError {
    AppError::Validation(format!(
        "Invalid job transition: {} -> {}",
        state.as_str(),
        event.as_str()
    ))
}

fn compute_next_state(state: JobStatus, event: JobTransition) -> Result<JobStatus, AppError> {
    use lifecycle::*;
    match (state, event) {
        (JobStatus::Queued, JobTransition::Claim) => queued()
            .claim()
            .map(|_| JobStatus::Running)
            .map_err(|_| invalid_transition(state, event)),
        (JobStatus::Running, JobTransition::Finish) => running()
            .finish()
            .map(|_| JobStatus::Completed)
            .map_err(|_| invalid_transition(state, event)),
        (JobStatus::Running, JobTransition::Requeue) => running()
            .requeue()
            .map(|_| JobStatus::Queued)
            .map_err(|_| invalid_transition(state, event)),
        (JobStatus::Running, JobTransition::Fail) => running()
            .fail()
            .map(|_| JobStatus::Failed)
            .map_err(|_| invalid_transition(state, event)),
        _ => Err(invalid_transition(state, event)),
    }
}

stored_object!(JobRun, "job_run", {
    job_type: JobType,
    idempotency_key: String,
    payload: JobPayload,
    status: JobStatus,
    attempt: u32,
    max_attempts: u32,
    worker_id: Option<String>,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    locked_at: Option<DateTime<Utc>>,
    error_excerpt: Option<String>,
    metrics: Option<serde_json::Value>
});

impl JobRun {
    fn new(
        job_type: JobType,
        idempotency_key: String,
        payload: JobPayload,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            job_type,
            idempotency_key,
            payload,
            status: JobStatus::Queued,
            attempt: 0,
            max_attempts,
            worker_id: None,
            locked_at: None,
            error_excerpt: None,
            metrics: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Get-or-create on the idempotency key. A uniqueness conflict is not an
    /// error: the existing row is fetched and returned, so two triggers on
    /// the same key always observe the same run id.
    pub async fn enqueue(
        db: &SurrealDbClient,
        job_type: JobType,
        payload: JobPayload,
        max_attempts: Option<u32>,
        dedup_disabled: bool,
    ) -> Result<JobRun, AppError> {
        let key = compute_idempotency_key(job_type, &payload, dedup_disabled);
        let candidate = Self::new(
            job_type,
            key.clone(),
            payload,
            max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        );

        match db.store_item(candidate).await {
            Ok(Some(created)) => Ok(created),
            Ok(None) => Self::find_by_key(db, &key)
                .await?
                .ok_or_else(|| AppError::InternalError("enqueue returned no row".into())),
            Err(err) => {
                // The unique index rejected the insert; surface the row that
                // owns the key instead of the conflict.
                if let Some(existing) = Self::find_by_key(db, &key).await? {
                    Ok(existing)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    pub async fn find_by_key(
        db: &SurrealDbClient,
        idempotency_key: &str,
    ) -> Result<Option<JobRun>, AppError> {
        let existing: Option<JobRun> = db
            .client
            .query("SELECT * FROM type::table($table) WHERE idempotency_key = $key LIMIT 1")
            .bind(("table", Self::table_name()))
            .bind(("key", idempotency_key.to_string()))
            .await?
            .take(0)?;
        Ok(existing)
    }

    /// Atomically claims up to `limit` ready rows for one worker. The claim
    /// runs as a single UPDATE over a sub-select, so concurrent callers never
    /// receive the same row. A `running` row whose lease has expired counts
    /// as ready again: its worker is presumed dead and another one takes
    /// over without a new attempt being charged.
    pub async fn claim_ready(
        db: &SurrealDbClient,
        worker_id: &str,
        limit: usize,
        lease: Duration,
    ) -> Result<Vec<JobRun>, AppError> {
        debug_assert!(compute_next_state(JobStatus::Queued, JobTransition::Claim).is_ok());

        const CLAIM_QUERY: &str = r#"
            UPDATE (
                SELECT * FROM type::table($table)
                WHERE (
                        status = $queued
                        AND attempt < max_attempts
                      )
                   OR (
                        status = $running
                        AND locked_at != NONE
                        AND time::unix($now) - time::unix(locked_at) >= $lease_secs
                      )
                ORDER BY created_at ASC
                LIMIT $limit
            )
            SET attempt = IF status = $queued THEN attempt + 1 ELSE attempt END,
                status = $running,
                worker_id = $worker_id,
                locked_at = $now,
                updated_at = $now
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(CLAIM_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("queued", JobStatus::Queued.as_str()))
            .bind(("running", JobStatus::Running.as_str()))
            .bind(("limit", limit as i64))
            .bind(("worker_id", worker_id.to_string()))
            .bind(("lease_secs", lease.as_secs() as i64))
            .bind(("now", SurrealDatetime::from(Utc::now())))
            .await?;

        let claimed: Vec<JobRun> = result.take(0)?;
        Ok(claimed)
    }

    /// Terminal or retrying transition, guarded so only the claiming worker
    /// can move the row out of `running`. A retryable failure re-enters the
    /// queue while attempts remain; a non-retryable one is dead-lettered
    /// immediately with the error excerpt retained.
    pub async fn complete(
        &self,
        db: &SurrealDbClient,
        success: bool,
        retryable: bool,
        error_excerpt: Option<String>,
        metrics: Option<serde_json::Value>,
    ) -> Result<JobRun, AppError> {
        let transition = if success {
            JobTransition::Finish
        } else if retryable && self.can_retry() {
            JobTransition::Requeue
        } else {
            JobTransition::Fail
        };
        let next = compute_next_state(self.status, transition)?;

        const COMPLETE_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $next,
                worker_id = NONE,
                locked_at = NONE,
                error_excerpt = $error_excerpt,
                metrics = $metrics,
                updated_at = $now
            WHERE status = $running AND worker_id = $worker_id
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(COMPLETE_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("next", next.as_str()))
            .bind(("running", JobStatus::Running.as_str()))
            .bind(("error_excerpt", error_excerpt))
            .bind(("metrics", metrics))
            .bind(("worker_id", self.worker_id.clone().unwrap_or_default()))
            .bind(("now", SurrealDatetime::from(Utc::now())))
            .await?;

        let updated: Option<JobRun> = result.take(0)?;
        updated.ok_or_else(|| invalid_transition(self.status, transition))
    }
}
