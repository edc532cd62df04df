use chrono::Utc;

use crate::storage::types::job_run::{JobPayload, JobType};

/// Derives the stable key that collapses repeated triggers of the same
/// logical job into one queue row.
///
/// Precedence: a `force` flag (or the process-wide disable switch) wins and
/// yields a timestamped, effectively unique key; next an explicit
/// caller-supplied key is used verbatim; next an explicit `date` field; the
/// default scopes the job to one run per UTC calendar day.
///
/// The function is pure apart from reading the clock and must be evaluated
/// before the insert attempt, never after.
pub fn compute_idempotency_key(
    job_type: JobType,
    payload: &JobPayload,
    dedup_disabled: bool,
) -> String {
    let now = Utc::now();

    if payload.force || dedup_disabled {
        let stamp = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros());
        return format!("{}:{stamp}", job_type.as_str());
    }

    if let Some(key) = payload
        .idempotency_key
        .as_deref()
        .filter(|key| !key.is_empty())
    {
        return key.to_string();
    }

    if let Some(date) = payload.date.as_deref().filter(|date| !date.is_empty()) {
        return format!("{}:{date}", job_type.as_str());
    }

    format!("{}:{}", job_type.as_str(), now.format("%Y-%m-%d"))
}
