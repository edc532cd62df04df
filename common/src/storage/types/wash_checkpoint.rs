use surrealdb::sql::Datetime as SurrealDatetime;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(WashCheckpoint, "wash_checkpoint", {
    cursor: String,
    processed_count: u64
});

/// Singleton continuation cursor for the batch-wash job. Advanced per washed
/// asset so a crashed invocation resumes where it stopped instead of waiting
/// for the next scheduled trigger to notice leftover work.
impl WashCheckpoint {
    pub async fn ensure_initialized(db: &SurrealDbClient) -> Result<Self, AppError> {
        let checkpoint = db.get_item::<Self>("current").await?;

        if checkpoint.is_none() {
            let now = Utc::now();
            let created = WashCheckpoint {
                id: "current".to_string(),
                cursor: String::new(),
                processed_count: 0,
                created_at: now,
                updated_at: now,
            };

            let stored: Option<Self> = db.store_item(created).await?;
            return stored.ok_or(AppError::Validation(
                "Failed to initialize wash checkpoint".into(),
            ));
        }

        checkpoint.ok_or(AppError::Validation(
            "Failed to initialize wash checkpoint".into(),
        ))
    }

    pub async fn advance(db: &SurrealDbClient, cursor: &str) -> Result<Self, AppError> {
        let updated: Option<Self> = db
            .client
            .query(
                "UPDATE type::thing('wash_checkpoint', 'current')
                 SET cursor = $cursor, processed_count += 1, updated_at = $now
                 RETURN AFTER",
            )
            .bind(("cursor", cursor.to_string()))
            .bind(("now", SurrealDatetime::from(Utc::now())))
            .await?
            .take(0)?;

        updated.ok_or(AppError::Validation(
            "Failed to advance wash checkpoint".into(),
        ))
    }

    /// Clears the cursor once a full pass over the backlog has finished.
    pub async fn reset_cursor(db: &SurrealDbClient) -> Result<Self, AppError> {
        let updated: Option<Self> = db
            .client
            .query(
                "UPDATE type::thing('wash_checkpoint', 'current')
                 SET cursor = '', updated_at = $now
                 RETURN AFTER",
            )
            .bind(("now", SurrealDatetime::from(Utc::now())))
            .await?
            .take(0)?;

        updated.ok_or(AppError::Validation("Failed to reset wash checkpoint".into()))
    }
}
