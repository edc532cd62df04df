use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(UsageEvent, "usage_event", {
    asset_id: String,
    account: String,
    generation_id: String
});

impl UsageEvent {
    /// Appends one usage row per selected asset. The log is read back as a
    /// sliding window by the cooldown tracker and never mutated.
    pub async fn record_batch(
        db: &SurrealDbClient,
        account: &str,
        generation_id: &str,
        asset_ids: &[String],
    ) -> Result<(), AppError> {
        let now = Utc::now();
        for asset_id in asset_ids {
            let event = UsageEvent {
                id: Uuid::new_v4().to_string(),
                asset_id: asset_id.clone(),
                account: account.to_string(),
                generation_id: generation_id.to_string(),
                created_at: now,
                updated_at: now,
            };
            db.store_item(event).await?;
        }
        Ok(())
    }
}
