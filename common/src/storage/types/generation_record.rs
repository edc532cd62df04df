use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

/// Per-asset state captured at selection time. `asset_id` is optional to
/// tolerate legacy rows that stored only paths.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct AssetSnapshot {
    #[serde(default)]
    pub asset_id: Option<String>,
    pub asset_path: String,
    #[serde(default)]
    pub aesthetic: Option<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub season: Option<String>,
}

stored_object!(GenerationRecord, "generation_record", {
    account: String,
    post_number: u32,
    assets: Vec<AssetSnapshot>,
    theme: Option<String>,
    degraded: bool,
    caption: Option<String>,
    hashtags: Vec<String>
});

impl GenerationRecord {
    /// The account's most recent records, newest first. Records are
    /// append-only; reruns add rows, they never edit these.
    pub async fn recent_for_account(
        db: &SurrealDbClient,
        account: &str,
        limit: usize,
    ) -> Result<Vec<GenerationRecord>, AppError> {
        let records: Vec<GenerationRecord> = db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE account = $account
                 ORDER BY created_at DESC
                 LIMIT $limit",
            )
            .bind(("table", Self::table_name()))
            .bind(("account", account.to_string()))
            .bind(("limit", limit.max(1) as i64))
            .await?
            .take(0)?;
        Ok(records)
    }
}
