use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(AccountStrategy, "account_strategy", {
    account: String,
    target_audience: String,
    aesthetic_focus: Vec<String>,
    color_palette: Vec<String>,
    performance_goal: Option<String>,
    is_active: bool,
    autogen_enabled: bool,
    posts_per_run: u32,
    images_per_post: u32
});

impl AccountStrategy {
    pub async fn find_by_account(
        db: &SurrealDbClient,
        account: &str,
    ) -> Result<Option<AccountStrategy>, AppError> {
        let strategy: Option<AccountStrategy> = db
            .client
            .query("SELECT * FROM type::table($table) WHERE account = $account LIMIT 1")
            .bind(("table", Self::table_name()))
            .bind(("account", account.to_string()))
            .await?
            .take(0)?;
        Ok(strategy)
    }

    /// Accounts picked up by the daily generation job.
    pub async fn list_autogen_enabled(
        db: &SurrealDbClient,
    ) -> Result<Vec<AccountStrategy>, AppError> {
        let strategies: Vec<AccountStrategy> = db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE is_active = true AND autogen_enabled = true
                 ORDER BY account ASC",
            )
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;
        Ok(strategies)
    }
}
