use surrealdb::sql::Datetime as SurrealDatetime;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(MediaAsset, "media_asset", {
    asset_path: String,
    source_account: String,
    aesthetic: Option<String>,
    colors: Vec<String>,
    season: Option<String>,
    occasion: Option<String>,
    traits: Vec<String>,
    washed: bool,
    original_asset_path: Option<String>
});

/// Filter for the candidate query. Empty aesthetic/color lists mean "no
/// strategy filter"; the exclusion set always applies.
#[derive(Debug, Default, Clone)]
pub struct CandidateQuery {
    pub exclude_ids: Vec<String>,
    pub aesthetics: Vec<String>,
    pub colors: Vec<String>,
    pub limit: usize,
}

#[derive(Debug, serde::Deserialize)]
struct CountRow {
    count: usize,
}

impl MediaAsset {
    /// Fetches candidate assets for selection, newest first. The exclusion
    /// set and the strategy filters all run in the store, so the limit
    /// counts matching rows and an old matching asset is never shadowed by
    /// newer non-matching ones. An asset with no aesthetic or color analysis
    /// passes the strategy filters: early-pipeline assets are still usable.
    pub async fn query_candidates(
        db: &SurrealDbClient,
        query: &CandidateQuery,
    ) -> Result<Vec<MediaAsset>, AppError> {
        const CANDIDATE_QUERY: &str = r#"
            SELECT * FROM type::table($table)
            WHERE record::id(id) NOTINSIDE $excluded
                AND (
                    array::len($aesthetics) = 0
                    OR aesthetic = NONE
                    OR array::any($aesthetics, |$focus| string::contains(string::lowercase(aesthetic), $focus))
                )
                AND (
                    array::len($palette) = 0
                    OR array::len(colors) = 0
                    OR array::any(colors, |$color| array::any($palette, |$wanted| string::contains(string::lowercase($color), $wanted)))
                )
            ORDER BY created_at DESC
            LIMIT $limit
        "#;

        let mut result = db
            .client
            .query(CANDIDATE_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("excluded", query.exclude_ids.clone()))
            .bind(("aesthetics", lowercase_all(&query.aesthetics)))
            .bind(("palette", lowercase_all(&query.colors)))
            .bind(("limit", query.limit.max(1) as i64))
            .await?;

        let fetched: Vec<MediaAsset> = result.take(0)?;
        Ok(fetched)
    }

    /// One page of unwashed assets in stable id order, resuming after the
    /// given cursor.
    pub async fn unwashed_page(
        db: &SurrealDbClient,
        after_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MediaAsset>, AppError> {
        const PAGE_QUERY: &str = r#"
            SELECT * FROM type::table($table)
            WHERE washed = false AND record::id(id) > $cursor
            ORDER BY id ASC
            LIMIT $limit
        "#;

        let mut result = db
            .client
            .query(PAGE_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("cursor", after_id.unwrap_or_default().to_string()))
            .bind(("limit", limit.max(1) as i64))
            .await?;

        let page: Vec<MediaAsset> = result.take(0)?;
        Ok(page)
    }

    pub async fn count_unwashed(db: &SurrealDbClient) -> Result<usize, AppError> {
        let mut result = db
            .client
            .query("SELECT count() AS count FROM type::table($table) WHERE washed = false GROUP ALL")
            .bind(("table", Self::table_name()))
            .await?;

        let row: Option<CountRow> = result.take(0)?;
        Ok(row.map_or(0, |row| row.count))
    }

    /// Records a washed copy: the original path is kept for inspection and
    /// the row now points at the rewritten file.
    pub async fn mark_washed(
        db: &SurrealDbClient,
        asset_id: &str,
        washed_path: &str,
    ) -> Result<MediaAsset, AppError> {
        const WASH_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET original_asset_path = asset_path,
                asset_path = $washed_path,
                washed = true,
                updated_at = $now
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(WASH_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", asset_id.to_string()))
            .bind(("washed_path", washed_path.to_string()))
            .bind(("now", SurrealDatetime::from(Utc::now())))
            .await?;

        let updated: Option<MediaAsset> = result.take(0)?;
        updated.ok_or_else(|| AppError::NotFound(format!("media asset {asset_id} not found")))
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .filter(|value| !value.trim().is_empty())
        .map(|value| value.to_lowercase())
        .collect()
}
