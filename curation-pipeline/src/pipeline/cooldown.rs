use std::collections::HashSet;

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::generation_record::GenerationRecord},
};
use sha2::{Digest, Sha256};

/// Assets an account used within its cooldown window. Ids are excluded in the
/// candidate query; path digests cover legacy records that captured only a
/// URL, and are matched after the fetch.
#[derive(Debug, Default, Clone)]
pub struct CooldownSet {
    pub asset_ids: HashSet<String>,
    path_digests: HashSet<String>,
}

impl CooldownSet {
    pub fn contains_path(&self, asset_path: &str) -> bool {
        self.path_digests.contains(&digest_path(asset_path))
    }

    pub fn exclude_ids(&self) -> Vec<String> {
        self.asset_ids.iter().cloned().collect()
    }
}

fn digest_path(asset_path: &str) -> String {
    let digest = Sha256::digest(asset_path.as_bytes());
    format!("{digest:x}")
}

/// Builds the cooldown set from the account's last `window` generation
/// records. The window counts records, not days, so a quiet account does not
/// slowly lose its entire library to the cooldown.
pub async fn recently_used_assets(
    db: &SurrealDbClient,
    account: &str,
    window: usize,
) -> Result<CooldownSet, AppError> {
    let records = GenerationRecord::recent_for_account(db, account, window).await?;

    let mut set = CooldownSet::default();
    for record in &records {
        for snapshot in &record.assets {
            match &snapshot.asset_id {
                Some(id) => {
                    set.asset_ids.insert(id.clone());
                }
                None => {
                    set.path_digests.insert(digest_path(&snapshot.asset_path));
                }
            }
        }
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use common::storage::types::generation_record::AssetSnapshot;
    use uuid::Uuid;

    fn record(account: &str, age_minutes: i64, snapshots: Vec<AssetSnapshot>) -> GenerationRecord {
        let when = Utc::now() - Duration::minutes(age_minutes);
        GenerationRecord {
            id: Uuid::new_v4().to_string(),
            account: account.to_string(),
            post_number: 1,
            assets: snapshots,
            theme: None,
            degraded: false,
            caption: None,
            hashtags: vec![],
            created_at: when,
            updated_at: when,
        }
    }

    fn snapshot(asset_id: Option<&str>, path: &str) -> AssetSnapshot {
        AssetSnapshot {
            asset_id: asset_id.map(str::to_string),
            asset_path: path.to_string(),
            aesthetic: None,
            colors: vec![],
            season: None,
        }
    }

    #[tokio::test]
    async fn test_window_counts_records_and_keeps_older_assets_eligible() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory surrealdb");

        // Six records, newest first window of 2 should only cover a1 and a2.
        for (age, asset) in [(1, "a1"), (2, "a2"), (3, "a3"), (4, "a4"), (5, "a5"), (6, "a6")] {
            db.store_item(record(
                "alice",
                age,
                vec![snapshot(Some(asset), &format!("https://cdn.example.com/{asset}.jpg"))],
            ))
            .await
            .expect("store");
        }

        let set = recently_used_assets(&db, "alice", 2).await.expect("cooldown");
        assert!(set.asset_ids.contains("a1"));
        assert!(set.asset_ids.contains("a2"));
        assert!(!set.asset_ids.contains("a3"));
    }

    #[tokio::test]
    async fn test_legacy_path_only_snapshots_match_by_digest() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory surrealdb");

        db.store_item(record(
            "alice",
            1,
            vec![snapshot(None, "https://cdn.example.com/legacy.jpg")],
        ))
        .await
        .expect("store");

        let set = recently_used_assets(&db, "alice", 5).await.expect("cooldown");
        assert!(set.asset_ids.is_empty());
        assert!(set.contains_path("https://cdn.example.com/legacy.jpg"));
        assert!(!set.contains_path("https://cdn.example.com/other.jpg"));
    }

    #[tokio::test]
    async fn test_cooldown_is_scoped_per_account() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory surrealdb");

        db.store_item(record(
            "bob",
            1,
            vec![snapshot(Some("b1"), "https://cdn.example.com/b1.jpg")],
        ))
        .await
        .expect("store");

        let set = recently_used_assets(&db, "alice", 5).await.expect("cooldown");
        assert!(set.asset_ids.is_empty());
    }
}
