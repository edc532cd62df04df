use surrealdb::sql::Datetime as SurrealDatetime;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

/// Discovery confidence, ordered so it can break performance-score ties.
#[derive(
    Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

stored_object!(Theme, "theme", {
    name: String,
    anchor_asset_id: Option<String>,
    aesthetic: Option<String>,
    season: Option<String>,
    occasion: Option<String>,
    colors: Vec<String>,
    performance_score: u32,
    confidence: ConfidenceLevel,
    times_used: u32,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    last_used_at: Option<DateTime<Utc>>
});

impl Theme {
    /// Themes at or above the confidence floor, ranked by performance score
    /// with confidence breaking ties. The floor is part of the query so the
    /// limit counts eligible themes; the tiebreak lives here because it is
    /// an enum ordering, not a string ordering.
    pub async fn ranked_by_performance(
        db: &SurrealDbClient,
        min_confidence: ConfidenceLevel,
        limit: usize,
    ) -> Result<Vec<Theme>, AppError> {
        let allowed: Vec<String> = [
            ConfidenceLevel::Low,
            ConfidenceLevel::Medium,
            ConfidenceLevel::High,
        ]
        .into_iter()
        .filter(|level| *level >= min_confidence)
        .map(|level| level.as_str().to_string())
        .collect();

        let mut themes: Vec<Theme> = db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE confidence INSIDE $allowed
                 ORDER BY performance_score DESC
                 LIMIT $limit",
            )
            .bind(("table", Self::table_name()))
            .bind(("allowed", allowed))
            .bind(("limit", limit.max(1) as i64))
            .await?
            .take(0)?;

        themes.sort_by(|a, b| {
            b.performance_score
                .cmp(&a.performance_score)
                .then(b.confidence.cmp(&a.confidence))
        });

        Ok(themes)
    }

    pub async fn increment_usage(db: &SurrealDbClient, name: &str) -> Result<(), AppError> {
        db.client
            .query(
                "UPDATE type::table($table)
                 SET times_used += 1, last_used_at = $now, updated_at = $now
                 WHERE name = $name",
            )
            .bind(("table", Self::table_name()))
            .bind(("name", name.to_string()))
            .bind(("now", SurrealDatetime::from(Utc::now())))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn theme(name: &str, score: u32, confidence: ConfidenceLevel) -> Theme {
        let now = Utc::now();
        Theme {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            anchor_asset_id: None,
            aesthetic: None,
            season: None,
            occasion: None,
            colors: vec![],
            performance_score: score,
            confidence,
            times_used: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_ranking_orders_by_score_then_confidence() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory surrealdb");

        for item in [
            theme("mid", 70, ConfidenceLevel::High),
            theme("best-low", 90, ConfidenceLevel::Low),
            theme("tied-high", 80, ConfidenceLevel::High),
            theme("tied-medium", 80, ConfidenceLevel::Medium),
        ] {
            db.store_item(item).await.expect("store");
        }

        let ranked = Theme::ranked_by_performance(&db, ConfidenceLevel::Medium, 10)
            .await
            .expect("ranked");

        let names: Vec<&str> = ranked.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["tied-high", "tied-medium", "mid"]);
    }

    #[tokio::test]
    async fn test_confidence_floor_applies_before_the_limit() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory surrealdb");

        // Two low-confidence themes outscore the only eligible one. With a
        // limit of 2 they must not crowd it out of the result.
        for item in [
            theme("loud-low-1", 90, ConfidenceLevel::Low),
            theme("loud-low-2", 85, ConfidenceLevel::Low),
            theme("quiet-high", 80, ConfidenceLevel::High),
        ] {
            db.store_item(item).await.expect("store");
        }

        let ranked = Theme::ranked_by_performance(&db, ConfidenceLevel::Medium, 2)
            .await
            .expect("ranked");

        let names: Vec<&str> = ranked.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["quiet-high"]);
    }

    #[tokio::test]
    async fn test_increment_usage() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory surrealdb");
        db.store_item(theme("rotated", 50, ConfidenceLevel::Medium))
            .await
            .expect("store");

        Theme::increment_usage(&db, "rotated").await.expect("bump");
        Theme::increment_usage(&db, "rotated").await.expect("bump");

        let stored = Theme::ranked_by_performance(&db, ConfidenceLevel::Low, 10)
            .await
            .expect("ranked");
        assert_eq!(stored[0].times_used, 2);
        assert!(stored[0].last_used_at.is_some());
    }
}
