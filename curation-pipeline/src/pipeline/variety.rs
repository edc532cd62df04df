use std::collections::HashSet;

use common::storage::types::media_asset::MediaAsset;

const MIN_DISTINCT_AESTHETICS: usize = 3;
const MIN_DISTINCT_ACCOUNTS: usize = 2;

/// A candidate paired with its strategy score.
#[derive(Debug, Clone)]
pub struct ScoredAsset {
    pub asset: MediaAsset,
    pub score: i32,
}

/// Picks up to `count` assets, best score first, while spreading the
/// selection over aesthetics and source accounts.
///
/// The greedy pass skips an asset whose aesthetic repeats while fewer than
/// three distinct aesthetics are in the selection, and one whose source
/// account repeats while fewer than two distinct accounts are. A second pass
/// fills any remaining slots by score alone, so variety never shrinks the
/// result below what the pool can provide.
pub fn select_varied(mut candidates: Vec<ScoredAsset>, count: usize) -> Vec<ScoredAsset> {
    candidates.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.asset.created_at.cmp(&a.asset.created_at))
    });

    let mut selected: Vec<ScoredAsset> = Vec::with_capacity(count);
    let mut used_ids: HashSet<String> = HashSet::new();
    let mut used_aesthetics: HashSet<String> = HashSet::new();
    let mut used_accounts: HashSet<String> = HashSet::new();

    for candidate in &candidates {
        if selected.len() >= count {
            break;
        }
        if used_ids.contains(&candidate.asset.id) {
            continue;
        }

        if let Some(aesthetic) = normalized(candidate.asset.aesthetic.as_deref()) {
            if used_aesthetics.contains(&aesthetic)
                && used_aesthetics.len() < MIN_DISTINCT_AESTHETICS
            {
                continue;
            }
        }

        let account = candidate.asset.source_account.to_lowercase();
        if used_accounts.contains(&account) && used_accounts.len() < MIN_DISTINCT_ACCOUNTS {
            continue;
        }

        if let Some(aesthetic) = normalized(candidate.asset.aesthetic.as_deref()) {
            used_aesthetics.insert(aesthetic);
        }
        used_accounts.insert(account);
        used_ids.insert(candidate.asset.id.clone());
        selected.push(candidate.clone());
    }

    // Fill pass: score order only, duplicates still barred.
    for candidate in candidates {
        if selected.len() >= count {
            break;
        }
        if used_ids.insert(candidate.asset.id.clone()) {
            selected.push(candidate);
        }
    }

    selected
}

fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn scored(id: &str, score: i32, aesthetic: Option<&str>, account: &str) -> ScoredAsset {
        let now = Utc::now();
        ScoredAsset {
            asset: MediaAsset {
                id: id.to_string(),
                asset_path: format!("https://cdn.example.com/{id}.jpg"),
                source_account: account.to_string(),
                aesthetic: aesthetic.map(str::to_string),
                colors: vec![],
                season: None,
                occasion: None,
                traits: vec![],
                washed: false,
                original_asset_path: None,
                created_at: now,
                updated_at: now,
            },
            score,
        }
    }

    #[test]
    fn test_never_returns_duplicate_ids() {
        let pool = vec![
            scored("a", 50, Some("street"), "acc1"),
            scored("a", 40, Some("street"), "acc1"),
            scored("b", 30, Some("soft"), "acc2"),
        ];
        let picked = select_varied(pool, 3);
        let ids: Vec<&str> = picked.iter().map(|s| s.asset.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"a") && ids.contains(&"b"));
    }

    #[test]
    fn test_spreads_over_aesthetics_before_repeating() {
        let pool = vec![
            scored("s1", 90, Some("street"), "acc1"),
            scored("s2", 85, Some("street"), "acc2"),
            scored("g1", 60, Some("grunge"), "acc3"),
            scored("c1", 55, Some("cottage"), "acc4"),
        ];
        let picked = select_varied(pool, 3);
        let aesthetics: Vec<&str> = picked
            .iter()
            .filter_map(|s| s.asset.aesthetic.as_deref())
            .collect();
        assert_eq!(aesthetics, vec!["street", "grunge", "cottage"]);
    }

    #[test]
    fn test_spreads_over_source_accounts() {
        let pool = vec![
            scored("a1", 90, None, "acc1"),
            scored("a2", 85, None, "acc1"),
            scored("b1", 60, None, "acc2"),
        ];
        let picked = select_varied(pool, 2);
        let accounts: Vec<&str> = picked.iter().map(|s| s.asset.source_account.as_str()).collect();
        assert_eq!(accounts, vec!["acc1", "acc2"]);
    }

    #[test]
    fn test_fill_pass_reaches_count_from_a_monotone_pool() {
        // Everything shares one aesthetic and one account; the greedy pass
        // takes one, the fill pass still returns the full request.
        let pool = vec![
            scored("a", 90, Some("street"), "acc1"),
            scored("b", 80, Some("street"), "acc1"),
            scored("c", 70, Some("street"), "acc1"),
        ];
        let picked = select_varied(pool, 3);
        assert_eq!(picked.len(), 3);
        let ids: Vec<&str> = picked.iter().map(|s| s.asset.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_short_pool_returns_what_exists() {
        let pool = vec![scored("only", 10, None, "acc1")];
        let picked = select_varied(pool, 5);
        assert_eq!(picked.len(), 1);
    }

    #[test]
    fn test_best_score_wins_first_slot() {
        let pool = vec![
            scored("low", 10, Some("a"), "acc1"),
            scored("high", 99, Some("b"), "acc2"),
        ];
        let picked = select_varied(pool, 1);
        assert_eq!(picked[0].asset.id, "high");
    }
}
