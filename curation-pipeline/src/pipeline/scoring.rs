use chrono::{DateTime, Datelike, Utc};
use common::storage::types::{account_strategy::AccountStrategy, media_asset::MediaAsset};

/// Score granted to any valid asset before strategy bonuses.
pub const BASE_SCORE: i32 = 10;
const AESTHETIC_MATCH_BONUS: i32 = 20;
const AESTHETIC_MISSING_BONUS: i32 = 5;
const COLOR_MATCH_BONUS: i32 = 15;
const COLOR_MISSING_BONUS: i32 = 4;
const SEASON_MATCH_BONUS: i32 = 10;
const SEASON_MISSING_BONUS: i32 = 3;
const TRAIT_MATCH_BONUS: i32 = 5;
const FRESH_BONUS: i32 = 5;
const RECENT_BONUS: i32 = 2;
const FRESH_DAYS: i64 = 30;
const RECENT_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }
}

/// Calendar season for a 1-based month: Dec-Feb winter, Mar-May spring,
/// Jun-Aug summer, Sep-Nov autumn.
pub fn season_for_month(month: u32) -> Season {
    match month {
        3..=5 => Season::Spring,
        6..=8 => Season::Summer,
        9..=11 => Season::Autumn,
        _ => Season::Winter,
    }
}

/// Fitness of one asset for one account strategy. Deterministic and pure;
/// the clock is passed in so a whole selection run scores against the same
/// instant.
///
/// Missing analysis never disqualifies an asset: early-pipeline assets keep
/// a reduced score instead of being thrown out.
pub fn score_asset(asset: &MediaAsset, strategy: &AccountStrategy, now: DateTime<Utc>) -> i32 {
    let mut score = BASE_SCORE;

    let focus: Vec<String> = strategy
        .aesthetic_focus
        .iter()
        .filter(|value| !value.trim().is_empty())
        .map(|value| value.to_lowercase())
        .collect();

    if !focus.is_empty() {
        score += match &asset.aesthetic {
            Some(tag) => {
                let tag = tag.to_lowercase();
                if focus.iter().any(|wanted| tag.contains(wanted.as_str())) {
                    AESTHETIC_MATCH_BONUS
                } else {
                    0
                }
            }
            None => AESTHETIC_MISSING_BONUS,
        };
    }

    let palette: Vec<String> = strategy
        .color_palette
        .iter()
        .filter(|value| !value.trim().is_empty())
        .map(|value| value.to_lowercase())
        .collect();

    if !palette.is_empty() {
        score += if asset.colors.is_empty() {
            COLOR_MISSING_BONUS
        } else if asset.colors.iter().any(|color| {
            let color = color.to_lowercase();
            palette.iter().any(|wanted| color.contains(wanted.as_str()))
        }) {
            COLOR_MATCH_BONUS
        } else {
            0
        };
    }

    let current = season_for_month(now.month());
    score += match &asset.season {
        Some(season) if season.to_lowercase().contains(current.as_str()) => SEASON_MATCH_BONUS,
        Some(_) => 0,
        None => SEASON_MISSING_BONUS,
    };

    if !focus.is_empty()
        && asset.traits.iter().any(|trait_tag| {
            let trait_tag = trait_tag.to_lowercase();
            focus.iter().any(|wanted| trait_tag.contains(wanted.as_str()))
        })
    {
        score += TRAIT_MATCH_BONUS;
    }

    let age_days = (now - asset.created_at).num_days();
    if age_days < FRESH_DAYS {
        score += FRESH_BONUS;
    } else if age_days < RECENT_DAYS {
        score += RECENT_BONUS;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn strategy(focus: &[&str], palette: &[&str]) -> AccountStrategy {
        let now = Utc::now();
        AccountStrategy {
            id: "s1".to_string(),
            account: "alice".to_string(),
            target_audience: "18-24".to_string(),
            aesthetic_focus: focus.iter().map(|f| (*f).to_string()).collect(),
            color_palette: palette.iter().map(|c| (*c).to_string()).collect(),
            performance_goal: None,
            is_active: true,
            autogen_enabled: true,
            posts_per_run: 3,
            images_per_post: 5,
            created_at: now,
            updated_at: now,
        }
    }

    fn asset(aesthetic: Option<&str>, colors: &[&str], season: Option<&str>) -> MediaAsset {
        let now = Utc::now();
        MediaAsset {
            id: "a1".to_string(),
            asset_path: "https://cdn.example.com/a1.jpg".to_string(),
            source_account: "source".to_string(),
            aesthetic: aesthetic.map(str::to_string),
            colors: colors.iter().map(|c| (*c).to_string()).collect(),
            season: season.map(str::to_string),
            occasion: None,
            traits: vec![],
            washed: false,
            original_asset_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_seasons_follow_the_calendar() {
        assert_eq!(season_for_month(12), Season::Winter);
        assert_eq!(season_for_month(1), Season::Winter);
        assert_eq!(season_for_month(2), Season::Winter);
        assert_eq!(season_for_month(3), Season::Spring);
        assert_eq!(season_for_month(5), Season::Spring);
        assert_eq!(season_for_month(6), Season::Summer);
        assert_eq!(season_for_month(8), Season::Summer);
        assert_eq!(season_for_month(9), Season::Autumn);
        assert_eq!(season_for_month(11), Season::Autumn);
    }

    #[test]
    fn test_matching_asset_outscores_plain_asset() {
        let strategy = strategy(&["streetwear"], &["black"]);
        let now = Utc.with_ymd_and_hms(2025, 7, 10, 12, 0, 0).unwrap();

        let matching = asset(Some("dark streetwear"), &["black", "grey"], Some("summer"));
        let plain = asset(Some("cottagecore"), &["pastel"], Some("winter"));

        let matching_score = score_asset(&matching, &strategy, now);
        let plain_score = score_asset(&plain, &strategy, now);
        assert!(matching_score > plain_score);
        // base + aesthetic + color + season + freshness
        assert_eq!(matching_score, 10 + 20 + 15 + 10 + 5);
    }

    #[test]
    fn test_missing_analysis_degrades_but_never_disqualifies() {
        let strategy = strategy(&["streetwear"], &["black"]);
        let now = Utc::now();

        let bare = asset(None, &[], None);
        let score = score_asset(&bare, &strategy, now);
        // base + missing-aesthetic + missing-color + missing-season + freshness
        assert_eq!(score, 10 + 5 + 4 + 3 + 5);
        assert!(score > 0);
    }

    #[test]
    fn test_trait_tags_match_aesthetic_focus() {
        let strategy = strategy(&["streetwear"], &[]);
        let now = Utc::now();

        let mut tagged = asset(Some("minimal"), &[], None);
        tagged.traits = vec!["urban streetwear vibes".to_string()];
        let untagged = asset(Some("minimal"), &[], None);

        assert_eq!(
            score_asset(&tagged, &strategy, now) - score_asset(&untagged, &strategy, now),
            5
        );
    }

    #[test]
    fn test_freshness_tiers() {
        let strategy = strategy(&[], &[]);
        let now = Utc::now();

        let mut fresh = asset(None, &[], None);
        fresh.created_at = now - Duration::days(5);
        let mut recent = asset(None, &[], None);
        recent.created_at = now - Duration::days(60);
        let mut old = asset(None, &[], None);
        old.created_at = now - Duration::days(200);

        let fresh_score = score_asset(&fresh, &strategy, now);
        let recent_score = score_asset(&recent, &strategy, now);
        let old_score = score_asset(&old, &strategy, now);

        assert_eq!(fresh_score - old_score, 5);
        assert_eq!(recent_score - old_score, 2);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let strategy = strategy(&["streetwear"], &["black"]);
        let now = Utc::now();
        let item = asset(Some("streetwear"), &["black"], Some("summer"));

        assert_eq!(
            score_asset(&item, &strategy, now),
            score_asset(&item, &strategy, now)
        );
    }
}
