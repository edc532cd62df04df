use std::collections::HashSet;

use common::storage::types::{
    account_strategy::AccountStrategy, media_asset::MediaAsset, theme::Theme,
};

/// Score pinned to a theme's anchor asset so it always leads the post.
pub const ANCHOR_SCORE: i32 = 1_000;

const COMPAT_BASE: i32 = 100;
const COMPAT_AESTHETIC: i32 = 30;
const COMPAT_SEASON: i32 = 20;
const COMPAT_OCCASION: i32 = 15;
const COMPAT_ACCOUNT_FOCUS: i32 = 25;

/// How many of the ranked themes take part in the rotation.
const ROTATION_SIZE: usize = 5;

/// Picks the theme for post `post_number` (1-based) out of the ranked list.
///
/// With `ensure_variety` off, every post gets the top-ranked theme. On, the
/// rotation walks the top themes so consecutive posts in one run do not all
/// land on the single best performer. Within the rotation window a theme
/// whose anchor has not been used this run wins over one whose anchor has,
/// which keeps a run from pinning the same hero asset twice.
pub fn select_theme_for_post(
    ranked: &[Theme],
    post_number: u32,
    used_anchors: &HashSet<String>,
    ensure_variety: bool,
) -> Option<Theme> {
    if ranked.is_empty() {
        return None;
    }
    if !ensure_variety {
        return ranked.first().cloned();
    }

    let window = ranked.len().min(ROTATION_SIZE);
    let start = (post_number.saturating_sub(1) as usize) % window;

    for offset in 0..window {
        let candidate = &ranked[(start + offset) % window];
        let anchor_free = candidate
            .anchor_asset_id
            .as_ref()
            .is_none_or(|anchor| !used_anchors.contains(anchor));
        if anchor_free {
            return Some(candidate.clone());
        }
    }

    // Every anchor in the window is taken; fall back to the rotation slot.
    Some(ranked[start].clone())
}

/// How well an asset fits a themed post. The anchor asset dominates every
/// other candidate; the rest are ranked by tag overlap with the theme plus a
/// bonus for matching the account's own focus.
pub fn themed_asset_score(asset: &MediaAsset, theme: &Theme, strategy: &AccountStrategy) -> i32 {
    if theme
        .anchor_asset_id
        .as_ref()
        .is_some_and(|anchor| anchor == &asset.id)
    {
        return ANCHOR_SCORE;
    }

    let mut score = COMPAT_BASE;

    if tags_overlap(asset.aesthetic.as_deref(), theme.aesthetic.as_deref()) {
        score += COMPAT_AESTHETIC;
    }
    if tags_overlap(asset.season.as_deref(), theme.season.as_deref()) {
        score += COMPAT_SEASON;
    }
    if tags_overlap(asset.occasion.as_deref(), theme.occasion.as_deref()) {
        score += COMPAT_OCCASION;
    }

    if let Some(aesthetic) = asset.aesthetic.as_deref() {
        let aesthetic = aesthetic.to_lowercase();
        if strategy
            .aesthetic_focus
            .iter()
            .filter(|focus| !focus.trim().is_empty())
            .any(|focus| aesthetic.contains(&focus.to_lowercase()))
        {
            score += COMPAT_ACCOUNT_FOCUS;
        }
    }

    score
}

fn tags_overlap(asset_tag: Option<&str>, theme_tag: Option<&str>) -> bool {
    match (asset_tag, theme_tag) {
        (Some(asset_tag), Some(theme_tag)) => {
            let asset_tag = asset_tag.to_lowercase();
            let theme_tag = theme_tag.to_lowercase();
            asset_tag.contains(&theme_tag) || theme_tag.contains(&asset_tag)
        }
        _ => false,
    }
}
