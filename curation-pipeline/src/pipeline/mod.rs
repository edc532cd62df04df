mod config;
pub mod cooldown;
pub mod scoring;
mod services;
pub mod themes;
pub mod variety;

pub use config::{CurationConfig, CurationTuning};
#[allow(clippy::module_name_repetitions)]
pub use services::{CaptionResult, CollaboratorServices, DefaultCollaboratorServices};

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use async_openai::Client;
use chrono::Utc;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            account_strategy::AccountStrategy,
            generation_record::{AssetSnapshot, GenerationRecord},
            media_asset::{CandidateQuery, MediaAsset},
            theme::{ConfidenceLevel, Theme},
            usage_event::UsageEvent,
            wash_checkpoint::WashCheckpoint,
        },
    },
    utils::config::AppConfig,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use self::{
    cooldown::recently_used_assets,
    scoring::score_asset,
    themes::{select_theme_for_post, themed_asset_score, ANCHOR_SCORE},
    variety::{select_varied, ScoredAsset},
};

/// Mutable state shared across every account processed by one trigger.
/// Keeping it per run, passed explicitly, means nothing survives between
/// runs and two concurrent runs cannot see each other's picks.
#[derive(Debug, Default)]
pub struct RunContext {
    pub used_assets: HashSet<String>,
    pub used_anchors: HashSet<String>,
}

#[derive(Debug)]
pub struct GenerationOutcome {
    pub account: String,
    pub records: Vec<GenerationRecord>,
    pub requested_posts: u32,
    pub degraded_posts: u32,
    pub failures: Vec<String>,
}

impl GenerationOutcome {
    pub fn is_total_failure(&self) -> bool {
        self.records.is_empty() && !self.failures.is_empty()
    }

    pub fn metrics(&self) -> serde_json::Value {
        serde_json::json!({
            "account": self.account,
            "requested_posts": self.requested_posts,
            "generated_posts": self.records.len(),
            "degraded_posts": self.degraded_posts,
            "failed_posts": self.failures.len(),
        })
    }
}

#[derive(Debug)]
pub struct WashOutcome {
    pub washed: u64,
    pub remaining: usize,
    /// False when the wall-clock budget ran out before the backlog did; the
    /// caller re-enqueues a continuation carrying `next_cursor`.
    pub finished: bool,
    pub next_cursor: Option<String>,
}

#[allow(clippy::module_name_repetitions)]
pub struct CurationPipeline {
    db: Arc<SurrealDbClient>,
    pipeline_config: CurationConfig,
    services: Arc<dyn CollaboratorServices>,
}

impl CurationPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<Client<async_openai::config::OpenAIConfig>>,
        config: &AppConfig,
    ) -> Self {
        let services = DefaultCollaboratorServices::new(openai_client, config.clone());
        Self::with_services(
            db,
            CurationConfig::from_app_config(config),
            Arc::new(services),
        )
    }

    pub fn with_services(
        db: Arc<SurrealDbClient>,
        pipeline_config: CurationConfig,
        services: Arc<dyn CollaboratorServices>,
    ) -> Self {
        Self {
            db,
            pipeline_config,
            services,
        }
    }

    /// Runs selection, captioning and persistence for one account. Posts are
    /// independent: a failed post is recorded in the outcome and the run
    /// moves on, so one thin aesthetic cannot void a whole batch.
    #[tracing::instrument(skip_all, fields(account = %account))]
    pub async fn generate(
        &self,
        account: &str,
        post_count: Option<u32>,
        image_count: Option<u32>,
        ensure_variety: bool,
        ctx: &mut RunContext,
    ) -> Result<GenerationOutcome, AppError> {
        if post_count == Some(0) || image_count == Some(0) {
            return Err(AppError::Validation(
                "post_count and image_count must be at least 1".to_string(),
            ));
        }

        let strategy = AccountStrategy::find_by_account(&self.db, account)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no strategy for account {account}")))?;

        if !strategy.is_active {
            return Err(AppError::Validation(format!(
                "account {account} is inactive"
            )));
        }

        let posts = post_count.unwrap_or(strategy.posts_per_run).max(1);
        let images = image_count.unwrap_or(strategy.images_per_post).max(1) as usize;

        let cooldown = recently_used_assets(
            &self.db,
            account,
            self.pipeline_config.tuning.cooldown_window,
        )
        .await?;
        let ranked_themes = Theme::ranked_by_performance(
            &self.db,
            ConfidenceLevel::Low,
            self.pipeline_config.tuning.theme_rank_limit,
        )
        .await?;

        let mut outcome = GenerationOutcome {
            account: account.to_string(),
            records: Vec::with_capacity(posts as usize),
            requested_posts: posts,
            degraded_posts: 0,
            failures: Vec::new(),
        };

        for post_number in 1..=posts {
            let theme =
                select_theme_for_post(&ranked_themes, post_number, &ctx.used_anchors, ensure_variety);

            match self
                .generate_post(&strategy, theme.as_ref(), post_number, images, &cooldown, ctx)
                .await
            {
                Ok((record, degraded)) => {
                    if degraded {
                        outcome.degraded_posts += 1;
                    }
                    if let Some(theme) = &theme {
                        Theme::increment_usage(&self.db, &theme.name).await?;
                        // An anchor only counts as spent when it actually
                        // made it into the post.
                        if let Some(anchor) = &theme.anchor_asset_id {
                            let anchor_included = record.assets.iter().any(|snapshot| {
                                snapshot.asset_id.as_deref() == Some(anchor.as_str())
                            });
                            if anchor_included {
                                ctx.used_anchors.insert(anchor.clone());
                            }
                        }
                    }
                    outcome.records.push(record);
                }
                Err(err) => {
                    warn!(post_number, error = %err, "post generation failed");
                    outcome.failures.push(err.to_string());
                }
            }
        }

        info!(
            generated = outcome.records.len(),
            degraded = outcome.degraded_posts,
            failed = outcome.failures.len(),
            "generation run finished"
        );

        Ok(outcome)
    }

    async fn generate_post(
        &self,
        strategy: &AccountStrategy,
        theme: Option<&Theme>,
        post_number: u32,
        images: usize,
        cooldown: &cooldown::CooldownSet,
        ctx: &mut RunContext,
    ) -> Result<(GenerationRecord, bool), AppError> {
        // The anchor is fetched by id rather than hoped for in the pool, so
        // it leads the post even when it is older than every pooled asset.
        let anchor = self.fetch_available_anchor(theme, cooldown, ctx).await?;

        let supplementary = images.saturating_sub(usize::from(anchor.is_some()));
        let (candidates, degraded) = self
            .candidates_with_degrade(strategy, supplementary, cooldown, ctx, anchor.as_ref())
            .await?;

        let now = Utc::now();
        let mut scored: Vec<ScoredAsset> = candidates
            .into_iter()
            .map(|asset| {
                let score = match theme {
                    Some(theme) => themed_asset_score(&asset, theme, strategy),
                    None => score_asset(&asset, strategy, now),
                };
                ScoredAsset { asset, score }
            })
            .collect();
        if let Some(anchor_asset) = anchor {
            scored.push(ScoredAsset {
                asset: anchor_asset,
                score: ANCHOR_SCORE,
            });
        }

        let selected = select_varied(scored, images);
        if selected.len() < images {
            return Err(AppError::InsufficientCandidates {
                needed: images,
                available: selected.len(),
            });
        }

        let snapshots: Vec<AssetSnapshot> = selected
            .iter()
            .map(|scored| AssetSnapshot {
                asset_id: Some(scored.asset.id.clone()),
                asset_path: scored.asset.asset_path.clone(),
                aesthetic: scored.asset.aesthetic.clone(),
                colors: scored.asset.colors.clone(),
                season: scored.asset.season.clone(),
            })
            .collect();

        // A caption failure downgrades the post, it does not discard the
        // selected assets.
        let caption = match self
            .services
            .generate_caption(strategy, theme, &snapshots)
            .await
        {
            Ok(result) => Some(result),
            Err(err) => {
                warn!(error = %err, "caption generation failed, storing post without one");
                None
            }
        };

        let record = GenerationRecord {
            id: Uuid::new_v4().to_string(),
            account: strategy.account.clone(),
            post_number,
            assets: snapshots,
            theme: theme.map(|t| t.name.clone()),
            degraded,
            caption: caption.as_ref().map(|c| c.caption.clone()),
            hashtags: caption.map(|c| c.hashtags).unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .db
            .store_item(record)
            .await?
            .ok_or_else(|| AppError::InternalError("generation record insert returned no row".into()))?;

        let asset_ids: Vec<String> = selected.iter().map(|s| s.asset.id.clone()).collect();
        UsageEvent::record_batch(&self.db, &strategy.account, &stored.id, &asset_ids).await?;
        for id in &asset_ids {
            ctx.used_assets.insert(id.clone());
        }

        if let Err(err) = self.services.deliver_post(&stored).await {
            warn!(record_id = %stored.id, error = %err, "delivery webhook failed");
        }

        Ok((stored, degraded))
    }

    /// The theme's anchor asset, looked up by id. An anchor already spent
    /// this run, sitting in cooldown, picked as a regular asset earlier, or
    /// missing from the store yields `None` and the post is assembled
    /// without one.
    async fn fetch_available_anchor(
        &self,
        theme: Option<&Theme>,
        cooldown: &cooldown::CooldownSet,
        ctx: &RunContext,
    ) -> Result<Option<MediaAsset>, AppError> {
        let Some(anchor_id) = theme.and_then(|theme| theme.anchor_asset_id.as_deref()) else {
            return Ok(None);
        };
        if ctx.used_anchors.contains(anchor_id)
            || ctx.used_assets.contains(anchor_id)
            || cooldown.asset_ids.contains(anchor_id)
        {
            return Ok(None);
        }

        let Some(asset) = self.db.get_item::<MediaAsset>(anchor_id).await? else {
            warn!(anchor_id, "theme anchor asset not found, composing without it");
            return Ok(None);
        };
        if cooldown.contains_path(&asset.asset_path) {
            return Ok(None);
        }
        Ok(Some(asset))
    }

    /// Fetches candidates with the strategy filters, and when the pool comes
    /// up short retries without them. The cooldown and the run-level
    /// exclusions always hold; only taste is negotiable.
    async fn candidates_with_degrade(
        &self,
        strategy: &AccountStrategy,
        needed: usize,
        cooldown: &cooldown::CooldownSet,
        ctx: &RunContext,
        anchor: Option<&MediaAsset>,
    ) -> Result<(Vec<MediaAsset>, bool), AppError> {
        let mut exclude_ids = cooldown.exclude_ids();
        exclude_ids.extend(ctx.used_assets.iter().cloned());
        if let Some(anchor) = anchor {
            exclude_ids.push(anchor.id.clone());
        }

        let filtered_query = CandidateQuery {
            exclude_ids: exclude_ids.clone(),
            aesthetics: strategy.aesthetic_focus.clone(),
            colors: strategy.color_palette.clone(),
            limit: self.pipeline_config.tuning.candidate_pool_size,
        };
        let filtered = self.fetch_eligible(&filtered_query, cooldown).await?;
        if filtered.len() >= needed {
            return Ok((filtered, false));
        }

        debug!(
            found = filtered.len(),
            needed, "strategy filters too narrow, retrying without them"
        );

        let relaxed_query = CandidateQuery {
            exclude_ids,
            aesthetics: Vec::new(),
            colors: Vec::new(),
            limit: self.pipeline_config.tuning.candidate_pool_size,
        };
        let relaxed = self.fetch_eligible(&relaxed_query, cooldown).await?;
        if relaxed.len() >= needed {
            return Ok((relaxed, true));
        }

        Err(AppError::InsufficientCandidates {
            needed,
            available: relaxed.len(),
        })
    }

    async fn fetch_eligible(
        &self,
        query: &CandidateQuery,
        cooldown: &cooldown::CooldownSet,
    ) -> Result<Vec<MediaAsset>, AppError> {
        let fetched = MediaAsset::query_candidates(&self.db, query).await?;
        Ok(fetched
            .into_iter()
            .filter(|asset| !cooldown.contains_path(&asset.asset_path))
            .collect())
    }

    /// Washes unwashed assets in id order until the backlog or the budget is
    /// exhausted. Progress is checkpointed per asset, so a crash resumes
    /// from the last washed asset rather than the start of the backlog.
    #[tracing::instrument(skip_all, fields(page_size, budget_secs = budget.as_secs()))]
    pub async fn wash_batch(
        &self,
        start_cursor: Option<String>,
        page_size: usize,
        budget: Duration,
    ) -> Result<WashOutcome, AppError> {
        let checkpoint = WashCheckpoint::ensure_initialized(&self.db).await?;
        let mut cursor = start_cursor
            .filter(|c| !c.is_empty())
            .or_else(|| (!checkpoint.cursor.is_empty()).then(|| checkpoint.cursor.clone()));

        let deadline = Instant::now() + budget;
        let mut washed: u64 = 0;

        loop {
            let page = MediaAsset::unwashed_page(&self.db, cursor.as_deref(), page_size).await?;
            if page.is_empty() {
                WashCheckpoint::reset_cursor(&self.db).await?;
                break;
            }

            for asset in page {
                if Instant::now() >= deadline {
                    let remaining = MediaAsset::count_unwashed(&self.db).await?;
                    info!(washed, remaining, "wash budget exhausted, yielding");
                    return Ok(WashOutcome {
                        washed,
                        remaining,
                        finished: false,
                        next_cursor: cursor,
                    });
                }

                let washed_path = self.services.wash_asset(&asset).await?;
                MediaAsset::mark_washed(&self.db, &asset.id, &washed_path).await?;
                WashCheckpoint::advance(&self.db, &asset.id).await?;
                cursor = Some(asset.id.clone());
                washed += 1;
            }
        }

        let remaining = MediaAsset::count_unwashed(&self.db).await?;
        info!(washed, remaining, "wash backlog drained");
        Ok(WashOutcome {
            washed,
            remaining,
            finished: true,
            next_cursor: None,
        })
    }
}
