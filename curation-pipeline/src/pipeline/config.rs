use common::utils::config::AppConfig;

#[derive(Debug, Clone)]
pub struct CurationTuning {
    /// How many candidate assets are fetched per post before scoring.
    pub candidate_pool_size: usize,
    /// Recent generation records per account whose assets sit in cooldown.
    pub cooldown_window: usize,
    /// How many ranked themes the rotation may draw from.
    pub theme_rank_limit: usize,
}

impl Default for CurationTuning {
    fn default() -> Self {
        Self {
            candidate_pool_size: 60,
            cooldown_window: 6,
            theme_rank_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurationConfig {
    pub tuning: CurationTuning,
}

impl CurationConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: CurationTuning {
                cooldown_window: config.cooldown_window,
                ..CurationTuning::default()
            },
        }
    }
}
