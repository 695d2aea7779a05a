//! Tuning parameters of the phase algorithm.

use docweaver_config::AssemblyConfig;
use docweaver_core::BudgetTier;
use serde::{Deserialize, Serialize};

/// Phase thresholds and overflow handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblySettings {
    /// Smallest available budget classified as Large.
    pub large_tier_min: usize,
    /// Available budgets above this are Ultra-large.
    pub ultra_tier_above: usize,
    /// Phase 3 only adds fragments while more than this remains.
    pub supplementary_floor: usize,
    /// Phase 3 fragment cap.
    pub supplementary_max_fragments: usize,
    /// Overflow beyond this share of the remaining budget skips instead of truncating.
    pub truncation_tolerance: f64,
    /// Score floor every fragment receives.
    pub baseline_score: f64,
    /// Memoize results per store version.
    pub cache_enabled: bool,
}

impl AssemblySettings {
    pub fn tier(&self, available_budget: usize) -> BudgetTier {
        BudgetTier::classify(available_budget, self.large_tier_min, self.ultra_tier_above)
    }
}

impl Default for AssemblySettings {
    fn default() -> Self {
        Self::from(&AssemblyConfig::default())
    }
}

impl From<&AssemblyConfig> for AssemblySettings {
    fn from(config: &AssemblyConfig) -> Self {
        Self {
            large_tier_min: config.large_tier_min,
            ultra_tier_above: config.ultra_tier_above,
            supplementary_floor: config.supplementary_floor,
            supplementary_max_fragments: config.supplementary_max_fragments,
            truncation_tolerance: config.truncation_tolerance,
            baseline_score: config.baseline_score,
            cache_enabled: config.cache_enabled,
        }
    }
}
