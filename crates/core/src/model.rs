//! Model profiles: how much context a provider/model pair can take.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Context capacity of a single provider/model pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Provider name (e.g., "openai", "google")
    pub provider: String,

    /// Model name (e.g., "gpt-4o", "gemini-1.5-pro")
    pub model: String,

    /// Total input + output capacity
    pub max_context_tokens: usize,

    /// Tokens withheld for the model's response
    pub reserved_output_tokens: usize,
}

impl ModelProfile {
    /// Create a profile, rejecting a reserve that swallows the whole window.
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        max_context_tokens: usize,
        reserved_output_tokens: usize,
    ) -> Result<Self> {
        let provider = provider.into();
        let model = model.into();
        if reserved_output_tokens >= max_context_tokens {
            return Err(Error::Config {
                message: format!(
                    "{provider}/{model}: reserved_output_tokens ({reserved_output_tokens}) must be less than max_context_tokens ({max_context_tokens})"
                ),
            });
        }
        Ok(Self {
            provider,
            model,
            max_context_tokens,
            reserved_output_tokens,
        })
    }

    /// Tokens available for assembled context.
    pub fn available_budget(&self) -> usize {
        self.max_context_tokens
            .saturating_sub(self.reserved_output_tokens)
    }

    /// `provider/model` label.
    pub fn id(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

impl fmt::Display for ModelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({} tokens, {} reserved)",
            self.provider, self.model, self.max_context_tokens, self.reserved_output_tokens
        )
    }
}

/// Size class of an available budget; selects which assembly phases run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetTier {
    /// Phase 1 only
    Standard,
    /// Phase 1 then supplementary Phase 3
    Large,
    /// Phase 1 then comprehensive Phase 2
    UltraLarge,
}

impl BudgetTier {
    /// Classify an available budget.
    ///
    /// `large_min` is the first Large budget; budgets above `ultra_above`
    /// are UltraLarge.
    pub fn classify(available: usize, large_min: usize, ultra_above: usize) -> Self {
        if available > ultra_above {
            Self::UltraLarge
        } else if available >= large_min {
            Self::Large
        } else {
            Self::Standard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Large => "large",
            Self::UltraLarge => "ultra-large",
        }
    }
}

impl fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_budget_subtracts_reserve() {
        let p = ModelProfile::new("openai", "gpt-4o", 128_000, 8_000).unwrap();
        assert_eq!(p.available_budget(), 120_000);
        assert_eq!(p.id(), "openai/gpt-4o");
    }

    #[test]
    fn reserve_must_be_below_max() {
        let err = ModelProfile::new("x", "y", 1_000, 1_000).unwrap_err();
        assert!(err.to_string().contains("reserved_output_tokens"));
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(BudgetTier::classify(10_000, 50_000, 200_000), BudgetTier::Standard);
        assert_eq!(BudgetTier::classify(49_999, 50_000, 200_000), BudgetTier::Standard);
        assert_eq!(BudgetTier::classify(50_000, 50_000, 200_000), BudgetTier::Large);
        assert_eq!(BudgetTier::classify(200_000, 50_000, 200_000), BudgetTier::Large);
        assert_eq!(BudgetTier::classify(200_001, 50_000, 200_000), BudgetTier::UltraLarge);
    }
}
