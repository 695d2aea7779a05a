//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token by default.
//! This is an approximation, not a tokenizer, so callers treat results as
//! upper-bound-safe estimates rather than exact budgets.

/// Strategy for turning text into an approximate token count.
///
/// Implementations must be pure and should be subadditive
/// (`estimate(a + b) <= estimate(a) + estimate(b)`); the builder relies on
/// that when it sums per-section estimates against a budget.
pub trait TokenEstimator: Send + Sync {
    /// Estimate the token count for a string. Empty text is zero tokens.
    fn estimate(&self, text: &str) -> usize;
}

/// Fixed characters-per-token estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharRatioEstimator {
    chars_per_token: f64,
}

impl CharRatioEstimator {
    pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

    /// Create an estimator with the given divisor.
    ///
    /// Non-finite or non-positive ratios fall back to the default.
    pub fn new(chars_per_token: f64) -> Self {
        let chars_per_token = if chars_per_token.is_finite() && chars_per_token > 0.0 {
            chars_per_token
        } else {
            Self::DEFAULT_CHARS_PER_TOKEN
        };
        Self { chars_per_token }
    }

    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharRatioEstimator {
    /// Rounds up, counting Unicode scalar values rather than bytes.
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count() as f64;
        (chars / self.chars_per_token).ceil() as usize
    }
}
