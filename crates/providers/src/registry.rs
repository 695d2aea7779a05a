//! Built-in context window table for common LLM models.
//!
//! Each entry maps `provider/model` to a [`ModelProfile`]. Output reserves
//! scale with the window so an ultra-large model is never filled to 100%.
//! Custom entries can be added at runtime from TOML config.

use docweaver_config::ModelOverride;
use docweaver_core::ModelProfile;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Window of the fallback profile used for unknown models.
const DEFAULT_WINDOW: usize = 8_192;

/// Output tokens withheld for a model with the given context window.
pub fn reserve_for_window(max_context_tokens: usize) -> usize {
    let reserve = match max_context_tokens {
        0..=16_384 => 1_000,
        16_385..=65_536 => 4_000,
        65_537..=262_144 => 8_000,
        _ => 10_000,
    };
    // Tiny custom windows still need room for input
    reserve.min(max_context_tokens / 2)
}

/// Static lookup of provider/model pairs to their context capacity.
pub struct ModelCapabilityRegistry {
    profiles: HashMap<(String, String), ModelProfile>,
}

impl ModelCapabilityRegistry {
    /// Create a registry with the built-in model table.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        // ── OpenAI ─────────────────────────────────────────────────
        registry.insert("openai", "gpt-4", 8_192);
        registry.insert("openai", "gpt-3.5-turbo", 16_385);
        registry.insert("openai", "gpt-4-32k", 32_768);
        registry.insert("openai", "gpt-4-turbo", 128_000);
        registry.insert("openai", "gpt-4o", 128_000);
        registry.insert("openai", "gpt-4o-mini", 128_000);
        registry.insert("openai", "o1", 200_000);
        registry.insert("openai", "o3-mini", 200_000);
        registry.insert("openai", "gpt-4.1", 1_047_576);

        // ── Azure OpenAI ───────────────────────────────────────────
        registry.insert("azure-openai", "gpt-4", 8_192);
        registry.insert("azure-openai", "gpt-35-turbo", 16_385);
        registry.insert("azure-openai", "gpt-4o", 128_000);

        // ── Anthropic ──────────────────────────────────────────────
        registry.insert("anthropic", "claude-3-haiku", 200_000);
        registry.insert("anthropic", "claude-3-5-sonnet", 200_000);
        registry.insert("anthropic", "claude-sonnet-4", 200_000);
        registry.insert("anthropic", "claude-opus-4", 200_000);

        // ── Google ─────────────────────────────────────────────────
        registry.insert("google", "gemini-pro", 32_760);
        registry.insert("google", "gemini-1.5-flash", 1_048_576);
        registry.insert("google", "gemini-1.5-pro", 2_097_152);
        registry.insert("google", "gemini-2.0-flash", 1_048_576);
        registry.insert("google", "gemini-2.5-pro", 1_048_576);

        // ── Mistral ────────────────────────────────────────────────
        registry.insert("mistral", "mistral-small", 32_000);
        registry.insert("mistral", "mistral-large", 128_000);

        // ── DeepSeek ───────────────────────────────────────────────
        registry.insert("deepseek", "deepseek-chat", 64_000);

        // ── Ollama (local) ─────────────────────────────────────────
        registry.insert("ollama", "llama3", 8_192);
        registry.insert("ollama", "mistral", 32_768);
        registry.insert("ollama", "llama3.1", 128_000);

        registry
    }

    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    /// Built-in table plus config overrides.
    pub fn from_overrides(overrides: &[ModelOverride]) -> Self {
        let mut registry = Self::with_defaults();
        for o in overrides {
            let reserved = o
                .reserved_output_tokens
                .unwrap_or_else(|| reserve_for_window(o.max_context_tokens));
            match ModelProfile::new(&o.provider, &o.model, o.max_context_tokens, reserved) {
                Ok(profile) => registry.register(profile),
                Err(e) => warn!(error = %e, "Ignoring invalid model override"),
            }
        }
        registry
    }

    fn insert(&mut self, provider: &str, model: &str, max_context_tokens: usize) {
        self.register(ModelProfile {
            provider: provider.into(),
            model: model.into(),
            max_context_tokens,
            reserved_output_tokens: reserve_for_window(max_context_tokens),
        });
    }

    /// Add or replace a profile.
    pub fn register(&mut self, profile: ModelProfile) {
        let key = (profile.provider.to_lowercase(), profile.model.to_lowercase());
        self.profiles.insert(key, profile);
    }

    /// The conservative profile used when a model is unknown.
    pub fn default_profile(provider: &str, model: &str) -> ModelProfile {
        ModelProfile {
            provider: provider.into(),
            model: model.into(),
            max_context_tokens: DEFAULT_WINDOW,
            reserved_output_tokens: reserve_for_window(DEFAULT_WINDOW),
        }
    }

    /// Look up a profile. Never fails.
    ///
    /// Matching order:
    /// 1. Exact `(provider, model)`, case-insensitive
    /// 2. Longest registered model name of the same provider that prefixes
    ///    the requested one (`gpt-4o-2024-08-06` → `gpt-4o`)
    /// 3. Exact model name under any provider
    /// 4. The conservative default profile
    pub fn lookup(&self, provider: &str, model: &str) -> ModelProfile {
        let provider_lc = provider.to_lowercase();
        let model_lc = model.to_lowercase();

        // 1. Exact match
        if let Some(p) = self.profiles.get(&(provider_lc.clone(), model_lc.clone())) {
            return p.clone();
        }

        // 2. Prefix match within the provider
        let mut best: Option<&ModelProfile> = None;
        for ((p, m), profile) in &self.profiles {
            if *p == provider_lc
                && model_lc.starts_with(m.as_str())
                && best.is_none_or(|b| m.len() > b.model.len())
            {
                best = Some(profile);
            }
        }
        if let Some(profile) = best {
            debug!(provider, model, matched = %profile.model, "Model matched by prefix");
            return ModelProfile {
                model: model.into(),
                ..profile.clone()
            };
        }

        // 3. Same model served by another provider (sorted for determinism)
        let mut same_model: Vec<&ModelProfile> = self
            .profiles
            .iter()
            .filter(|((_, m), _)| *m == model_lc)
            .map(|(_, profile)| profile)
            .collect();
        same_model.sort_by(|a, b| a.provider.cmp(&b.provider));
        if let Some(profile) = same_model.first() {
            return ModelProfile {
                provider: provider.into(),
                ..(*profile).clone()
            };
        }

        warn!(
            provider,
            model,
            window = DEFAULT_WINDOW,
            "Unknown model, using conservative default profile"
        );
        Self::default_profile(provider, model)
    }

    /// Whether an exact entry exists.
    pub fn contains(&self, provider: &str, model: &str) -> bool {
        self.profiles
            .contains_key(&(provider.to_lowercase(), model.to_lowercase()))
    }

    /// All profiles, sorted by provider then window size.
    pub fn profiles(&self) -> Vec<ModelProfile> {
        let mut all: Vec<ModelProfile> = self.profiles.values().cloned().collect();
        all.sort_by(|a, b| {
            a.provider
                .cmp(&b.provider)
                .then(a.max_context_tokens.cmp(&b.max_context_tokens))
                .then(a.model.cmp(&b.model))
        });
        all
    }

    /// Number of profiles in the registry.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for ModelCapabilityRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
