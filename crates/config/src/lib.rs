//! Configuration loading, validation, and management for DocWeaver.
//!
//! Loads configuration from `~/.docweaver/config.toml` (or the path in
//! `DOCWEAVER_CONFIG`) with environment variable overrides for the active
//! model. Validates all settings at load time.

use docweaver_core::ModelProfile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.docweaver/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Active LLM provider
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Active model
    #[serde(default = "default_model")]
    pub model: String,

    /// Phase thresholds and assembly tuning
    #[serde(default)]
    pub assembly: AssemblyConfig,

    /// File-tree discovery limits
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Extra or overriding model capability entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelOverride>,

    /// Per-document-type keyword weights and prompts
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, TemplateConfig>,

    /// Context sources loaded at session start
    #[serde(default)]
    pub context: ContextSourcesConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Smallest available budget classified as Large
    #[serde(default = "default_large_tier_min")]
    pub large_tier_min: usize,

    /// Available budgets above this are Ultra-large
    #[serde(default = "default_ultra_tier_above")]
    pub ultra_tier_above: usize,

    /// Phase 3 runs only while more than this many tokens remain
    #[serde(default = "default_supplementary_floor")]
    pub supplementary_floor: usize,

    /// Maximum fragments Phase 3 may add
    #[serde(default = "default_supplementary_max_fragments")]
    pub supplementary_max_fragments: usize,

    /// Overflow above this share of the remaining budget skips a fragment
    /// instead of truncating it
    #[serde(default = "default_truncation_tolerance")]
    pub truncation_tolerance: f64,

    /// Divisor of the character-based token estimator
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f64,

    /// Score every fragment gets before keyword matches
    #[serde(default = "default_baseline_score")]
    pub baseline_score: f64,

    /// Memoize assembled contexts per store version
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

fn default_large_tier_min() -> usize {
    50_000
}
fn default_ultra_tier_above() -> usize {
    200_000
}
fn default_supplementary_floor() -> usize {
    5_000
}
fn default_supplementary_max_fragments() -> usize {
    3
}
fn default_truncation_tolerance() -> f64 {
    0.2
}
fn default_chars_per_token() -> f64 {
    4.0
}
fn default_baseline_score() -> f64 {
    0.1
}
fn default_true() -> bool {
    true
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            large_tier_min: default_large_tier_min(),
            ultra_tier_above: default_ultra_tier_above(),
            supplementary_floor: default_supplementary_floor(),
            supplementary_max_fragments: default_supplementary_max_fragments(),
            truncation_tolerance: default_truncation_tolerance(),
            chars_per_token: default_chars_per_token(),
            baseline_score: default_baseline_score(),
            cache_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Files must score above this project-relevance value (0-100) to be injected
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    /// Maximum fragments injected per discovery run
    #[serde(default = "default_max_count")]
    pub max_count: usize,

    /// Maximum directory depth below the root
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Bytes read per file; longer files are cut at this size
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Wall-clock cutoff for the whole walk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Directory names skipped in addition to the built-in list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_dirs: Vec<String>,
}

fn default_min_score() -> f64 {
    30.0
}
fn default_max_count() -> usize {
    10
}
fn default_max_depth() -> usize {
    4
}
fn default_max_file_bytes() -> u64 {
    256 * 1024
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            max_count: default_max_count(),
            max_depth: default_max_depth(),
            max_file_bytes: default_max_file_bytes(),
            timeout_secs: Some(30),
            excluded_dirs: vec![],
        }
    }
}

/// A model capability entry added on top of the built-in table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOverride {
    pub provider: String,
    pub model: String,
    pub max_context_tokens: usize,

    /// Defaults to the registry's reserve rule for this window size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_output_tokens: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Keyword → weight
    #[serde(default)]
    pub keywords: BTreeMap<String, f64>,

    /// Instruction sent with the assembled context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSourcesConfig {
    /// File holding the core project description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_path: Option<PathBuf>,

    /// Enriched fragments loaded from files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enriched: Vec<EnrichedSourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedSourceConfig {
    pub key: String,
    pub path: PathBuf,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_hint: Option<f64>,
}

impl AppConfig {
    /// Load configuration from the default location with env overrides.
    ///
    /// Search order:
    /// 1. `DOCWEAVER_CONFIG` env var (explicit path)
    /// 2. `~/.docweaver/config.toml`
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("DOCWEAVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `DOCWEAVER_PROVIDER` / `DOCWEAVER_MODEL` on top of file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("DOCWEAVER_PROVIDER") {
            self.provider = provider;
        }
        if let Ok(model) = std::env::var("DOCWEAVER_MODEL") {
            self.model = model;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".docweaver")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.assembly;
        if a.large_tier_min > a.ultra_tier_above {
            return Err(ConfigError::ValidationError(
                "assembly.large_tier_min must not exceed assembly.ultra_tier_above".into(),
            ));
        }

        if !(0.0..=1.0).contains(&a.truncation_tolerance) {
            return Err(ConfigError::ValidationError(
                "assembly.truncation_tolerance must be between 0.0 and 1.0".into(),
            ));
        }

        if !(3.0..=5.0).contains(&a.chars_per_token) {
            return Err(ConfigError::ValidationError(
                "assembly.chars_per_token must be between 3.0 and 5.0".into(),
            ));
        }

        if !(a.baseline_score.is_finite() && a.baseline_score > 0.0) {
            return Err(ConfigError::ValidationError(
                "assembly.baseline_score must be a finite number > 0".into(),
            ));
        }

        if !(0.0..=100.0).contains(&self.discovery.min_score) {
            return Err(ConfigError::ValidationError(
                "discovery.min_score must be between 0 and 100".into(),
            ));
        }

        for m in &self.models {
            if let Some(reserved) = m.reserved_output_tokens {
                ModelProfile::new(&m.provider, &m.model, m.max_context_tokens, reserved)
                    .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
            }
            if m.max_context_tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "models: {}/{} has max_context_tokens = 0",
                    m.provider, m.model
                )));
            }
        }

        for (doc_type, template) in &self.templates {
            if template.keywords.values().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "templates.{doc_type}: keyword weights must be non-negative numbers"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            assembly: AssemblyConfig::default(),
            discovery: DiscoveryConfig::default(),
            models: vec![],
            templates: BTreeMap::new(),
            context: ContextSourcesConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
