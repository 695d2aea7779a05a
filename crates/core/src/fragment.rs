//! Context fragments: the named units of text eligible for a prompt.
//!
//! Fragments live in one of three pools:
//! - **Core**: the single mandatory project description
//! - **Enriched**: curated knowledge registered ahead of time
//! - **Injected**: files discovered and scored at runtime

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which pool a fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentCategory {
    Core,
    Enriched,
    Injected,
}

impl FragmentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Enriched => "enriched",
            Self::Injected => "injected",
        }
    }
}

impl fmt::Display for FragmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a fragment.
///
/// Well-known knowledge areas get their own variant; anything else goes
/// through [`FragmentKey::Custom`]. Parsing maps known kebab-case names
/// back to their variant so `"risk-analysis"` and `RiskAnalysis` are the
/// same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FragmentKey {
    Core,
    TechStack,
    RiskAnalysis,
    Stakeholders,
    Requirements,
    Scope,
    Timeline,
    Budget,
    Quality,
    Architecture,
    Compliance,
    Communication,
    Custom(String),
}

impl FragmentKey {
    const KNOWN: [FragmentKey; 12] = [
        FragmentKey::Core,
        FragmentKey::TechStack,
        FragmentKey::RiskAnalysis,
        FragmentKey::Stakeholders,
        FragmentKey::Requirements,
        FragmentKey::Scope,
        FragmentKey::Timeline,
        FragmentKey::Budget,
        FragmentKey::Quality,
        FragmentKey::Architecture,
        FragmentKey::Compliance,
        FragmentKey::Communication,
    ];

    /// Parse a key, case-insensitively matching the well-known names.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase().replace('_', "-");
        Self::KNOWN
            .iter()
            .find(|k| k.as_str() == normalized)
            .cloned()
            .unwrap_or_else(|| Self::Custom(raw.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Core => "core",
            Self::TechStack => "tech-stack",
            Self::RiskAnalysis => "risk-analysis",
            Self::Stakeholders => "stakeholders",
            Self::Requirements => "requirements",
            Self::Scope => "scope",
            Self::Timeline => "timeline",
            Self::Budget => "budget",
            Self::Quality => "quality",
            Self::Architecture => "architecture",
            Self::Compliance => "compliance",
            Self::Communication => "communication",
            Self::Custom(name) => name,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    /// Lowercased word tokens of the key, used as implicit scoring terms.
    pub fn terms(&self) -> Vec<String> {
        split_terms(self.as_str())
    }

    /// Human-readable section title, e.g. `tech-stack` → `Tech Stack`.
    pub fn title(&self) -> String {
        match self {
            Self::Custom(name) => name.clone(),
            _ => self
                .as_str()
                .split('-')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<String>>()
                .join(" "),
        }
    }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for FragmentKey {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for FragmentKey {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl Serialize for FragmentKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FragmentKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Split text into lowercase alphanumeric word tokens, each reduced to
/// its singular form so `stakeholders` and `stakeholder` compare equal.
pub fn split_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| singular(&t.to_lowercase()))
        .collect()
}

/// Strip a regular English plural ending. `-ss`, `-us` and `-is` words
/// (`process`, `status`, `analysis`) are left alone.
fn singular(term: &str) -> String {
    if term.len() > 4 {
        if let Some(stem) = term.strip_suffix("ies") {
            return format!("{stem}y");
        }
    }
    if term.len() > 3
        && term.ends_with('s')
        && !["ss", "us", "is"].iter().any(|end| term.ends_with(end))
    {
        return term[..term.len() - 1].to_string();
    }
    term.to_string()
}

/// A named unit of text eligible for inclusion in an LLM prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFragment {
    /// Unique key within the fragment's category
    pub key: FragmentKey,

    /// Raw text
    pub content: String,

    /// Estimated tokens of `content`, cached when the fragment is stored
    #[serde(default)]
    pub token_count: usize,

    /// Which pool this fragment lives in
    pub category: FragmentCategory,

    /// Originating file (injected fragments only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,

    /// Static weight added to the relevance score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_hint: Option<f64>,

    /// Declared keywords matched against document keyword sets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Insertion order within the store, assigned on first insert
    #[serde(default)]
    pub sequence: u64,
}

impl ContextFragment {
    fn new(key: FragmentKey, content: impl Into<String>, category: FragmentCategory) -> Self {
        Self {
            key,
            content: content.into(),
            token_count: 0,
            category,
            source_path: None,
            relevance_hint: None,
            tags: Vec::new(),
            sequence: 0,
        }
    }

    /// The mandatory project description.
    pub fn core(content: impl Into<String>) -> Self {
        Self::new(FragmentKey::Core, content, FragmentCategory::Core)
    }

    /// A curated knowledge fragment.
    pub fn enriched(key: impl Into<FragmentKey>, content: impl Into<String>) -> Self {
        Self::new(key.into(), content, FragmentCategory::Enriched)
    }

    /// A fragment discovered from the file system.
    pub fn injected(
        key: impl Into<FragmentKey>,
        content: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        let mut fragment = Self::new(key.into(), content, FragmentCategory::Injected);
        fragment.source_path = Some(source_path.into());
        fragment
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(|t| t.into().to_lowercase()).collect();
        self
    }

    pub fn with_relevance_hint(mut self, hint: f64) -> Self {
        self.relevance_hint = Some(hint);
        self
    }

    /// All lowercase terms the scorer may match: key tokens, tags, and
    /// the category name.
    pub fn terms(&self) -> Vec<String> {
        let mut terms = self.key.terms();
        for tag in &self.tags {
            terms.extend(split_terms(tag));
        }
        terms.push(self.category.as_str().to_string());
        terms.sort();
        terms.dedup();
        terms
    }
}
