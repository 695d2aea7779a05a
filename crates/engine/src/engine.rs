//! The session-level facade over store, scorer, builder, cache, and
//! discovery.
//!
//! An engine is owned by one session. Mutations take `&mut self`; `build`
//! and `analyze` take `&self` and warm the internal cache, which is keyed
//! by store version so any mutation invalidates it.

use crate::builder::{AssemblyResult, ContextBuilder};
use crate::cache::AssemblyCache;
use crate::discovery::{DiscoveryOptions, DiscoveryReport, FileDiscovery};
use crate::report::{UtilizationReport, UtilizationReporter};
use crate::scorer::RelevanceScorer;
use crate::settings::AssemblySettings;
use crate::store::ContextStore;
use crate::templates::{BuiltinTemplates, ConfiguredTemplates};
use docweaver_config::{AppConfig, ContextSourcesConfig};
use docweaver_core::{
    CharRatioEstimator, ContextError, ContextFragment, Error, FragmentCategory, FragmentKey,
    GenerationError, GenerationRequest, LlmClient, ModelProfile, Result, TemplateStore,
    TokenEstimator,
};
use docweaver_providers::ModelCapabilityRegistry;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Snapshot of engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineMetrics {
    pub model: String,
    pub max_tokens: usize,
    pub available_budget: usize,
    pub core_context_tokens: usize,
    pub enriched_context_count: usize,
    pub injected_context_count: usize,
    pub cache_size: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub store_version: u64,
}

/// A generated document with the context it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedDocument {
    pub document_type: String,
    pub client: String,
    pub prompt: String,
    pub content: String,
    pub assembly: AssemblyResult,
}

pub struct ContextAssemblyEngine {
    profile: ModelProfile,
    registry: ModelCapabilityRegistry,
    store: ContextStore,
    scorer: RelevanceScorer,
    settings: AssemblySettings,
    discovery: DiscoveryOptions,
    cache: AssemblyCache,
}

impl ContextAssemblyEngine {
    /// Engine with built-in templates, default settings, and the
    /// character-ratio estimator.
    pub fn new(profile: ModelProfile) -> Self {
        let settings = AssemblySettings::default();
        Self {
            profile,
            registry: ModelCapabilityRegistry::with_defaults(),
            store: ContextStore::new(Arc::new(CharRatioEstimator::default())),
            scorer: RelevanceScorer::new(Arc::new(BuiltinTemplates), settings.baseline_score),
            settings,
            discovery: DiscoveryOptions::default(),
            cache: AssemblyCache::new(),
        }
    }

    /// Engine wired from configuration: model, registry overrides,
    /// templates, tuning, and any configured context source files.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let registry = ModelCapabilityRegistry::from_overrides(&config.models);
        let profile = registry.lookup(&config.provider, &config.model);
        let settings = AssemblySettings::from(&config.assembly);
        let templates: Arc<dyn TemplateStore> =
            Arc::new(ConfiguredTemplates::new(&config.templates));

        let mut engine = Self {
            profile,
            registry,
            store: ContextStore::new(Arc::new(CharRatioEstimator::new(
                config.assembly.chars_per_token,
            ))),
            scorer: RelevanceScorer::new(templates, settings.baseline_score),
            settings,
            discovery: DiscoveryOptions::from(&config.discovery),
            cache: AssemblyCache::new(),
        };
        let loaded = engine.load_sources(&config.context)?;
        info!(
            model = %engine.profile,
            sources = loaded,
            "Context assembly engine initialized"
        );
        Ok(engine)
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.store.set_estimator(estimator);
        self.cache.clear();
        self
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateStore>) -> Self {
        self.scorer = RelevanceScorer::new(templates, self.settings.baseline_score);
        self.cache.clear();
        self
    }

    pub fn with_settings(mut self, settings: AssemblySettings) -> Self {
        self.scorer =
            RelevanceScorer::new(Arc::clone(self.scorer.templates()), settings.baseline_score);
        self.settings = settings;
        self.cache.clear();
        self
    }

    pub fn with_registry(mut self, registry: ModelCapabilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_discovery(mut self, options: DiscoveryOptions) -> Self {
        self.discovery = options;
        self
    }

    // ── Store mutations ───────────────────────────────────────────────

    /// Load the core file and enriched files named in configuration.
    /// Returns the number of fragments loaded.
    pub fn load_sources(&mut self, sources: &ContextSourcesConfig) -> Result<usize> {
        let mut loaded = 0;
        if let Some(path) = &sources.core_path {
            self.set_core_context(read_source(path)?);
            loaded += 1;
        }
        for entry in &sources.enriched {
            let content = read_source(&entry.path)?;
            let mut fragment = ContextFragment::enriched(entry.key.as_str(), content)
                .with_tags(entry.tags.iter().cloned());
            if let Some(hint) = entry.relevance_hint {
                fragment = fragment.with_relevance_hint(hint);
            }
            self.add_fragment(fragment);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Set or replace the project description.
    pub fn set_core_context(&mut self, content: impl Into<String>) {
        self.store.insert(ContextFragment::core(content));
    }

    /// Add or overwrite an enriched fragment. Returns `true` on overwrite.
    pub fn add_enriched(
        &mut self,
        key: impl Into<FragmentKey>,
        content: impl Into<String>,
    ) -> bool {
        self.store.insert(ContextFragment::enriched(key, content))
    }

    /// Add a fully specified fragment of any category.
    pub fn add_fragment(&mut self, fragment: ContextFragment) -> bool {
        self.store.insert(fragment)
    }

    pub fn remove_enriched(&mut self, key: impl Into<FragmentKey>) -> bool {
        self.store.remove(FragmentCategory::Enriched, &key.into())
    }

    pub fn clear_enriched(&mut self) -> usize {
        self.store.clear(FragmentCategory::Enriched)
    }

    pub fn clear_injected(&mut self) -> usize {
        self.store.clear(FragmentCategory::Injected)
    }

    /// Drop every fragment, core included, and empty the cache.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.store.clear_all();
        self.cache.clear();
        removed
    }

    /// Switch the active model through the capability registry.
    pub fn set_model(&mut self, provider: &str, model: &str) -> &ModelProfile {
        let profile = self.registry.lookup(provider, model);
        self.set_profile(profile);
        &self.profile
    }

    /// Switch to an explicit profile.
    pub fn set_profile(&mut self, profile: ModelProfile) {
        if profile != self.profile {
            debug!(from = %self.profile, to = %profile, "Model changed");
            self.profile = profile;
            self.cache.clear();
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────

    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub fn settings(&self) -> &AssemblySettings {
        &self.settings
    }

    pub fn registry(&self) -> &ModelCapabilityRegistry {
        &self.registry
    }

    pub fn discovery_options(&self) -> &DiscoveryOptions {
        &self.discovery
    }

    // ── Assembly ──────────────────────────────────────────────────────

    /// Assemble context for a document type, served from cache when the
    /// store has not changed since the last build.
    pub fn build(&self, document_type: &str) -> std::result::Result<AssemblyResult, ContextError> {
        let version = self.store.version();
        if self.settings.cache_enabled {
            if let Some(hit) = self.cache.get(document_type, version) {
                debug!(document_type, version, "Assembly cache hit");
                return Ok(hit);
            }
        }

        let result = ContextBuilder::new(&self.store, &self.scorer, &self.settings, &self.profile)
            .build(document_type)?;
        if self.settings.cache_enabled {
            self.cache.insert(version, result.clone());
        }
        Ok(result)
    }

    /// Build (or reuse) context and report on its utilization.
    pub fn analyze(
        &self,
        document_type: &str,
    ) -> std::result::Result<UtilizationReport, ContextError> {
        let result = self.build(document_type)?;
        Ok(UtilizationReporter::new(&self.scorer, &self.settings).report(&result, &self.store))
    }

    // ── Discovery ─────────────────────────────────────────────────────

    /// Discover project files under `root` and inject the best
    /// `max_count` scoring above `min_score`. Returns the number
    /// injected; zero is a normal outcome.
    pub fn inject_high_relevance_fragments(
        &mut self,
        root: &Path,
        min_score: f64,
        max_count: usize,
    ) -> usize {
        let options = self.discovery.clone().with_limits(min_score, max_count);
        self.discover(root, &options).injected
    }

    /// Discover with explicit options and return the full report.
    pub fn discover(&mut self, root: &Path, options: &DiscoveryOptions) -> DiscoveryReport {
        let (mut report, fragments) = FileDiscovery::new(options.clone()).scan(root);
        report.injected = fragments.len();
        for fragment in fragments {
            self.store.insert(fragment);
        }
        report
    }

    pub fn metrics(&self) -> EngineMetrics {
        EngineMetrics {
            model: self.profile.id(),
            max_tokens: self.profile.max_context_tokens,
            available_budget: self.profile.available_budget(),
            core_context_tokens: self.store.core().map(|f| f.token_count).unwrap_or(0),
            enriched_context_count: self.store.enriched_count(),
            injected_context_count: self.store.injected_count(),
            cache_size: self.cache.len(),
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
            store_version: self.store.version(),
        }
    }

    // ── Generation ────────────────────────────────────────────────────

    /// Prompt for a document type: the template's, or a generic one.
    pub fn prompt_for(&self, document_type: &str) -> String {
        self.scorer
            .templates()
            .prompt(document_type)
            .unwrap_or_else(|| {
                format!(
                    "Using the project context above, write a complete {} document for this project.",
                    document_type.replace(['-', '_'], " ")
                )
            })
    }

    /// Assemble context and hand it to an LLM client.
    pub async fn generate(
        &self,
        document_type: &str,
        client: &dyn LlmClient,
    ) -> Result<GeneratedDocument> {
        let assembly = self.build(document_type)?;
        let prompt = self.prompt_for(document_type);
        let request = GenerationRequest {
            profile: self.profile.clone(),
            context: assembly.text.clone(),
            prompt: prompt.clone(),
        };

        info!(
            document_type,
            client = client.name(),
            tokens = assembly.total_tokens,
            "Generating document"
        );
        let content = client.generate(request).await?;
        if content.trim().is_empty() {
            return Err(GenerationError::EmptyResponse.into());
        }

        Ok(GeneratedDocument {
            document_type: document_type.to_string(),
            client: client.name().to_string(),
            prompt,
            content,
            assembly,
        })
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::Source {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::AssemblyPhase;
    use async_trait::async_trait;
    use docweaver_config::EnrichedSourceConfig;
    use docweaver_core::BudgetTier;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn words(tokens: usize) -> String {
        "word ".repeat(tokens * 4 / 5).trim_end().to_string()
    }

    fn engine(available: usize) -> ContextAssemblyEngine {
        ContextAssemblyEngine::new(
            ModelProfile::new("test", "mock", available + 1_000, 1_000).unwrap(),
        )
    }

    /// Records requests and replies with a fixed answer.
    struct RecordingClient {
        reply: String,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl RecordingClient {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for RecordingClient {
        fn name(&self) -> &str {
            "recording"
        }

        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> std::result::Result<String, GenerationError> {
            self.requests.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn build_without_core_fails() {
        let e = engine(10_000);
        assert_eq!(e.build("risk-analysis").unwrap_err(), ContextError::MissingCoreContext);
    }

    #[test]
    fn cache_hit_until_mutation() {
        let mut e = engine(10_000);
        e.set_core_context(words(100));
        let first = e.build("risk-analysis").unwrap();
        let second = e.build("risk-analysis").unwrap();
        assert_eq!(first, second);
        assert_eq!(e.metrics().cache_hits, 1);
        assert_eq!(e.metrics().cache_size, 1);

        e.add_enriched("risk-analysis", words(50));
        let third = e.build("risk-analysis").unwrap();
        assert_eq!(third.included_fragment_keys.len(), 2);
        assert_eq!(e.metrics().cache_hits, 1);
    }

    #[test]
    fn cache_can_be_disabled() {
        let settings = AssemblySettings {
            cache_enabled: false,
            ..Default::default()
        };
        let mut e = engine(10_000).with_settings(settings);
        e.set_core_context("project");
        e.build("scope-statement").unwrap();
        e.build("scope-statement").unwrap();
        assert_eq!(e.metrics().cache_size, 0);
    }

    #[test]
    fn set_model_changes_tier() {
        let mut e = engine(10_000);
        e.set_core_context(words(100));
        assert_eq!(e.build("risk-analysis").unwrap().tier, BudgetTier::Standard);

        e.set_model("google", "gemini-1.5-pro");
        let result = e.build("risk-analysis").unwrap();
        assert_eq!(result.tier, BudgetTier::UltraLarge);
        assert_eq!(result.phase_reached, AssemblyPhase::Comprehensive);
        assert_eq!(result.model, "google/gemini-1.5-pro");
    }

    #[test]
    fn unknown_model_uses_default_profile() {
        let mut e = engine(10_000);
        let profile = e.set_model("acme", "mystery-1").clone();
        assert_eq!(profile.max_context_tokens, 8_192);
    }

    #[test]
    fn remove_and_clear() {
        let mut e = engine(10_000);
        e.set_core_context("project");
        e.add_enriched("scope", "in scope");
        e.add_enriched("budget", "money");
        assert!(e.remove_enriched("scope"));
        assert_eq!(e.clear_enriched(), 1);
        e.add_fragment(ContextFragment::injected("a.md", "x", "/r/a.md"));
        assert_eq!(e.clear_injected(), 1);
        assert_eq!(e.clear_all(), 1);
        assert!(e.build("scope-statement").is_err());
    }

    #[test]
    fn metrics_reflect_store() {
        let mut e = engine(10_000);
        e.set_core_context("a".repeat(400));
        e.add_enriched("scope", "x");
        let m = e.metrics();
        assert_eq!(m.core_context_tokens, 100);
        assert_eq!(m.enriched_context_count, 1);
        assert_eq!(m.injected_context_count, 0);
        assert_eq!(m.max_tokens, 11_000);
        assert_eq!(m.available_budget, 10_000);
        assert_eq!(m.store_version, 2);
    }

    #[test]
    fn injection_is_idempotent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("README.md"),
            "Project overview: scope, stakeholders, risk register and budget for the rollout.",
        )
        .unwrap();

        let mut e = engine(10_000);
        assert_eq!(e.inject_high_relevance_fragments(dir.path(), 30.0, 5), 1);
        let before: Vec<String> = e.store().injected().iter().map(|f| f.content.clone()).collect();
        assert_eq!(e.inject_high_relevance_fragments(dir.path(), 30.0, 5), 1);
        let after: Vec<String> = e.store().injected().iter().map(|f| f.content.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(e.metrics().injected_context_count, 1);
    }

    #[test]
    fn empty_tree_injects_nothing() {
        let dir = TempDir::new().unwrap();
        let mut e = engine(10_000);
        assert_eq!(e.inject_high_relevance_fragments(dir.path(), 30.0, 5), 0);
    }

    #[test]
    fn from_config_loads_sources() {
        let dir = TempDir::new().unwrap();
        let core = dir.path().join("project.md");
        let risks = dir.path().join("risks.md");
        std::fs::write(&core, "Build a warehouse management system.").unwrap();
        std::fs::write(&risks, "Vendor lock-in.").unwrap();

        let mut config = AppConfig::default();
        config.provider = "anthropic".into();
        config.model = "claude-sonnet-4".into();
        config.context.core_path = Some(core);
        config.context.enriched.push(EnrichedSourceConfig {
            key: "vendor-risks".into(),
            path: risks,
            tags: vec!["risk".into()],
            relevance_hint: Some(0.5),
        });

        let e = ContextAssemblyEngine::from_config(&config).unwrap();
        assert_eq!(e.profile().max_context_tokens, 200_000);
        let result = e.build("risk-analysis").unwrap();
        assert_eq!(result.included_fragment_keys.len(), 2);
        assert!(result.text.contains("Vendor lock-in."));
    }

    #[test]
    fn missing_source_file_is_reported() {
        let mut config = AppConfig::default();
        config.context.core_path = Some("/nonexistent/docweaver/project.md".into());
        let err = ContextAssemblyEngine::from_config(&config).err().unwrap();
        assert!(matches!(err, Error::Source { .. }));
    }

    #[test]
    fn prompt_falls_back_for_unknown_documents() {
        let e = engine(10_000);
        assert!(e.prompt_for("risk-analysis").contains("risk analysis"));
        assert!(e.prompt_for("vendor-assessment").contains("vendor assessment document"));
    }

    #[tokio::test]
    async fn generate_sends_context_and_prompt() {
        let mut e = engine(10_000);
        e.set_core_context("Migrate billing to the new platform.");
        let client = RecordingClient::new("# Risk Analysis\n...");

        let doc = e.generate("risk-analysis", &client).await.unwrap();
        assert_eq!(doc.client, "recording");
        assert!(doc.content.starts_with("# Risk Analysis"));

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].context.contains("Migrate billing"));
        assert!(requests[0].prompt.contains("risk analysis"));
    }

    #[tokio::test]
    async fn generate_rejects_empty_response() {
        let mut e = engine(10_000);
        e.set_core_context("project");
        let client = RecordingClient::new("   ");
        let err = e.generate("scope-statement", &client).await.unwrap_err();
        assert!(matches!(err, Error::Generation(GenerationError::EmptyResponse)));
    }

    #[tokio::test]
    async fn generate_without_core_fails() {
        let e = engine(10_000);
        let client = RecordingClient::new("unused");
        let err = e.generate("scope-statement", &client).await.unwrap_err();
        assert!(matches!(err, Error::Context(ContextError::MissingCoreContext)));
        assert!(client.requests.lock().unwrap().is_empty());
    }
}
