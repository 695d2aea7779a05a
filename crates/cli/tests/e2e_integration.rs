//! End-to-end integration tests for the DocWeaver context assembly engine.
//!
//! These tests exercise the full pipeline from configuration and context
//! sources to assembled context, utilization reports, and generation
//! through a scripted LLM client.

use std::path::Path;
use std::sync::Arc;

use docweaver_config::AppConfig;
use docweaver_core::{
    BudgetTier, ContextError, ContextFragment, FragmentKey, GenerationError, GenerationRequest,
    LlmClient, ModelProfile, TokenEstimator,
};
use docweaver_engine::{
    AssemblyPhase, BuiltinTemplates, ContextAssemblyEngine, OverflowKind, UtilizationLevel,
};
use docweaver_providers::ModelCapabilityRegistry;
use tempfile::TempDir;

// ── Mock LLM Client ──────────────────────────────────────────────────────

/// A mock client that returns scripted responses in sequence.
struct ScriptedClient {
    responses: std::sync::Mutex<Vec<Result<String, GenerationError>>>,
    requests: std::sync::Mutex<Vec<GenerationRequest>>,
}

impl ScriptedClient {
    fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn text(response: &str) -> Self {
        Self::new(vec![Ok(response.to_string())])
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let mut requests = self.requests.lock().unwrap();
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("ScriptedClient exhausted after {} calls", requests.len());
        }
        requests.push(request);
        responses.remove(0)
    }
}

/// One token per whitespace-separated word.
struct WordEstimator;

impl TokenEstimator for WordEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Text of exactly `tokens` tokens under the default 4-chars-per-token estimate.
fn text(tokens: usize) -> String {
    "abc ".repeat(tokens).trim_end().to_string()
}

fn engine_with_budget(available: usize) -> ContextAssemblyEngine {
    let profile = ModelProfile::new("test", "mock", available + 1_000, 1_000).unwrap();
    ContextAssemblyEngine::new(profile)
}

/// Core plus a mix of matching and non-matching fragments for risk-analysis.
fn populated(available: usize) -> ContextAssemblyEngine {
    let mut engine = engine_with_budget(available);
    engine.set_core_context(text(1_000));
    engine.add_fragment(ContextFragment::enriched("risk-register", text(1_000)));
    engine.add_fragment(ContextFragment::enriched("security-review", text(1_000)));
    for i in 0..6 {
        engine.add_enriched(format!("background-{i}"), text(1_000));
    }
    engine.add_fragment(ContextFragment::injected(
        "docs/overview.md",
        text(800),
        "/repo/docs/overview.md",
    ));
    engine
}

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

// ── Example scenario ─────────────────────────────────────────────────────

#[test]
fn e2e_risk_analysis_scenario() {
    // Core of 2,000 tokens, five 1,000-token enriched fragments (three
    // matching risk-analysis, two not), 6,000 tokens available.
    let mut engine = engine_with_budget(6_000);
    engine.set_core_context(text(2_000));
    engine.add_enriched("risk-register", text(1_000));
    engine.add_enriched("tech-stack", text(1_000));
    engine.add_enriched("compliance", text(1_000));
    engine.add_enriched("timeline", text(1_000));
    engine.add_enriched("security-review", text(1_000));

    let result = engine.build("risk-analysis").unwrap();

    assert_eq!(result.tier, BudgetTier::Standard);
    assert_eq!(result.phase_reached, AssemblyPhase::Core);
    let keys: Vec<&str> = result.included_fragment_keys.iter().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["core", "risk-register", "compliance", "security-review"]);
    assert!(!result.included_fragment_keys.contains(&FragmentKey::TechStack));
    assert!(!result.included_fragment_keys.contains(&FragmentKey::Timeline));

    // 5,000 tokens of fragment content plus section headings
    let content_tokens: usize = result
        .included_fragment_keys
        .iter()
        .map(|k| {
            let store = engine.store();
            if *k == FragmentKey::Core {
                store.core().unwrap().token_count
            } else {
                store.get(docweaver_core::FragmentCategory::Enriched, k).unwrap().token_count
            }
        })
        .sum();
    assert_eq!(content_tokens, 5_000);
    assert!(result.total_tokens >= 5_000 && result.total_tokens < 5_050);
    assert!(result.warnings.is_empty());
}

// ── Testable properties ──────────────────────────────────────────────────

#[test]
fn e2e_p1_determinism() {
    for available in [10_000, 100_000, 500_000] {
        let engine = populated(available);
        let a = engine.build("risk-analysis").unwrap();
        // Fresh engine with the same state, so the cache is not involved
        let b = populated(available).build("risk-analysis").unwrap();
        assert_eq!(a.text, b.text);
        assert_eq!(a.included_fragment_keys, b.included_fragment_keys);
    }
}

#[test]
fn e2e_p2_budget_safety_across_models_and_documents() {
    let mut engine = engine_with_budget(1_000);
    engine.set_core_context(text(3_000));
    let tags = ["risk", "scope", "budget", "architecture", "stakeholders", "quality"];
    for i in 0..30 {
        engine.add_fragment(
            ContextFragment::enriched(format!("fragment-{i}"), text(200 + i * 450))
                .with_tags([tags[i % tags.len()]]),
        );
    }

    let registry = ModelCapabilityRegistry::with_defaults();
    let mut profiles = registry.profiles();
    profiles.push(ModelCapabilityRegistry::default_profile("acme", "tiny"));
    for profile in profiles {
        let available = profile.available_budget();
        engine.set_profile(profile.clone());
        for doc in BuiltinTemplates::document_types() {
            let result = engine.build(doc).unwrap();
            assert!(
                result.total_tokens <= available,
                "{} {doc}: {} > {available}",
                profile.id(),
                result.total_tokens
            );
        }
    }
}

#[test]
fn e2e_p3_tier_selection() {
    let expected = [
        (10_000, BudgetTier::Standard, AssemblyPhase::Core),
        (100_000, BudgetTier::Large, AssemblyPhase::Supplementary),
        (500_000, BudgetTier::UltraLarge, AssemblyPhase::Comprehensive),
    ];
    for (available, tier, phase) in expected {
        let result = populated(available).build("risk-analysis").unwrap();
        assert_eq!(result.tier, tier, "{available}");
        assert_eq!(result.phase_reached, phase, "{available}");
        assert_eq!(result.phase_reached.number(), match available {
            10_000 => 1,
            100_000 => 3,
            _ => 2,
        });
    }

    // Phase 3 adds at most three fragments; Phase 2 takes everything
    let large = populated(100_000).build("risk-analysis").unwrap();
    assert_eq!(large.included_fragment_keys.len(), 1 + 2 + 3);
    let ultra = populated(500_000).build("risk-analysis").unwrap();
    assert_eq!(ultra.included_fragment_keys.len(), 1 + 2 + 6 + 1);
}

#[test]
fn e2e_p4_core_always_included() {
    for available in [500, 5_000, 60_000, 300_000] {
        let mut engine = populated(available);
        engine.set_core_context(text(4_000));
        let result = engine.build("risk-analysis").unwrap();
        assert_eq!(result.included_fragment_keys[0], FragmentKey::Core);
        assert!(result.total_tokens <= available);
    }
}

#[test]
fn e2e_p5_no_core_fails() {
    let engine = engine_with_budget(10_000);
    assert_eq!(
        engine.build("risk-analysis").unwrap_err(),
        ContextError::MissingCoreContext
    );

    let mut engine = populated(10_000);
    engine.clear_all();
    assert!(engine.analyze("risk-analysis").is_err());
}

#[test]
fn e2e_p6_injection_idempotence() {
    let dir = TempDir::new().unwrap();
    let plan = "Project plan: scope, stakeholders, risk register, budget and milestones.";
    write(dir.path(), "README.md", plan);
    write(
        dir.path(),
        "docs/architecture.md",
        "Architecture overview with security and compliance requirements.",
    );
    write(dir.path(), "src/main.rs", "fn main() { println!(\"not project documentation\"); }");
    write(dir.path(), "node_modules/pkg/README.md", plan);

    let mut engine = engine_with_budget(10_000);
    let first = engine.inject_high_relevance_fragments(dir.path(), 30.0, 10);
    let snapshot = |e: &ContextAssemblyEngine| -> Vec<(String, String)> {
        e.store()
            .injected()
            .iter()
            .map(|f| (f.key.to_string(), f.content.clone()))
            .collect()
    };
    let before = snapshot(&engine);

    let second = engine.inject_high_relevance_fragments(dir.path(), 30.0, 10);
    let after = snapshot(&engine);

    assert_eq!(first, 2);
    assert_eq!(second, 2);
    assert_eq!(before, after);
    assert_eq!(engine.metrics().injected_context_count, 2);
    let keys: Vec<&str> = before.iter().map(|(k, _)| k.as_str()).collect();
    assert!(keys.contains(&"README.md"));
    assert!(keys.contains(&"docs/architecture.md"));
}

#[test]
fn e2e_p7_utilization_monotonicity() {
    let mut engine = engine_with_budget(8_000);
    engine.set_core_context(text(1_000));
    let mut last = engine.analyze("risk-analysis").unwrap().utilization_percentage;

    for i in 0..12 {
        engine.add_fragment(
            ContextFragment::enriched(format!("risk-note-{i}"), text(900)).with_tags(["risk"]),
        );
        let report = engine.analyze("risk-analysis").unwrap();
        assert!(
            report.utilization_percentage >= last,
            "utilization dropped after fragment {i}: {} < {last}",
            report.utilization_percentage
        );
        last = report.utilization_percentage;
    }
    assert!(last > 90.0);
}

#[test]
fn e2e_p7_stronger_match_does_not_displace_budget() {
    let mut engine = engine_with_budget(1_000);
    engine.set_core_context(text(100));
    engine.add_fragment(ContextFragment::enriched("notes", text(880)).with_tags(["risk"]));
    let before = engine.analyze("risk-analysis").unwrap();

    // Ranks above notes and leaves too little for it to fit whole
    engine.add_fragment(
        ContextFragment::enriched("audit", text(200)).with_tags(["risk", "compliance"]),
    );
    let after = engine.analyze("risk-analysis").unwrap();
    let result = engine.build("risk-analysis").unwrap();

    assert!(after.utilization_percentage >= before.utilization_percentage);
    let keys: Vec<&str> = result.included_fragment_keys.iter().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["core", "audit", "notes"]);
    assert_eq!(result.truncated_count(), 1);
    assert_eq!(result.skipped_count(), 0);
}

// ── Overflow handling ────────────────────────────────────────────────────

#[test]
fn e2e_overflow_truncates_then_skips() {
    let mut engine = engine_with_budget(3_000);
    engine.set_core_context(text(1_500));
    // Section needs ~1,705 against ~1,495 left: within 20%, truncated
    engine.add_enriched("risk-register", text(1_700));
    // Nothing meaningful left: skipped
    engine.add_enriched("security-review", text(500));

    let result = engine.build("risk-analysis").unwrap();
    assert!(result.total_tokens <= 3_000);
    assert_eq!(result.truncated_count(), 1);
    assert_eq!(result.skipped_count(), 1);
    assert!(result.text.contains("[... truncated to fit context budget]"));

    let report = engine.analyze("risk-analysis").unwrap();
    assert_eq!(report.level, UtilizationLevel::NearCapacity);
    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings.iter().any(|w| w.kind == OverflowKind::Skipped));
    assert_eq!(report.potential_contexts.len(), 1);
}

// ── Configuration to engine ──────────────────────────────────────────────

#[test]
fn e2e_config_drives_engine() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "project.md", "Replace the legacy payroll system by Q3.");
    write(dir.path(), "vendors.md", "Two vendors shortlisted; one lacks SOC 2.");

    let toml = format!(
        r#"
provider = "acme"
model = "wide-1"

[assembly]
large_tier_min = 20000

[[models]]
provider = "acme"
model = "wide-1"
max_context_tokens = 40000

[templates.vendor-assessment]
prompt = "Assess every shortlisted vendor."
keywords = {{ vendor = 3.0, procurement = 1.0 }}

[context]
core_path = '{core}'

[[context.enriched]]
key = "vendor-shortlist"
path = '{vendors}'
"#,
        core = dir.path().join("project.md").display(),
        vendors = dir.path().join("vendors.md").display(),
    );
    let config = AppConfig::from_toml(&toml).unwrap();
    let engine = ContextAssemblyEngine::from_config(&config).unwrap();

    assert_eq!(engine.profile().max_context_tokens, 40_000);
    assert_eq!(engine.profile().reserved_output_tokens, 4_000);
    let result = engine.build("vendor-assessment").unwrap();
    assert_eq!(result.tier, BudgetTier::Large);
    assert!(result.text.contains("Two vendors shortlisted"));
    assert_eq!(
        engine.prompt_for("vendor-assessment"),
        "Assess every shortlisted vendor."
    );
}

#[test]
fn e2e_model_switch_invalidates_cache() {
    let mut engine = populated(10_000);
    let small = engine.build("risk-analysis").unwrap();
    engine.set_model("google", "gemini-1.5-pro");
    let big = engine.build("risk-analysis").unwrap();

    assert_eq!(small.phase_reached, AssemblyPhase::Core);
    assert_eq!(big.phase_reached, AssemblyPhase::Comprehensive);
    assert!(big.included_fragment_keys.len() > small.included_fragment_keys.len());
}

#[test]
fn e2e_custom_estimator() {
    let mut engine = engine_with_budget(100).with_estimator(Arc::new(WordEstimator));
    engine.set_core_context("one two three four five");
    engine.add_enriched("risk-register", "alpha beta gamma");
    let result = engine.build("risk-analysis").unwrap();
    // "## Project Context" + 5 words, "## risk-register" + 3 words
    assert_eq!(result.total_tokens, 3 + 5 + 2 + 3);
    assert_eq!(engine.metrics().core_context_tokens, 5);
}

// ── Generation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_generate_documents_in_sequence() {
    let mut engine = populated(10_000);
    let client = ScriptedClient::new(vec![
        Ok("# Risk Analysis\n\n1. Vendor lock-in".into()),
        Ok("# Scope Statement\n\nIn scope: billing".into()),
    ]);

    let risk = engine.generate("risk-analysis", &client).await.unwrap();
    assert!(risk.content.starts_with("# Risk Analysis"));
    assert_eq!(risk.client, "e2e_mock");

    // A generated document becomes enriched context for the next one
    engine.add_enriched("risk-analysis", risk.content.clone());
    let scope = engine.generate("scope-statement", &client).await.unwrap();
    assert!(scope.content.contains("In scope"));
    assert_eq!(client.calls(), 2);

    let requests = client.requests.lock().unwrap();
    assert!(requests[0].prompt.contains("risk analysis"));
    assert!(requests[1].prompt.contains("scope statement"));
    assert_eq!(requests[1].profile.model, "mock");
}

#[tokio::test]
async fn e2e_generation_error_propagates() {
    let engine = populated(10_000);
    let client =
        ScriptedClient::new(vec![Err(GenerationError::RequestFailed("rate limited".into()))]);
    let err = engine.generate("risk-analysis", &client).await.unwrap_err();
    assert!(err.to_string().contains("rate limited"));
}

#[tokio::test]
async fn e2e_generate_without_core_never_calls_client() {
    let engine = engine_with_budget(10_000);
    let client = ScriptedClient::text("unused");
    assert!(engine.generate("risk-analysis", &client).await.is_err());
    assert_eq!(client.calls(), 0);
}
