//! Utilization reports: what an assembly used, what it left out, and what
//! to do about it.

use crate::builder::{AssemblyPhase, AssemblyResult, OverflowKind, OverflowWarning};
use crate::scorer::RelevanceScorer;
use crate::settings::AssemblySettings;
use crate::store::ContextStore;
use chrono::{DateTime, Utc};
use docweaver_core::{BudgetTier, FragmentCategory, FragmentKey};
use serde::Serialize;
use std::fmt::{self, Write as _};

/// Coarse utilization band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationLevel {
    Low,
    Moderate,
    High,
    NearCapacity,
}

impl UtilizationLevel {
    /// `< 10%` low, `< 50%` moderate, `<= 90%` high, above that near capacity.
    pub fn from_percentage(pct: f64) -> Self {
        if pct < 10.0 {
            Self::Low
        } else if pct < 50.0 {
            Self::Moderate
        } else if pct <= 90.0 {
            Self::High
        } else {
            Self::NearCapacity
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::NearCapacity => "near capacity",
        }
    }
}

impl fmt::Display for UtilizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fragment's line in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextUsage {
    pub key: FragmentKey,
    pub category: FragmentCategory,
    pub tokens: usize,
    pub score: f64,
    pub matched_keywords: Vec<String>,
    /// Phase that included it; `None` for excluded fragments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<AssemblyPhase>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UtilizationReport {
    pub document_type: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub tier: BudgetTier,
    pub total_tokens: usize,
    pub available_budget: usize,
    pub utilization_percentage: f64,
    pub level: UtilizationLevel,
    pub phase_reached: AssemblyPhase,
    pub included_contexts: Vec<ContextUsage>,
    /// Fragments in the store that did not make it, best first
    pub potential_contexts: Vec<ContextUsage>,
    pub warnings: Vec<OverflowWarning>,
    pub recommendations: Vec<String>,
}

impl UtilizationReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text rendering for terminals.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Context utilization for '{}'", self.document_type);
        let _ = writeln!(out, "  Model:       {}", self.model);
        let _ = writeln!(
            out,
            "  Tokens:      {} / {} ({:.1}%, {})",
            self.total_tokens, self.available_budget, self.utilization_percentage, self.level
        );
        let _ = writeln!(out, "  Tier/phase:  {} / {}", self.tier, self.phase_reached);
        let generated = self.generated_at.format("%Y-%m-%d %H:%M:%S UTC");
        let _ = writeln!(out, "  Generated:   {generated}");

        render_usages(&mut out, "Included", &self.included_contexts);
        render_usages(&mut out, "Not included", &self.potential_contexts);

        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\nWarnings ({}):", self.warnings.len());
            for w in &self.warnings {
                let _ = match w.kind {
                    OverflowKind::Truncated => writeln!(
                        out,
                        "  - {} truncated from {} to {} tokens (phase {})",
                        w.key,
                        w.fragment_tokens,
                        w.included_tokens,
                        w.phase.number()
                    ),
                    OverflowKind::Skipped => writeln!(
                        out,
                        "  - {} skipped: needs {} tokens, {} left (phase {})",
                        w.key,
                        w.fragment_tokens,
                        w.remaining_budget,
                        w.phase.number()
                    ),
                };
            }
        }

        if !self.recommendations.is_empty() {
            let _ = writeln!(out, "\nRecommendations:");
            for r in &self.recommendations {
                let _ = writeln!(out, "  - {r}");
            }
        }
        out
    }
}

fn render_usages(out: &mut String, label: &str, usages: &[ContextUsage]) {
    if usages.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{label} ({}):", usages.len());
    for u in usages {
        let mark = if u.truncated { " [truncated]" } else { "" };
        let _ = writeln!(
            out,
            "  {:<32} {:<9} {:>8} tokens  score {:>5.2}{mark}",
            u.key.as_str(),
            u.category.as_str(),
            u.tokens,
            u.score
        );
    }
}

/// Turns an [`AssemblyResult`] into a [`UtilizationReport`].
pub struct UtilizationReporter<'a> {
    scorer: &'a RelevanceScorer,
    settings: &'a AssemblySettings,
}

impl<'a> UtilizationReporter<'a> {
    pub fn new(scorer: &'a RelevanceScorer, settings: &'a AssemblySettings) -> Self {
        Self { scorer, settings }
    }

    pub fn report(&self, result: &AssemblyResult, store: &ContextStore) -> UtilizationReport {
        let doc = result.document_type.as_str();
        let keywords = self.scorer.keywords_for(doc);

        let included_contexts: Vec<ContextUsage> = result
            .sections
            .iter()
            .map(|s| {
                let matched_keywords = store
                    .get(s.category, &s.key)
                    .filter(|f| f.category != FragmentCategory::Core)
                    .map(|f| self.scorer.score_with(f, &keywords).matched_keywords)
                    .unwrap_or_default();
                ContextUsage {
                    key: s.key.clone(),
                    category: s.category,
                    tokens: s.tokens,
                    score: s.score,
                    matched_keywords,
                    phase: Some(s.phase),
                    truncated: s.truncated,
                }
            })
            .collect();

        let excluded = store
            .candidates()
            .into_iter()
            .filter(|f| !result.includes(f.category, &f.key));
        let potential_contexts: Vec<ContextUsage> = self
            .scorer
            .rank(excluded, doc)
            .into_iter()
            .map(|s| ContextUsage {
                key: s.fragment.key.clone(),
                category: s.fragment.category,
                tokens: s.fragment.token_count,
                score: s.relevance.score,
                matched_keywords: s.relevance.matched_keywords,
                phase: None,
                truncated: false,
            })
            .collect();

        let level = UtilizationLevel::from_percentage(result.utilization_percentage);
        let recommendations =
            self.recommend(result, level, &included_contexts, &potential_contexts);

        UtilizationReport {
            document_type: result.document_type.clone(),
            model: result.model.clone(),
            generated_at: Utc::now(),
            tier: result.tier,
            total_tokens: result.total_tokens,
            available_budget: result.available_budget,
            utilization_percentage: result.utilization_percentage,
            level,
            phase_reached: result.phase_reached,
            included_contexts,
            potential_contexts,
            warnings: result.warnings.clone(),
            recommendations,
        }
    }

    fn recommend(
        &self,
        result: &AssemblyResult,
        level: UtilizationLevel,
        included: &[ContextUsage],
        potential: &[ContextUsage],
    ) -> Vec<String> {
        let mut out = Vec::new();
        let pct = result.utilization_percentage;

        match level {
            UtilizationLevel::Low => out.push(format!(
                "Only {pct:.1}% of the budget is used; add enriched context or run discovery to give the model more project knowledge."
            )),
            UtilizationLevel::NearCapacity => out.push(format!(
                "Context is at {pct:.1}% of the budget; consider a model with a larger window or trimming long fragments."
            )),
            _ => {}
        }

        let truncated = result.truncated_count();
        if truncated > 0 {
            out.push(format!(
                "{truncated} fragment(s) were truncated; shorten them or use a larger model to keep them whole."
            ));
        }
        let skipped: Vec<&str> = result
            .warnings
            .iter()
            .filter(|w| w.kind == OverflowKind::Skipped)
            .map(|w| w.key.as_str())
            .collect();
        if !skipped.is_empty() {
            out.push(format!(
                "{} fragment(s) did not fit and were skipped: {}.",
                skipped.len(),
                skipped.join(", ")
            ));
        }

        if result.tier != BudgetTier::UltraLarge && !potential.is_empty() {
            out.push(format!(
                "{} fragment(s) were left out; a model with more than {} available tokens would include all of them (Phase 2).",
                potential.len(),
                self.settings.ultra_tier_above
            ));
        }

        let any_match = included
            .iter()
            .chain(potential)
            .any(|u| !u.matched_keywords.is_empty());
        if !any_match {
            let hints: Vec<String> = self
                .scorer
                .keywords_for(&result.document_type)
                .into_iter()
                .take(3)
                .map(|k| k.keyword)
                .collect();
            out.push(format!(
                "No stored fragment matches '{}'; tag enriched context with keywords such as {} to improve relevance.",
                result.document_type,
                hints.join(", ")
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ContextBuilder;
    use crate::templates::BuiltinTemplates;
    use docweaver_core::{CharRatioEstimator, ContextFragment, ModelProfile};
    use std::sync::Arc;

    fn words(tokens: usize) -> String {
        "word ".repeat(tokens * 4 / 5).trim_end().to_string()
    }

    fn analyze(store: &ContextStore, available: usize, doc: &str) -> UtilizationReport {
        let scorer = RelevanceScorer::new(Arc::new(BuiltinTemplates), 0.1);
        let settings = AssemblySettings::default();
        let profile = ModelProfile::new("test", "mock", available + 1_000, 1_000).unwrap();
        let result = ContextBuilder::new(store, &scorer, &settings, &profile)
            .build(doc)
            .unwrap();
        UtilizationReporter::new(&scorer, &settings).report(&result, store)
    }

    fn store() -> ContextStore {
        ContextStore::new(Arc::new(CharRatioEstimator::default()))
    }

    #[test]
    fn levels() {
        assert_eq!(UtilizationLevel::from_percentage(5.0), UtilizationLevel::Low);
        assert_eq!(UtilizationLevel::from_percentage(10.0), UtilizationLevel::Moderate);
        assert_eq!(UtilizationLevel::from_percentage(50.0), UtilizationLevel::High);
        assert_eq!(UtilizationLevel::from_percentage(90.0), UtilizationLevel::High);
        assert_eq!(UtilizationLevel::from_percentage(90.1), UtilizationLevel::NearCapacity);
    }

    #[test]
    fn lists_included_and_potential() {
        let mut s = store();
        s.insert(ContextFragment::core(words(100)));
        s.insert(ContextFragment::enriched("risk-analysis", words(100)));
        s.insert(ContextFragment::enriched("tech-stack", words(100)));
        let report = analyze(&s, 10_000, "risk-analysis");

        assert_eq!(report.included_contexts.len(), 2);
        assert_eq!(report.included_contexts[1].matched_keywords, vec!["risk"]);
        assert_eq!(report.potential_contexts.len(), 1);
        assert_eq!(report.potential_contexts[0].key, FragmentKey::TechStack);
        assert_eq!(report.level, UtilizationLevel::Low);
        assert!(report.recommendations.iter().any(|r| r.contains("Only")));
        assert!(report.recommendations.iter().any(|r| r.contains("Phase 2")));
    }

    #[test]
    fn near_capacity_and_skips_recommended() {
        let mut s = store();
        // Core leaves too little for even a truncated section
        s.insert(ContextFragment::core(words(990)));
        s.insert(ContextFragment::enriched("risk-analysis", words(500)));
        let report = analyze(&s, 1_000, "risk-analysis");

        assert_eq!(report.level, UtilizationLevel::NearCapacity);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.recommendations.iter().any(|r| r.contains("skipped: risk-analysis")));
    }

    #[test]
    fn missing_matches_suggest_keywords() {
        let mut s = store();
        s.insert(ContextFragment::core(words(100)));
        s.insert(ContextFragment::enriched("tech-stack", words(100)));
        let report = analyze(&s, 10_000, "risk-analysis");
        assert!(
            report
                .recommendations
                .iter()
                .any(|r| r.contains("risk, compliance, security"))
        );
    }

    #[test]
    fn render_and_json() {
        let mut s = store();
        s.insert(ContextFragment::core(words(100)));
        let report = analyze(&s, 10_000, "scope-statement");
        let text = report.render();
        assert!(text.contains("Context utilization for 'scope-statement'"));
        assert!(text.contains("test/mock"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["document_type"], "scope-statement");
        assert_eq!(json["level"], "low");
    }
}
