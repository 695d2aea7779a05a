//! Context assembly pipeline: the three-phase budget allocator.
//!
//! 1. **Core** (always): the project description, then enriched fragments
//!    that match the document type, best first
//! 2. **Comprehensive** (ultra-large budgets): every remaining enriched and
//!    injected fragment, best first
//! 3. **Supplementary** (large budgets): the top few remaining fragments
//!    while more than a floor of tokens is left
//!
//! A fragment that does not fit is truncated when the overflow is small
//! relative to what remains, and skipped otherwise. Both outcomes are
//! recorded as [`OverflowWarning`]s. A skip lets smaller, lower-ranked
//! fragments fit whole; once a phase has offered all its candidates, any
//! leftover budget goes to its best skipped fragment, cut to fit. A skipped
//! fragment is never offered again by a later phase.
//!
//! # Determinism
//!
//! Identical store state and model profile always produce identical text
//! and fragment order. No random or time-dependent logic is used.

use crate::scorer::{RelevanceScorer, Scored};
use crate::settings::AssemblySettings;
use crate::store::ContextStore;
use docweaver_core::{
    BudgetTier, ContextError, ContextFragment, FragmentCategory, FragmentKey, ModelProfile,
    TokenEstimator,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Appended to any fragment cut short to fit the budget.
pub const TRUNCATION_MARKER: &str = "\n[... truncated to fit context budget]";

const SECTION_SEPARATOR: &str = "\n\n";

// ── Types ─────────────────────────────────────────────────────────────────

/// The phase that terminated assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyPhase {
    Core,
    Comprehensive,
    Supplementary,
}

impl AssemblyPhase {
    /// Phase number: 1, 2, or 3.
    pub fn number(&self) -> u8 {
        match self {
            Self::Core => 1,
            Self::Comprehensive => 2,
            Self::Supplementary => 3,
        }
    }
}

impl fmt::Display for AssemblyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Core => "core",
            Self::Comprehensive => "comprehensive",
            Self::Supplementary => "supplementary",
        };
        write!(f, "{} ({})", self.number(), name)
    }
}

/// How a fragment was degraded to respect the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowKind {
    Truncated,
    Skipped,
}

/// Non-fatal record of a fragment cut or dropped for budget reasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverflowWarning {
    pub key: FragmentKey,
    pub category: FragmentCategory,
    pub kind: OverflowKind,
    /// Tokens the fragment's section would have needed
    pub fragment_tokens: usize,
    /// Tokens actually used (0 when skipped)
    pub included_tokens: usize,
    /// Budget left when the fragment was considered
    pub remaining_budget: usize,
    pub phase: AssemblyPhase,
}

/// Per-fragment accounting of the assembled text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub key: FragmentKey,
    pub category: FragmentCategory,
    pub tokens: usize,
    pub score: f64,
    pub phase: AssemblyPhase,
    pub truncated: bool,
}

/// The bounded context for one document, with metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyResult {
    pub document_type: String,
    /// `provider/model` the budget came from
    pub model: String,
    pub tier: BudgetTier,
    /// Final assembled context
    pub text: String,
    /// Estimated tokens of `text`
    pub total_tokens: usize,
    /// Model window minus output reserve
    pub available_budget: usize,
    /// Keys in inclusion order
    pub included_fragment_keys: Vec<FragmentKey>,
    pub phase_reached: AssemblyPhase,
    /// `total_tokens / available_budget` as a percentage (0.0–100.0)
    pub utilization_percentage: f64,
    pub sections: Vec<SectionInfo>,
    pub warnings: Vec<OverflowWarning>,
}

impl AssemblyResult {
    pub fn truncated_count(&self) -> usize {
        self.count_warnings(OverflowKind::Truncated)
    }

    pub fn skipped_count(&self) -> usize {
        self.count_warnings(OverflowKind::Skipped)
    }

    fn count_warnings(&self, kind: OverflowKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    /// Whether a fragment made it into the text.
    pub fn includes(&self, category: FragmentCategory, key: &FragmentKey) -> bool {
        self.sections
            .iter()
            .any(|s| s.category == category && &s.key == key)
    }
}

// ── Builder ───────────────────────────────────────────────────────────────

/// Runs the phase algorithm over a store snapshot. Borrowing only; build
/// one per call.
pub struct ContextBuilder<'a> {
    store: &'a ContextStore,
    scorer: &'a RelevanceScorer,
    settings: &'a AssemblySettings,
    profile: &'a ModelProfile,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(
        store: &'a ContextStore,
        scorer: &'a RelevanceScorer,
        settings: &'a AssemblySettings,
        profile: &'a ModelProfile,
    ) -> Self {
        Self {
            store,
            scorer,
            settings,
            profile,
        }
    }

    /// Assemble context for a document type.
    ///
    /// # Algorithm
    ///
    /// 1. Fail if no core fragment exists
    /// 2. Classify the available budget into a tier
    /// 3. Phase 1 for every tier
    /// 4. Phase 2 for ultra-large, Phase 3 for large
    /// 5. Return text and metrics
    pub fn build(&self, document_type: &str) -> Result<AssemblyResult, ContextError> {
        if document_type.trim().is_empty() {
            return Err(ContextError::EmptyDocumentType);
        }
        let core = self.store.core().ok_or(ContextError::MissingCoreContext)?;

        let budget = self.profile.available_budget();
        let tier = self.settings.tier(budget);
        let estimator = self.store.estimator().as_ref();
        let mut asm = Assembly::new(estimator, budget, self.settings.truncation_tolerance);

        // ── Phase 1: core + matched enriched ───────────────────────────
        asm.offer_core(core);
        let matched: Vec<Scored<'_>> = self
            .scorer
            .rank(self.store.enriched(), document_type)
            .into_iter()
            .filter(|s| s.relevance.is_match())
            .collect();
        debug!(
            document_type,
            matched = matched.len(),
            enriched = self.store.enriched_count(),
            "Phase 1: relevance-matched enriched fragments"
        );
        for candidate in &matched {
            asm.offer(candidate, AssemblyPhase::Core);
        }
        asm.fill(&matched, AssemblyPhase::Core);
        let mut phase_reached = AssemblyPhase::Core;

        // ── Phase 2 / Phase 3 by tier ──────────────────────────────────
        match tier {
            BudgetTier::Standard => {}
            BudgetTier::UltraLarge => {
                phase_reached = AssemblyPhase::Comprehensive;
                let remaining = self.remaining_candidates(&asm, document_type);
                debug!(candidates = remaining.len(), "Phase 2: comprehensive assembly");
                for candidate in &remaining {
                    asm.offer(candidate, AssemblyPhase::Comprehensive);
                }
                asm.fill(&remaining, AssemblyPhase::Comprehensive);
            }
            BudgetTier::Large => {
                let floor = self.settings.supplementary_floor;
                if asm.remaining() > floor {
                    phase_reached = AssemblyPhase::Supplementary;
                    let top: Vec<Scored<'_>> = self
                        .remaining_candidates(&asm, document_type)
                        .into_iter()
                        .take(self.settings.supplementary_max_fragments)
                        .collect();
                    debug!(
                        remaining = asm.remaining(),
                        candidates = top.len(),
                        "Phase 3: supplementary assembly"
                    );
                    for candidate in &top {
                        if asm.remaining() <= floor {
                            debug!(remaining = asm.remaining(), floor, "Phase 3 stopped at floor");
                            break;
                        }
                        asm.offer(candidate, AssemblyPhase::Supplementary);
                    }
                    asm.fill(&top, AssemblyPhase::Supplementary);
                } else {
                    debug!(remaining = asm.remaining(), floor, "Phase 3 skipped: below floor");
                }
            }
        }

        let result = asm.finish(document_type, self.profile, tier, phase_reached);
        info!(
            document_type,
            model = %result.model,
            tier = %tier,
            phase = result.phase_reached.number(),
            fragments = result.included_fragment_keys.len(),
            tokens = result.total_tokens,
            budget = result.available_budget,
            utilization = format!("{:.1}%", result.utilization_percentage),
            "Context assembled"
        );
        Ok(result)
    }

    /// Enriched and injected fragments not yet included or skipped, best first.
    fn remaining_candidates(&self, asm: &Assembly<'_>, document_type: &str) -> Vec<Scored<'a>> {
        let pending = self
            .store
            .candidates()
            .into_iter()
            .filter(|f| !asm.contains(f) && !asm.was_skipped(f));
        self.scorer.rank(pending, document_type)
    }
}

// ── Assembly state ────────────────────────────────────────────────────────

struct Assembly<'e> {
    estimator: &'e dyn TokenEstimator,
    budget: usize,
    tolerance: f64,
    used: usize,
    text: String,
    keys: Vec<FragmentKey>,
    seen: HashSet<(FragmentCategory, FragmentKey)>,
    skipped: HashSet<(FragmentCategory, FragmentKey)>,
    sections: Vec<SectionInfo>,
    warnings: Vec<OverflowWarning>,
}

impl<'e> Assembly<'e> {
    fn new(estimator: &'e dyn TokenEstimator, budget: usize, tolerance: f64) -> Self {
        Self {
            estimator,
            budget,
            tolerance,
            used: 0,
            text: String::new(),
            keys: Vec::new(),
            seen: HashSet::new(),
            skipped: HashSet::new(),
            sections: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.used)
    }

    fn contains(&self, fragment: &ContextFragment) -> bool {
        self.seen
            .contains(&(fragment.category, fragment.key.clone()))
    }

    fn was_skipped(&self, fragment: &ContextFragment) -> bool {
        self.skipped
            .contains(&(fragment.category, fragment.key.clone()))
    }

    /// Render a fragment as a titled section, prefixed by a separator
    /// unless it opens the text.
    fn render(&self, fragment: &ContextFragment) -> String {
        let title = match fragment.category {
            FragmentCategory::Core => "Project Context".to_string(),
            FragmentCategory::Enriched => fragment.key.title(),
            FragmentCategory::Injected => format!("{} (project file)", fragment.key),
        };
        let separator = if self.text.is_empty() { "" } else { SECTION_SEPARATOR };
        format!("{separator}## {title}\n{}", fragment.content.trim_end())
    }

    /// The core fragment is never dropped: cut to fit when necessary.
    fn offer_core(&mut self, core: &ContextFragment) {
        let section = self.render(core);
        let tokens = self.estimator.estimate(&section);
        let remaining = self.remaining();
        if tokens <= remaining {
            self.push(core, section, tokens, 0.0, AssemblyPhase::Core, false);
            return;
        }

        let cut = truncate_to_fit(&section, remaining, self.estimator);
        let cut_tokens = self.estimator.estimate(&cut);
        warn!(
            tokens,
            budget = remaining,
            "Core context exceeds the available budget, truncating"
        );
        self.record(
            core,
            OverflowKind::Truncated,
            tokens,
            cut_tokens,
            remaining,
            AssemblyPhase::Core,
        );
        self.push(core, cut, cut_tokens, 0.0, AssemblyPhase::Core, true);
    }

    /// Append a scored fragment in full, truncated, or not at all.
    fn offer(&mut self, candidate: &Scored<'_>, phase: AssemblyPhase) {
        let fragment = candidate.fragment;
        let score = candidate.relevance.score;
        let section = self.render(fragment);
        let tokens = self.estimator.estimate(&section);
        let remaining = self.remaining();

        if tokens <= remaining {
            debug!(key = %fragment.key, tokens, score, phase = phase.number(), "Included fragment");
            self.push(fragment, section, tokens, score, phase, false);
            return;
        }

        let overflow = tokens - remaining;
        if remaining == 0 || overflow as f64 > self.tolerance * remaining as f64 {
            debug!(key = %fragment.key, tokens, remaining, "Skipped fragment: over budget");
            self.record(fragment, OverflowKind::Skipped, tokens, 0, remaining, phase);
            self.skipped.insert((fragment.category, fragment.key.clone()));
            return;
        }

        let cut = truncate_to_fit(&section, remaining, self.estimator);
        let cut_tokens = self.estimator.estimate(&cut);
        debug!(key = %fragment.key, tokens, kept = cut_tokens, "Truncated fragment to fit");
        self.record(fragment, OverflowKind::Truncated, tokens, cut_tokens, remaining, phase);
        self.push(fragment, cut, cut_tokens, score, phase, true);
    }

    /// Spend what is left after a phase on the fragments it skipped, best
    /// first, cut to the leftover. Adding a fragment then never lowers the
    /// assembled total.
    fn fill(&mut self, candidates: &[Scored<'_>], phase: AssemblyPhase) {
        for candidate in candidates {
            if self.remaining() == 0 {
                break;
            }
            let fragment = candidate.fragment;
            if self.was_skipped(fragment) && !self.contains(fragment) {
                self.refill(candidate, phase);
            }
        }
    }

    /// Truncate a skipped fragment into the leftover budget, provided more
    /// than its heading and the marker fit.
    fn refill(&mut self, candidate: &Scored<'_>, phase: AssemblyPhase) {
        let fragment = candidate.fragment;
        let remaining = self.remaining();
        let section = self.render(fragment);
        let heading_end = section
            .find("## ")
            .and_then(|start| section[start..].find('\n').map(|nl| start + nl + 1))
            .unwrap_or(section.len());
        let overhead = self.estimator.estimate(&section[..heading_end])
            + self.estimator.estimate(TRUNCATION_MARKER);
        if remaining <= overhead {
            return;
        }

        let cut = truncate_to_fit(&section, remaining, self.estimator);
        let cut_tokens = self.estimator.estimate(&cut);
        debug!(key = %fragment.key, remaining, kept = cut_tokens, "Filled leftover budget");
        if let Some(warning) = self.warnings.iter_mut().find(|w| {
            w.kind == OverflowKind::Skipped
                && w.phase == phase
                && w.category == fragment.category
                && w.key == fragment.key
        }) {
            warning.kind = OverflowKind::Truncated;
            warning.included_tokens = cut_tokens;
            warning.remaining_budget = remaining;
        }
        self.skipped.remove(&(fragment.category, fragment.key.clone()));
        self.push(fragment, cut, cut_tokens, candidate.relevance.score, phase, true);
    }

    fn push(
        &mut self,
        fragment: &ContextFragment,
        section: String,
        tokens: usize,
        score: f64,
        phase: AssemblyPhase,
        truncated: bool,
    ) {
        self.text.push_str(&section);
        self.used += tokens;
        self.keys.push(fragment.key.clone());
        self.seen.insert((fragment.category, fragment.key.clone()));
        self.sections.push(SectionInfo {
            key: fragment.key.clone(),
            category: fragment.category,
            tokens,
            score,
            phase,
            truncated,
        });
    }

    fn record(
        &mut self,
        fragment: &ContextFragment,
        kind: OverflowKind,
        fragment_tokens: usize,
        included_tokens: usize,
        remaining_budget: usize,
        phase: AssemblyPhase,
    ) {
        self.warnings.push(OverflowWarning {
            key: fragment.key.clone(),
            category: fragment.category,
            kind,
            fragment_tokens,
            included_tokens,
            remaining_budget,
            phase,
        });
    }

    fn finish(
        self,
        document_type: &str,
        profile: &ModelProfile,
        tier: BudgetTier,
        phase_reached: AssemblyPhase,
    ) -> AssemblyResult {
        let total_tokens = self.estimator.estimate(&self.text);
        let utilization_percentage = if self.budget == 0 {
            0.0
        } else {
            total_tokens as f64 / self.budget as f64 * 100.0
        };
        AssemblyResult {
            document_type: document_type.to_string(),
            model: profile.id(),
            tier,
            text: self.text,
            total_tokens,
            available_budget: self.budget,
            included_fragment_keys: self.keys,
            phase_reached,
            utilization_percentage,
            sections: self.sections,
            warnings: self.warnings,
        }
    }
}

/// Longest prefix of `section` that, with the truncation marker, fits in
/// `max_tokens`. Falls back to a bare prefix when even the marker is too
/// big. Cuts at the last line or word break in the kept text's second half.
fn truncate_to_fit(section: &str, max_tokens: usize, estimator: &dyn TokenEstimator) -> String {
    let marker = if estimator.estimate(TRUNCATION_MARKER) <= max_tokens {
        TRUNCATION_MARKER
    } else {
        ""
    };

    // Byte offsets of every char boundary, including the end
    let boundaries: Vec<usize> = section
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(section.len()))
        .collect();

    let fits = |chars: usize| {
        let candidate = format!("{}{marker}", &section[..boundaries[chars]]);
        estimator.estimate(&candidate) <= max_tokens
    };

    // Binary search for the largest char count that fits
    let (mut lo, mut hi) = (0usize, boundaries.len() - 1);
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    let mut kept = &section[..boundaries[lo]];
    if let Some(pos) = kept.rfind(['\n', ' ']) {
        if pos > kept.len() / 2 {
            kept = &kept[..pos];
        }
    }
    format!("{kept}{marker}")
}
