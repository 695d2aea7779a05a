//! Relevance of a fragment to a document type.
//!
//! A fragment's declared terms (key tokens, tags, category) are matched
//! against the document type's weighted keyword set. Every fragment gets
//! a nonzero baseline so ranking never comes back empty, but only a
//! keyword overlap counts as a *match* for Phase 1.

use docweaver_core::fragment::split_terms;
use docweaver_core::{ContextFragment, TemplateStore, WeightedKeyword};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Score of one fragment for one document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relevance {
    /// baseline + keyword score + relevance hint
    pub score: f64,
    /// Sum of matched keyword weights
    pub keyword_score: f64,
    /// Keywords found among the fragment's terms
    pub matched_keywords: Vec<String>,
}

impl Relevance {
    /// Whether the fragment overlaps the document's keyword set.
    pub fn is_match(&self) -> bool {
        self.keyword_score > 0.0
    }
}

/// A fragment paired with its relevance.
#[derive(Debug, Clone)]
pub struct Scored<'a> {
    pub fragment: &'a ContextFragment,
    pub relevance: Relevance,
}

/// Weighted keyword scorer backed by a template store.
#[derive(Clone)]
pub struct RelevanceScorer {
    templates: Arc<dyn TemplateStore>,
    baseline: f64,
}

impl RelevanceScorer {
    pub fn new(templates: Arc<dyn TemplateStore>, baseline: f64) -> Self {
        Self {
            templates,
            baseline,
        }
    }

    pub fn templates(&self) -> &Arc<dyn TemplateStore> {
        &self.templates
    }

    /// Keyword set for a document type.
    ///
    /// Document types without a template use their own name's words,
    /// weight 1.0 each, so `vendor-assessment` still favors fragments
    /// tagged `vendor`.
    pub fn keywords_for(&self, document_type: &str) -> Vec<WeightedKeyword> {
        let keywords = self.templates.keywords(document_type);
        if !keywords.is_empty() {
            return keywords;
        }
        let mut derived: Vec<WeightedKeyword> = Vec::new();
        for term in split_terms(document_type) {
            if !derived.iter().any(|k| k.keyword == term) {
                derived.push(WeightedKeyword::new(term, 1.0));
            }
        }
        derived
    }

    /// Score a fragment for a document type.
    pub fn score(&self, fragment: &ContextFragment, document_type: &str) -> Relevance {
        self.score_with(fragment, &self.keywords_for(document_type))
    }

    /// Score against a precomputed keyword set.
    ///
    /// Multi-word keywords (`tech stack`) match only when every word is
    /// among the fragment's terms.
    pub fn score_with(
        &self,
        fragment: &ContextFragment,
        keywords: &[WeightedKeyword],
    ) -> Relevance {
        let terms = fragment.terms();
        let mut keyword_score = 0.0;
        let mut matched_keywords = Vec::new();

        for kw in keywords {
            let words = split_terms(&kw.keyword);
            if !words.is_empty() && words.iter().all(|w| terms.binary_search(w).is_ok()) {
                keyword_score += kw.weight;
                matched_keywords.push(kw.keyword.clone());
            }
        }

        Relevance {
            score: self.baseline + keyword_score + fragment.relevance_hint.unwrap_or(0.0),
            keyword_score,
            matched_keywords,
        }
    }

    /// Score and order fragments: score descending, insertion order on ties.
    pub fn rank<'a, I>(&self, fragments: I, document_type: &str) -> Vec<Scored<'a>>
    where
        I: IntoIterator<Item = &'a ContextFragment>,
    {
        let keywords = self.keywords_for(document_type);
        let mut scored: Vec<Scored<'a>> = fragments
            .into_iter()
            .map(|fragment| Scored {
                fragment,
                relevance: self.score_with(fragment, &keywords),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.relevance
                .score
                .total_cmp(&a.relevance.score)
                .then(a.fragment.sequence.cmp(&b.fragment.sequence))
        });
        scored
    }
}
