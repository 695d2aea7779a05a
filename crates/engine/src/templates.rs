//! Per-document-type keyword rubrics and prompts.
//!
//! [`BuiltinTemplates`] covers the common project-management documents;
//! [`ConfiguredTemplates`] layers `[templates.*]` config entries on top.

use docweaver_config::TemplateConfig;
use docweaver_core::{TemplateStore, WeightedKeyword};
use std::collections::BTreeMap;

/// Built-in keyword sets, keyed by kebab-case document type.
const BUILTIN: &[(&str, &[(&str, f64)])] = &[
    (
        "project-charter",
        &[
            ("project", 3.0),
            ("scope", 2.0),
            ("stakeholders", 2.0),
            ("objectives", 2.0),
            ("budget", 1.5),
            ("timeline", 1.5),
        ],
    ),
    (
        "business-case",
        &[
            ("benefits", 3.0),
            ("budget", 2.5),
            ("cost", 2.5),
            ("risk", 1.5),
            ("scope", 1.5),
            ("stakeholders", 1.0),
        ],
    ),
    (
        "risk-analysis",
        &[
            ("risk", 3.0),
            ("compliance", 2.0),
            ("security", 2.0),
            ("mitigation", 2.0),
            ("dependencies", 1.0),
            ("issues", 1.0),
        ],
    ),
    (
        "risk-management-plan",
        &[
            ("risk", 3.0),
            ("mitigation", 2.5),
            ("compliance", 2.0),
            ("security", 1.5),
            ("stakeholders", 1.0),
        ],
    ),
    (
        "stakeholder-register",
        &[
            ("stakeholders", 3.0),
            ("communication", 2.0),
            ("roles", 2.0),
            ("organization", 1.0),
        ],
    ),
    (
        "scope-statement",
        &[
            ("scope", 3.0),
            ("requirements", 2.5),
            ("deliverables", 2.0),
            ("constraints", 1.5),
            ("assumptions", 1.0),
        ],
    ),
    (
        "requirements-specification",
        &[
            ("requirements", 3.0),
            ("functional", 2.0),
            ("architecture", 1.5),
            ("tech stack", 1.5),
            ("stakeholders", 1.0),
        ],
    ),
    (
        "technical-design",
        &[
            ("architecture", 3.0),
            ("tech stack", 2.5),
            ("integration", 1.5),
            ("security", 1.5),
            ("requirements", 1.0),
        ],
    ),
    (
        "project-schedule",
        &[
            ("timeline", 3.0),
            ("milestones", 2.5),
            ("schedule", 2.5),
            ("dependencies", 1.5),
        ],
    ),
    (
        "cost-management-plan",
        &[
            ("budget", 3.0),
            ("cost", 2.5),
            ("procurement", 1.5),
            ("timeline", 1.0),
        ],
    ),
    (
        "quality-management-plan",
        &[
            ("quality", 3.0),
            ("standards", 2.0),
            ("testing", 2.0),
            ("compliance", 1.5),
            ("requirements", 1.0),
        ],
    ),
    (
        "communication-plan",
        &[
            ("communication", 3.0),
            ("stakeholders", 2.5),
            ("reporting", 2.0),
        ],
    ),
];

fn normalize(document_type: &str) -> String {
    document_type.trim().to_lowercase().replace(['_', ' '], "-")
}

fn title(document_type: &str) -> String {
    normalize(document_type).replace('-', " ")
}

/// The static rubric table shipped with DocWeaver.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl BuiltinTemplates {
    /// Document types with a built-in rubric.
    pub fn document_types() -> Vec<&'static str> {
        BUILTIN.iter().map(|(name, _)| *name).collect()
    }
}

impl TemplateStore for BuiltinTemplates {
    fn keywords(&self, document_type: &str) -> Vec<WeightedKeyword> {
        let wanted = normalize(document_type);
        BUILTIN
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, keywords)| {
                keywords
                    .iter()
                    .map(|(k, w)| WeightedKeyword::new(*k, *w))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn prompt(&self, document_type: &str) -> Option<String> {
        let wanted = normalize(document_type);
        BUILTIN.iter().any(|(name, _)| *name == wanted).then(|| {
            format!(
                "Using the project context above, write a complete {} for this project.",
                title(document_type)
            )
        })
    }
}

/// Built-in rubrics overridden by configuration.
///
/// A configured document type with keywords replaces the built-in set
/// entirely; one with only a prompt keeps the built-in keywords.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredTemplates {
    overrides: BTreeMap<String, TemplateConfig>,
}

impl ConfiguredTemplates {
    pub fn new(overrides: &BTreeMap<String, TemplateConfig>) -> Self {
        Self {
            overrides: overrides
                .iter()
                .map(|(k, v)| (normalize(k), v.clone()))
                .collect(),
        }
    }
}

impl TemplateStore for ConfiguredTemplates {
    fn keywords(&self, document_type: &str) -> Vec<WeightedKeyword> {
        match self.overrides.get(&normalize(document_type)) {
            Some(t) if !t.keywords.is_empty() => t
                .keywords
                .iter()
                .map(|(k, w)| WeightedKeyword::new(k.as_str(), *w))
                .collect(),
            _ => BuiltinTemplates.keywords(document_type),
        }
    }

    fn prompt(&self, document_type: &str) -> Option<String> {
        self.overrides
            .get(&normalize(document_type))
            .and_then(|t| t.prompt.clone())
            .or_else(|| BuiltinTemplates.prompt(document_type))
    }
}
