//! Context assembly for document generation.
//!
//! Decides, per document type, which project knowledge goes into the prompt
//! under a hard token budget derived from the active model.
//!
//! # Assembly Phases
//!
//! | Tier | Available budget | Phases |
//! |------|------------------|--------|
//! | Standard | < 50K | 1. Core + relevance-matched enriched |
//! | Large | 50K–200K | 1, then 3. Top supplementary fragments |
//! | Ultra-large | > 200K | 1, then 2. Every remaining fragment |
//!
//! Thresholds are defaults from [`AssemblySettings`], not invariants.

pub mod builder;
pub mod cache;
pub mod discovery;
pub mod engine;
pub mod report;
pub mod scorer;
pub mod settings;
pub mod store;
pub mod templates;

pub use builder::{
    AssemblyPhase, AssemblyResult, ContextBuilder, OverflowKind, OverflowWarning, SectionInfo,
};
pub use cache::AssemblyCache;
pub use discovery::{DiscoveredFile, DiscoveryOptions, DiscoveryReport, FileDiscovery};
pub use engine::{ContextAssemblyEngine, EngineMetrics, GeneratedDocument};
pub use report::{ContextUsage, UtilizationLevel, UtilizationReport, UtilizationReporter};
pub use scorer::{Relevance, RelevanceScorer, Scored};
pub use settings::AssemblySettings;
pub use store::ContextStore;
pub use templates::{BuiltinTemplates, ConfiguredTemplates};
