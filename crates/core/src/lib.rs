//! # DocWeaver Core
//!
//! Domain types, traits, and error definitions for the DocWeaver context
//! assembly engine. This crate has **no engine logic**: it defines the
//! domain model that the registry, engine, and CLI crates build against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here:
//! - [`TokenEstimator`] so a real tokenizer can replace the heuristic
//! - [`LlmClient`] for whatever provider SDK generates the document
//! - [`TemplateStore`] for per-document keyword sets and prompts

pub mod error;
pub mod fragment;
pub mod generation;
pub mod model;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use error::{ContextError, DiscoveryError, Error, GenerationError, Result};
pub use fragment::{ContextFragment, FragmentCategory, FragmentKey};
pub use generation::{GenerationRequest, LlmClient, TemplateStore, WeightedKeyword};
pub use model::{BudgetTier, ModelProfile};
pub use token::{CharRatioEstimator, TokenEstimator};
