//! Model capability lookup for DocWeaver.
//!
//! The engine only needs to know how many tokens the active model accepts
//! and how many to leave for its answer. Provider SDK calls live behind
//! `docweaver_core::LlmClient` and are not part of this crate.

pub mod registry;

pub use registry::{ModelCapabilityRegistry, reserve_for_window};
