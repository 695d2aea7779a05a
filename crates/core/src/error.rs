//! Error types for the DocWeaver domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; only a missing core
//! context is a hard failure at the engine boundary.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all DocWeaver operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Context assembly errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Context source files ---
    #[error("Failed to read context source {path}: {reason}")]
    Source { path: PathBuf, reason: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("No core context registered; call set_core_context before building")]
    MissingCoreContext,

    #[error("Document type must not be empty")]
    EmptyDocumentType,
}

/// A file that could not be read during discovery.
///
/// Never raised from discovery itself: collected into the discovery
/// report so the walk can continue.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoveryError {
    #[error("Failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Failed to walk directory tree at {path}: {reason}")]
    Walk { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_core_displays_correctly() {
        let err = Error::Context(ContextError::MissingCoreContext);
        assert!(err.to_string().contains("No core context"));
    }

    #[test]
    fn discovery_error_includes_path() {
        let err = DiscoveryError::Io {
            path: PathBuf::from("docs/plan.md"),
            reason: "permission denied".into(),
        };
        assert!(err.to_string().contains("docs/plan.md"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn generation_error_wraps_into_top_level() {
        let err: Error = GenerationError::RequestFailed("rate limited".into()).into();
        assert!(err.to_string().contains("rate limited"));
    }
}
