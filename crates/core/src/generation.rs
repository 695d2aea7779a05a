//! Collaborator traits consumed around context assembly.
//!
//! The engine never talks to a provider SDK directly. It hands the
//! assembled context to an [`LlmClient`] and reads per-document keyword
//! sets and prompts from a [`TemplateStore`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::model::ModelProfile;

/// A keyword with its weight in a document type's relevance rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedKeyword {
    pub keyword: String,
    pub weight: f64,
}

impl WeightedKeyword {
    pub fn new(keyword: impl Into<String>, weight: f64) -> Self {
        Self {
            keyword: keyword.into().to_lowercase(),
            weight,
        }
    }
}

/// Static per-document-type configuration.
pub trait TemplateStore: Send + Sync {
    /// Keyword set used to score fragments for this document type.
    /// An empty set means "no template known".
    fn keywords(&self, document_type: &str) -> Vec<WeightedKeyword>;

    /// Prompt sent alongside the assembled context, if one is configured.
    fn prompt(&self, document_type: &str) -> Option<String>;
}

/// Everything an LLM client needs to generate one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Active model; the client maps it to its own SDK call
    pub profile: ModelProfile,

    /// Assembled context text
    pub context: String,

    /// Document-specific instruction
    pub prompt: String,
}

/// An LLM backend. Retries and fallbacks are the client's business.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Client name for logging
    fn name(&self) -> &str;

    /// Generate a document from context and prompt.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UppercaseClient;

    #[async_trait]
    impl LlmClient for UppercaseClient {
        fn name(&self) -> &str {
            "uppercase"
        }

        async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
            if request.context.is_empty() {
                return Err(GenerationError::EmptyResponse);
            }
            Ok(request.prompt.to_uppercase())
        }
    }

    #[test]
    fn weighted_keyword_lowercases() {
        assert_eq!(WeightedKeyword::new("Risk", 2.0).keyword, "risk");
    }

    #[tokio::test]
    async fn client_trait_is_object_safe() {
        let client: Box<dyn LlmClient> = Box::new(UppercaseClient);
        let profile = ModelProfile::new("test", "mock", 8_192, 1_000).unwrap();
        let out = client
            .generate(GenerationRequest {
                profile,
                context: "ctx".into(),
                prompt: "write a charter".into(),
            })
            .await
            .unwrap();
        assert_eq!(out, "WRITE A CHARTER");
        assert_eq!(client.name(), "uppercase");
    }
}
