use serde::{Deserialize, Serialize};

/// Runtime configuration published by the service at `GET /config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Retrieval-augmented generation backend.
    pub rag: RagConfig,
    /// Models the service exposes, grouped by capability.
    pub models: ModelConfig,
}

/// RAG provider selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagConfig {
    /// Provider name, e.g. `ragflow`.
    pub provider: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            provider: "default".to_string(),
        }
    }
}

/// Model names available to the planner and researchers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// General-purpose models.
    #[serde(default)]
    pub basic: Vec<String>,
    /// Models used when deep thinking is enabled.
    #[serde(default)]
    pub reasoning: Vec<String>,
}

impl RuntimeConfig {
    /// The configuration used when the service cannot be reached.
    pub fn fallback() -> Self {
        Self::default()
    }

    /// The configured RAG provider.
    pub fn rag_provider(&self) -> &str {
        &self.rag.provider
    }
}
