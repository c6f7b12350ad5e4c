use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// ChatAgent Trait
// =============================================================================

/// A model that can answer a single system + user prompt with text.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    /// The model identifier requests are issued against.
    fn model(&self) -> &str;

    async fn chat_completion(&self, system: &str, user: &str) -> Result<String>;
}

// =============================================================================
// EmbedAgent Trait
// =============================================================================

#[async_trait]
pub trait EmbedAgent: Send + Sync {
    async fn embed(&self, text: impl Into<String> + Send) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}
