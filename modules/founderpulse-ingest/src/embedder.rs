use ai_client::openai::OpenAi;
use ai_client::traits::EmbedAgent;
use anyhow::Result;

// --- TextEmbedder trait ---

#[async_trait::async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

/// OpenAI embeddings at a fixed reduced width so vectors match the
/// `vector(1536)` column.
pub struct Embedder {
    client: OpenAi,
}

impl Embedder {
    pub fn new(openai_api_key: &str, model: &str, dimensions: u32) -> Self {
        let client = OpenAi::new(openai_api_key, model)
            .with_embedding_model(model)
            .with_embedding_dimensions(dimensions);
        Self { client }
    }
}

#[async_trait::async_trait]
impl TextEmbedder for Embedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.client.embed_batch(texts).await
    }
}
