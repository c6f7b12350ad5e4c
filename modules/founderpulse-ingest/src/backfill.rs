use std::sync::Arc;

use pgvector::Vector;
use tracing::{info, warn};
use uuid::Uuid;

use founderpulse_store::PostStore;

use crate::embedder::TextEmbedder;
use crate::error::Result;

const DEFAULT_BATCH_SIZE: i64 = 50;
const DEFAULT_MAX_BATCHES: u32 = 20;

/// What one backfill invocation accomplished.
#[derive(Debug, Clone, Copy)]
pub struct BackfillReport {
    pub processed: u64,
    pub remaining_estimate: i64,
}

/// Drains the unembedded backlog: select up to N rows with a NULL embedding,
/// one batched embedding call per selection, write back conditioned on the
/// row still being unembedded. A whole-batch provider failure leaves the
/// batch untouched for the next invocation; the backlog is never silently
/// dropped.
pub struct EmbeddingBackfill {
    store: PostStore,
    embedder: Arc<dyn TextEmbedder>,
    batch_size: i64,
    max_batches: u32,
}

impl EmbeddingBackfill {
    pub fn new(store: PostStore, embedder: Arc<dyn TextEmbedder>) -> Self {
        Self {
            store,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            max_batches: DEFAULT_MAX_BATCHES,
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_batches(mut self, max_batches: u32) -> Self {
        self.max_batches = max_batches.max(1);
        self
    }

    /// Run until the backlog is empty or the batch ceiling is reached.
    pub async fn run(&self) -> Result<BackfillReport> {
        let mut processed = 0u64;

        for batch in 0..self.max_batches {
            let rows = self.store.select_unembedded(self.batch_size).await?;
            if rows.is_empty() {
                break;
            }

            let texts: Vec<String> = rows.iter().map(|r| r.text.clone()).collect();
            let vectors = match self.embedder.embed_batch(texts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    // Batch-scoped failure: nothing in this batch is marked
                    // embedded; it is picked up again next invocation.
                    warn!(batch, error = %e, "Embedding batch failed, leaving batch for retry");
                    break;
                }
            };

            if vectors.len() != rows.len() {
                warn!(
                    batch,
                    expected = rows.len(),
                    got = vectors.len(),
                    "Embedding batch returned wrong cardinality, leaving batch for retry"
                );
                break;
            }

            let writes: Vec<(Uuid, Vector)> = rows
                .iter()
                .zip(vectors)
                .map(|(row, vector)| (row.id, Vector::from(vector)))
                .collect();

            // The conditional write skips rows a concurrent run already
            // embedded, so double-processing is a no-op rather than a
            // clobber.
            let applied = self.store.write_embeddings(&writes).await?;
            processed += applied;

            info!(batch, applied, "Embedding batch written");
        }

        let remaining_estimate = self.store.count_unembedded().await?;

        Ok(BackfillReport {
            processed,
            remaining_estimate,
        })
    }
}
