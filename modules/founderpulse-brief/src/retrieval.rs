use std::collections::HashMap;

use async_trait::async_trait;
use pgvector::Vector;
use tracing::debug;
use uuid::Uuid;

use founderpulse_common::{Owner, TimeWindow};
use founderpulse_store::{EmbeddedPost, Neighbor, PostStore, StoreError};

use crate::chunker::{chunk_text, MAX_CHUNK_CHARS};
use crate::error::Result;

/// Neighbors pulled per in-window post. System-wide, not window-restricted,
/// so summaries can draw context from outside the period.
const TOP_K_NEIGHBORS: i64 = 5;

/// Embedding cosine similarity above which two chunks are treated as
/// near-duplicates; the lower-scoring one is dropped.
const NEAR_DUP_SIMILARITY: f64 = 0.97;

// --- VectorIndex trait ---

/// The slice of the store retrieval needs. A seam so the engine's ordering
/// and dedup behavior can be exercised against an in-memory corpus.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn embedded_in_window(
        &self,
        owner: &Owner,
        window: &TimeWindow,
    ) -> std::result::Result<Vec<EmbeddedPost>, StoreError>;

    async fn nearest_neighbors(
        &self,
        query: &Vector,
        k: i64,
    ) -> std::result::Result<Vec<Neighbor>, StoreError>;
}

#[async_trait]
impl VectorIndex for PostStore {
    async fn embedded_in_window(
        &self,
        owner: &Owner,
        window: &TimeWindow,
    ) -> std::result::Result<Vec<EmbeddedPost>, StoreError> {
        PostStore::embedded_in_window(self, owner, window).await
    }

    async fn nearest_neighbors(
        &self,
        query: &Vector,
        k: i64,
    ) -> std::result::Result<Vec<Neighbor>, StoreError> {
        PostStore::nearest_neighbors(self, query, k).await
    }
}

// --- Retrieval ---

/// A slice of one post's text with its similarity score against the query
/// corpus. Lives only within one retrieval call.
#[derive(Debug, Clone)]
pub struct RetrievalChunk {
    pub post_id: Uuid,
    pub source_url: String,
    pub text: String,
    pub score: f64,
}

/// Nearest-neighbor retrieval with near-duplicate suppression. For a fixed
/// corpus state the output ordering is stable: score descending, ties broken
/// by post id.
pub struct RetrievalEngine<I> {
    index: I,
    top_k: i64,
    near_dup_similarity: f64,
}

impl<I: VectorIndex> RetrievalEngine<I> {
    pub fn new(index: I) -> Self {
        Self {
            index,
            top_k: TOP_K_NEIGHBORS,
            near_dup_similarity: NEAR_DUP_SIMILARITY,
        }
    }

    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_near_dup_similarity(mut self, threshold: f64) -> Self {
        self.near_dup_similarity = threshold;
        self
    }

    /// Fetch context for `(owner, window)`: each embedded in-window post
    /// seeds a corpus-wide neighbor search; neighbor lists merge keeping
    /// each post's best distance; near-duplicates collapse onto the
    /// higher-scoring survivor.
    pub async fn retrieve(&self, owner: &Owner, window: &TimeWindow) -> Result<Vec<RetrievalChunk>> {
        let seeds = self.index.embedded_in_window(owner, window).await?;
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        // Merge neighbor lists, keeping the best (smallest) distance per post.
        let mut best: HashMap<Uuid, Neighbor> = HashMap::new();
        for seed in &seeds {
            let neighbors = self.index.nearest_neighbors(&seed.embedding, self.top_k).await?;
            for neighbor in neighbors {
                match best.get(&neighbor.id) {
                    Some(existing) if existing.distance <= neighbor.distance => {}
                    _ => {
                        best.insert(neighbor.id, neighbor);
                    }
                }
            }
        }

        let mut ranked: Vec<Neighbor> = best.into_values().collect();
        ranked.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        // Near-duplicate suppression: walk the ranked list and drop anything
        // too close to an already-kept post. Ranked order means the survivor
        // is always the higher-scoring one.
        let mut kept: Vec<Neighbor> = Vec::new();
        for candidate in ranked {
            let duplicate = kept.iter().any(|k| {
                cosine_similarity(k.embedding.as_slice(), candidate.embedding.as_slice())
                    > self.near_dup_similarity
            });
            if !duplicate {
                kept.push(candidate);
            }
        }

        debug!(
            owner = %owner,
            seeds = seeds.len(),
            chunks = kept.len(),
            "Retrieval complete"
        );

        let chunks = kept
            .into_iter()
            .flat_map(|n| {
                let score = 1.0 - n.distance;
                chunk_text(&n.text, MAX_CHUNK_CHARS)
                    .into_iter()
                    .map(move |text| RetrievalChunk {
                        post_id: n.id,
                        source_url: n.source_url.clone(),
                        text,
                        score,
                    })
            })
            .collect();

        Ok(chunks)
    }
}

/// Cosine similarity of two equal-width vectors; 0.0 when either is zero.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn vector(values: &[f32]) -> Vector {
        Vector::from(values.to_vec())
    }

    fn window() -> TimeWindow {
        TimeWindow::from_dates(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        )
    }

    /// In-memory corpus: in-window seeds plus a full corpus searched by
    /// brute-force cosine distance with the same tie rule as the store.
    struct FakeIndex {
        seeds: Vec<EmbeddedPost>,
        corpus: Vec<(Uuid, String, Vector)>,
    }

    impl FakeIndex {
        fn post(id: u128, text: &str, embedding: &[f32]) -> (Uuid, String, Vector) {
            (
                Uuid::from_u128(id),
                text.to_string(),
                vector(embedding),
            )
        }
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn embedded_in_window(
            &self,
            _owner: &Owner,
            _window: &TimeWindow,
        ) -> std::result::Result<Vec<EmbeddedPost>, StoreError> {
            Ok(self.seeds.clone())
        }

        async fn nearest_neighbors(
            &self,
            query: &Vector,
            k: i64,
        ) -> std::result::Result<Vec<Neighbor>, StoreError> {
            let mut neighbors: Vec<Neighbor> = self
                .corpus
                .iter()
                .map(|(id, text, embedding)| Neighbor {
                    id: *id,
                    source_url: format!("https://example.com/feed/update/{id}"),
                    text: text.clone(),
                    embedding: embedding.clone(),
                    distance: 1.0 - cosine_similarity(query.as_slice(), embedding.as_slice()),
                })
                .collect();
            neighbors.sort_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap()
                    .then_with(|| a.id.cmp(&b.id))
            });
            neighbors.truncate(k as usize);
            Ok(neighbors)
        }
    }

    fn seed(id: u128, embedding: &[f32]) -> EmbeddedPost {
        EmbeddedPost {
            id: Uuid::from_u128(id),
            source_url: format!("https://example.com/feed/update/{id}"),
            text: format!("seed {id}"),
            posted_at: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
                .and_utc(),
            embedding: vector(embedding),
        }
    }

    #[tokio::test]
    async fn retrieval_is_deterministic() {
        let index = FakeIndex {
            seeds: vec![seed(1, &[1.0, 0.0, 0.0]), seed(2, &[0.0, 1.0, 0.0])],
            corpus: vec![
                FakeIndex::post(1, "about rust", &[1.0, 0.0, 0.0]),
                FakeIndex::post(2, "about hiring", &[0.0, 1.0, 0.0]),
                FakeIndex::post(3, "about funding", &[0.6, 0.8, 0.0]),
                FakeIndex::post(4, "about travel", &[0.0, 0.0, 1.0]),
            ],
        };
        let engine = RetrievalEngine::new(index).with_top_k(3);

        let owner = Owner::Founder(Uuid::from_u128(99));
        let first = engine.retrieve(&owner, &window()).await.unwrap();
        let second = engine.retrieve(&owner, &window()).await.unwrap();

        assert!(!first.is_empty());
        let first_ids: Vec<Uuid> = first.iter().map(|c| c.post_id).collect();
        let second_ids: Vec<Uuid> = second.iter().map(|c| c.post_id).collect();
        assert_eq!(first_ids, second_ids);

        // Scores are descending.
        for pair in first.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn near_duplicates_collapse_to_higher_scorer() {
        // Posts 2 and 3 are nearly identical vectors; only one survives.
        let index = FakeIndex {
            seeds: vec![seed(1, &[1.0, 0.0, 0.0])],
            corpus: vec![
                FakeIndex::post(1, "the seed itself", &[1.0, 0.0, 0.0]),
                FakeIndex::post(2, "release day!", &[0.9, 0.1, 0.0]),
                FakeIndex::post(3, "release day!!", &[0.91, 0.1, 0.0]),
            ],
        };
        let engine = RetrievalEngine::new(index).with_top_k(3);

        let owner = Owner::Founder(Uuid::from_u128(99));
        let chunks = engine.retrieve(&owner, &window()).await.unwrap();

        let ids: Vec<Uuid> = chunks.iter().map(|c| c.post_id).collect();
        assert!(ids.contains(&Uuid::from_u128(1)));
        // Exactly one of the twins survives, and it is the closer one.
        let twins: Vec<Uuid> = ids
            .iter()
            .copied()
            .filter(|id| *id == Uuid::from_u128(2) || *id == Uuid::from_u128(3))
            .collect();
        assert_eq!(twins.len(), 1);
    }

    #[tokio::test]
    async fn neighbors_reach_outside_the_window() {
        // The corpus post has no in-window presence but is semantically
        // close to the seed, so it still comes back as context.
        let index = FakeIndex {
            seeds: vec![seed(1, &[1.0, 0.0, 0.0])],
            corpus: vec![
                FakeIndex::post(1, "seed", &[1.0, 0.0, 0.0]),
                FakeIndex::post(7, "older related post", &[0.95, 0.05, 0.0]),
            ],
        };
        let engine = RetrievalEngine::new(index)
            .with_top_k(2)
            .with_near_dup_similarity(1.1); // disable dedup for this test

        let owner = Owner::Founder(Uuid::from_u128(99));
        let chunks = engine.retrieve(&owner, &window()).await.unwrap();
        let ids: Vec<Uuid> = chunks.iter().map(|c| c.post_id).collect();
        assert!(ids.contains(&Uuid::from_u128(7)));
    }

    #[tokio::test]
    async fn empty_window_yields_no_chunks() {
        let index = FakeIndex {
            seeds: Vec::new(),
            corpus: vec![FakeIndex::post(1, "anything", &[1.0, 0.0, 0.0])],
        };
        let engine = RetrievalEngine::new(index);

        let owner = Owner::Founder(Uuid::from_u128(99));
        let chunks = engine.retrieve(&owner, &window()).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
    }
}
