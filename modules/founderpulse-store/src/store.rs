// Postgres persistence for scraped posts. The composite uniqueness rule
// lives in the schema (unique expression index over
// (COALESCE(founder_id, company_id), source_url)), not in application
// logic, so concurrent ingestion runs cannot race into duplicate rows.

use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::{PgPool, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use founderpulse_common::{Owner, TimeWindow};

use crate::error::{Result, StoreError};

#[derive(Clone)]
pub struct PostStore {
    pool: PgPool,
}

/// A candidate record headed for the posts table.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub source_url: String,
    pub text: String,
    pub posted_at: Option<DateTime<Utc>>,
}

/// Outcome of a batch insert: how many rows were new vs. already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertStats {
    pub inserted: u64,
    pub skipped: u64,
}

/// A row awaiting embedding backfill.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnembeddedPost {
    pub id: Uuid,
    pub text: String,
}

/// An embedded post within a query window.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmbeddedPost {
    pub id: Uuid,
    pub source_url: String,
    pub text: String,
    pub posted_at: DateTime<Utc>,
    pub embedding: Vector,
}

/// A nearest-neighbor hit from the embedded corpus.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Neighbor {
    pub id: Uuid,
    pub source_url: String,
    pub text: String,
    pub embedding: Vector,
    pub distance: f64,
}

impl PostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations. Not invoked by the service binary
    /// (schema provisioning belongs to the operator); tests and dev tooling
    /// call this explicitly.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        Ok(())
    }

    /// Set-based upsert of candidate records for one owner. Rows already
    /// present under `(owner, source_url)` are left untouched, so the first
    /// write wins and retried ingestion runs are idempotent. Fails with
    /// `UnknownOwner` when the owner reference does not resolve.
    pub async fn insert_posts(&self, owner: &Owner, posts: &[NewPost]) -> Result<InsertStats> {
        if posts.is_empty() {
            return Ok(InsertStats::default());
        }

        let mut qb = QueryBuilder::new(
            "INSERT INTO posts (founder_id, company_id, source_url, text, posted_at) ",
        );
        qb.push_values(posts, |mut b, post| {
            b.push_bind(owner.founder_id())
                .push_bind(owner.company_id())
                .push_bind(&post.source_url)
                .push_bind(&post.text)
                .push_bind(post.posted_at);
        });
        qb.push(" ON CONFLICT ((COALESCE(founder_id, company_id)), source_url) DO NOTHING");

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_insert(e, owner))?;

        let inserted = result.rows_affected();
        let stats = InsertStats {
            inserted,
            skipped: posts.len() as u64 - inserted,
        };

        debug!(
            owner = %owner,
            inserted = stats.inserted,
            skipped = stats.skipped,
            "Posts inserted"
        );

        Ok(stats)
    }

    /// Oldest rows still missing an embedding, up to `limit`.
    pub async fn select_unembedded(&self, limit: i64) -> Result<Vec<UnembeddedPost>> {
        let rows = sqlx::query_as::<_, UnembeddedPost>(
            r#"
            SELECT id, text FROM posts
            WHERE embedding IS NULL
            ORDER BY scraped_at, id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// How many rows still lack an embedding.
    pub async fn count_unembedded(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM posts WHERE embedding IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Write embeddings back, conditioned on the row still matching the
    /// selection predicate. A row embedded by a concurrent run (or inserted
    /// after the selection) is left alone and picked up on the next pass.
    /// Returns how many rows actually took the write.
    pub async fn write_embeddings(&self, embeddings: &[(Uuid, Vector)]) -> Result<u64> {
        let mut applied = 0u64;

        for (id, embedding) in embeddings {
            let result = sqlx::query(
                "UPDATE posts SET embedding = $2 WHERE id = $1 AND embedding IS NULL",
            )
            .bind(id)
            .bind(embedding)
            .execute(&self.pool)
            .await?;

            applied += result.rows_affected();
        }

        Ok(applied)
    }

    /// Embedded posts for one owner within a window, feed-descending.
    pub async fn embedded_in_window(
        &self,
        owner: &Owner,
        window: &TimeWindow,
    ) -> Result<Vec<EmbeddedPost>> {
        let rows = sqlx::query_as::<_, EmbeddedPost>(
            r#"
            SELECT id, source_url, text, posted_at, embedding
            FROM posts
            WHERE founder_id IS NOT DISTINCT FROM $1
              AND company_id IS NOT DISTINCT FROM $2
              AND embedding IS NOT NULL
              AND posted_at >= $3
              AND posted_at < $4
            ORDER BY posted_at DESC, id
            "#,
        )
        .bind(owner.founder_id())
        .bind(owner.company_id())
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Top-k cosine neighbors of a query vector across the whole embedded
    /// corpus. Ties on distance break by id so the ordering is stable for a
    /// fixed corpus state.
    pub async fn nearest_neighbors(&self, query: &Vector, k: i64) -> Result<Vec<Neighbor>> {
        let rows = sqlx::query_as::<_, Neighbor>(
            r#"
            SELECT id, source_url, text, embedding, (embedding <=> $1) AS distance
            FROM posts
            WHERE embedding IS NOT NULL
            ORDER BY (embedding <=> $1), id
            LIMIT $2
            "#,
        )
        .bind(query)
        .bind(k)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
