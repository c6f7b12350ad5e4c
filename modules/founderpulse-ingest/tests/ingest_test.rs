//! Integration tests for the ingestion path: pager → extractor → dedup store,
//! and the embedding backfill job. Requires a Postgres instance with pgvector.
//! Set DATABASE_TEST_URL or these tests are skipped.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use founderpulse_common::Owner;
use founderpulse_ingest::{
    EmbeddingBackfill, FeedSession, IngestError, Ingestor, ScrapeTarget, SessionFactory,
    TextEmbedder,
};
use founderpulse_store::PostStore;

// =========================================================================
// Harness
// =========================================================================

async fn test_store() -> Option<PostStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    let store = PostStore::new(pool.clone());
    store.migrate().await.ok()?;

    sqlx::query("TRUNCATE posts, summaries, founders, companies CASCADE")
        .execute(&pool)
        .await
        .ok()?;

    Some(store)
}

async fn seed_founder(pool: &PgPool, name: &str) -> Uuid {
    sqlx::query_scalar::<_, Uuid>("INSERT INTO founders (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("seed founder")
}

fn article(datetime: &str, id: &str) -> String {
    format!(
        r#"<article><time datetime="{datetime}"></time><a href="/feed/update/{id}">link</a><p>post {id}</p></article>"#
    )
}

/// Sessions scripted per profile URL. Loads past the end of the script
/// repeat the final page, like a real feed that has stopped growing.
struct ScriptedSession {
    profile_url: String,
    pages: Vec<String>,
    loads: usize,
}

#[async_trait]
impl FeedSession for ScriptedSession {
    fn profile_url(&self) -> &str {
        &self.profile_url
    }

    async fn load_more(&mut self) -> Result<String, IngestError> {
        if self.pages.is_empty() {
            return Err(IngestError::Navigation("profile not reachable".to_string()));
        }
        let idx = self.loads.min(self.pages.len() - 1);
        self.loads += 1;
        Ok(self.pages[idx].clone())
    }
}

/// Factory mapping profile URLs to canned page scripts. URLs with no script
/// produce sessions that fail navigation.
struct ScriptedFactory {
    feeds: HashMap<String, Vec<String>>,
}

impl SessionFactory for ScriptedFactory {
    fn open(&self, profile_url: &str) -> Box<dyn FeedSession> {
        Box::new(ScriptedSession {
            profile_url: profile_url.to_string(),
            pages: self.feeds.get(profile_url).cloned().unwrap_or_default(),
            loads: 0,
        })
    }
}

fn cutoff(y: i32, m: u32, d: u32) -> chrono::DateTime<Utc> {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

// =========================================================================
// Ingestion
// =========================================================================

#[tokio::test]
async fn rerunning_ingestion_is_idempotent() {
    let Some(store) = test_store().await else {
        return;
    };
    let owner = Owner::Founder(seed_founder(store.pool(), "Ada").await);

    let url = "https://www.linkedin.com/in/ada/recent-activity/";
    let page = format!(
        "{}{}",
        article("2024-03-01", "a1"),
        article("2024-02-15", "a2")
    );
    let factory = ScriptedFactory {
        feeds: HashMap::from([(url.to_string(), vec![page])]),
    };
    let ingestor = Ingestor::new(store.clone(), Arc::new(factory));

    let target = ScrapeTarget {
        owner,
        profile_url: url.to_string(),
    };
    let cancel = AtomicBool::new(false);

    let first = ingestor
        .scrape_profile(&target, cutoff(2023, 1, 1), None, &cancel)
        .await
        .unwrap();
    assert_eq!(first.inserted, 2);
    assert_eq!(first.skipped, 0);

    let second = ingestor
        .scrape_profile(&target, cutoff(2023, 1, 1), None, &cancel)
        .await
        .unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 2);
}

#[tokio::test]
async fn cutoff_bounds_what_gets_stored() {
    let Some(store) = test_store().await else {
        return;
    };
    let owner = Owner::Founder(seed_founder(store.pool(), "Ada").await);

    let url = "https://www.linkedin.com/in/ada/recent-activity/";
    let page = format!(
        "{}{}{}",
        article("2024-03-01", "a1"),
        article("2024-02-15", "a2"),
        article("2022-12-20", "a3"),
    );
    let factory = ScriptedFactory {
        feeds: HashMap::from([(url.to_string(), vec![page])]),
    };
    let ingestor = Ingestor::new(store.clone(), Arc::new(factory));

    let report = ingestor
        .scrape_profile(
            &ScrapeTarget {
                owner,
                profile_url: url.to_string(),
            },
            cutoff(2023, 1, 1),
            None,
            &AtomicBool::new(false),
        )
        .await
        .unwrap();

    assert_eq!(report.inserted, 2);

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn one_failing_profile_does_not_abort_siblings() {
    let Some(store) = test_store().await else {
        return;
    };
    let ada = Owner::Founder(seed_founder(store.pool(), "Ada").await);
    let grace = Owner::Founder(seed_founder(store.pool(), "Grace").await);

    let good_url = "https://www.linkedin.com/in/ada/recent-activity/";
    let bad_url = "https://www.linkedin.com/in/grace/recent-activity/";
    let factory = ScriptedFactory {
        // bad_url has no script, so its session fails navigation.
        feeds: HashMap::from([(good_url.to_string(), vec![article("2024-03-01", "a1")])]),
    };
    let ingestor = Ingestor::new(store.clone(), Arc::new(factory));

    let results = ingestor
        .scrape_many(
            vec![
                ScrapeTarget {
                    owner: ada,
                    profile_url: good_url.to_string(),
                },
                ScrapeTarget {
                    owner: grace,
                    profile_url: bad_url.to_string(),
                },
            ],
            cutoff(2023, 1, 1),
            &AtomicBool::new(false),
        )
        .await;

    assert_eq!(results.len(), 2);
    let by_owner: HashMap<Owner, bool> = results
        .into_iter()
        .map(|(owner, result)| (owner, result.is_ok()))
        .collect();
    assert!(by_owner[&ada]);
    assert!(!by_owner[&grace]);
}

// =========================================================================
// Embedding backfill
// =========================================================================

struct FakeEmbedder;

#[async_trait]
impl TextEmbedder for FakeEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.1; 1536]).collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl TextEmbedder for FailingEmbedder {
    async fn embed_batch(&self, _texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        Err(anyhow!("provider unavailable"))
    }
}

async fn seed_posts(store: &PostStore, owner: &Owner, n: usize) {
    let posts: Vec<founderpulse_store::NewPost> = (0..n)
        .map(|i| founderpulse_store::NewPost {
            source_url: format!("https://www.linkedin.com/feed/update/p{i}"),
            text: format!("post number {i}"),
            posted_at: Some(cutoff(2024, 1, 1)),
        })
        .collect();
    store.insert_posts(owner, &posts).await.unwrap();
}

#[tokio::test]
async fn backfill_drains_backlog_in_batches() {
    let Some(store) = test_store().await else {
        return;
    };
    let owner = Owner::Founder(seed_founder(store.pool(), "Ada").await);
    seed_posts(&store, &owner, 5).await;

    let backfill = EmbeddingBackfill::new(store.clone(), Arc::new(FakeEmbedder))
        .with_batch_size(2)
        .with_max_batches(10);

    let report = backfill.run().await.unwrap();
    assert_eq!(report.processed, 5);
    assert_eq!(report.remaining_estimate, 0);
}

#[tokio::test]
async fn provider_failure_leaves_backlog_for_retry() {
    let Some(store) = test_store().await else {
        return;
    };
    let owner = Owner::Founder(seed_founder(store.pool(), "Ada").await);
    seed_posts(&store, &owner, 3).await;

    let backfill = EmbeddingBackfill::new(store.clone(), Arc::new(FailingEmbedder));
    let report = backfill.run().await.unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.remaining_estimate, 3);

    // A later invocation with a healthy provider picks the batch up.
    let retry = EmbeddingBackfill::new(store.clone(), Arc::new(FakeEmbedder));
    let report = retry.run().await.unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.remaining_estimate, 0);
}

#[tokio::test]
async fn batch_ceiling_bounds_one_invocation() {
    let Some(store) = test_store().await else {
        return;
    };
    let owner = Owner::Founder(seed_founder(store.pool(), "Ada").await);
    seed_posts(&store, &owner, 5).await;

    let backfill = EmbeddingBackfill::new(store.clone(), Arc::new(FakeEmbedder))
        .with_batch_size(2)
        .with_max_batches(2);

    let report = backfill.run().await.unwrap();
    assert_eq!(report.processed, 4);
    assert_eq!(report.remaining_estimate, 1);
}
