use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use founderpulse_common::Owner;
use founderpulse_store::{NewPost, PostStore};

use crate::error::Result;
use crate::paginator::FeedPager;
use crate::session::SessionFactory;

/// Max concurrent feed sessions. Each one holds a rendered browser page on
/// the backend; the automation surface is not reentrant within a session,
/// so concurrency only exists across entities.
const MAX_CONCURRENT_SESSIONS: usize = 2;

/// One profile to ingest.
#[derive(Debug, Clone)]
pub struct ScrapeTarget {
    pub owner: Owner,
    pub profile_url: String,
}

/// Outcome of one entity's ingestion run.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeReport {
    pub inserted: u64,
    pub skipped: u64,
    pub pages_loaded: u32,
}

/// Ingestion orchestrator: one feed session per entity, extracted candidates
/// upserted through the dedup constraint.
pub struct Ingestor {
    store: PostStore,
    sessions: Arc<dyn SessionFactory>,
    worker_bound: usize,
}

impl Ingestor {
    pub fn new(store: PostStore, sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            store,
            sessions,
            worker_bound: MAX_CONCURRENT_SESSIONS,
        }
    }

    pub fn with_worker_bound(mut self, worker_bound: usize) -> Self {
        self.worker_bound = worker_bound.max(1);
        self
    }

    /// Scrape one profile back to the cutoff date and store what it yields.
    pub async fn scrape_profile(
        &self,
        target: &ScrapeTarget,
        cutoff: DateTime<Utc>,
        max_pages: Option<u32>,
        cancel: &AtomicBool,
    ) -> Result<ScrapeReport> {
        let mut session = self.sessions.open(&target.profile_url);

        let mut pager = FeedPager::new(cutoff);
        if let Some(max_pages) = max_pages {
            pager = pager.with_max_pages(max_pages);
        }

        let harvest = pager.collect(session.as_mut(), cancel).await?;

        let posts: Vec<NewPost> = harvest
            .posts
            .into_iter()
            .map(|p| NewPost {
                source_url: p.source_url,
                text: p.text,
                posted_at: Some(p.posted_at),
            })
            .collect();

        let stats = self.store.insert_posts(&target.owner, &posts).await?;

        info!(
            owner = %target.owner,
            inserted = stats.inserted,
            skipped = stats.skipped,
            pages = harvest.pages_loaded,
            "Profile ingested"
        );

        Ok(ScrapeReport {
            inserted: stats.inserted,
            skipped: stats.skipped,
            pages_loaded: harvest.pages_loaded,
        })
    }

    /// Scrape a batch of profiles concurrently up to the worker bound. One
    /// entity's failure never aborts its siblings; each target gets its own
    /// result.
    pub async fn scrape_many(
        &self,
        targets: Vec<ScrapeTarget>,
        cutoff: DateTime<Utc>,
        cancel: &AtomicBool,
    ) -> Vec<(Owner, Result<ScrapeReport>)> {
        stream::iter(targets.into_iter().map(|target| async move {
            let result = self.scrape_profile(&target, cutoff, None, cancel).await;
            if let Err(ref e) = result {
                warn!(owner = %target.owner, error = %e, "Profile ingestion failed");
            }
            (target.owner, result)
        }))
        .buffer_unordered(self.worker_bound)
        .collect()
        .await
    }
}
