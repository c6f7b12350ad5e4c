use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};
use crate::extractor::{extract_posts, ExtractedPost};
use crate::session::FeedSession;

/// Hard ceiling on loads per session. A feed that keeps yielding new posts
/// past this many pages is treated as stuck, not as very prolific.
const MAX_PAGES_PER_SESSION: u32 = 40;

/// Bound on a single load-and-settle wait.
const LOAD_TIMEOUT: Duration = Duration::from_secs(45);

/// Why a session stopped paginating normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A post older than the cutoff date was reached.
    CutoffReached,
    /// A load revealed no posts we had not already seen.
    FeedExhausted,
    /// The caller cancelled between page loads.
    Cancelled,
}

/// Pagination states. ERROR is not listed: it is the `Err` arm of
/// `collect`, reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PagerState {
    Init,
    Loading,
    Extracting,
    Continue,
    Stop(StopReason),
    Done(StopReason),
}

/// What a completed session accumulated.
#[derive(Debug)]
pub struct Harvest {
    /// Posts in feed-descending order as encountered. Never re-sorted.
    pub posts: Vec<ExtractedPost>,
    pub pages_loaded: u32,
    pub stop: StopReason,
}

/// Bounded pagination controller: drives a feed session load by load,
/// extracts candidates, and stops at the caller's date cutoff, on feed
/// exhaustion, or at the page ceiling.
pub struct FeedPager {
    cutoff: DateTime<Utc>,
    max_pages: u32,
    load_timeout: Duration,
}

impl FeedPager {
    pub fn new(cutoff: DateTime<Utc>) -> Self {
        Self {
            cutoff,
            max_pages: MAX_PAGES_PER_SESSION,
            load_timeout: LOAD_TIMEOUT,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_load_timeout(mut self, load_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self
    }

    /// Run the session to a terminal state. Cancellation is checked at the
    /// top of LOADING, so a cancel mid-wait is honored once the current wait
    /// resolves or times out.
    pub async fn collect(
        &self,
        session: &mut dyn FeedSession,
        cancel: &AtomicBool,
    ) -> Result<Harvest> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut harvest: Vec<ExtractedPost> = Vec::new();
        let mut pages_loaded = 0u32;
        let mut page_html = String::new();
        let mut state = PagerState::Init;

        loop {
            state = match state {
                PagerState::Init => {
                    debug!(url = session.profile_url(), cutoff = %self.cutoff, "Feed session starting");
                    PagerState::Loading
                }

                PagerState::Loading => {
                    if cancel.load(Ordering::Relaxed) {
                        info!(url = session.profile_url(), "Feed session cancelled");
                        PagerState::Stop(StopReason::Cancelled)
                    } else if pages_loaded >= self.max_pages {
                        return Err(IngestError::IterationLimit {
                            pages: pages_loaded,
                        });
                    } else {
                        page_html = tokio::time::timeout(self.load_timeout, session.load_more())
                            .await
                            .map_err(|_| {
                                IngestError::Timeout(format!(
                                    "no settled page after {:?}",
                                    self.load_timeout
                                ))
                            })??;
                        pages_loaded += 1;
                        PagerState::Extracting
                    }
                }

                PagerState::Extracting => {
                    let candidates = extract_posts(&page_html, session.profile_url());

                    if candidates.is_empty() && !page_html.trim().is_empty() {
                        // Markup drift: the page rendered something we no
                        // longer recognize. Not fatal to the run.
                        warn!(
                            url = session.profile_url(),
                            page = pages_loaded,
                            "Feed structure mismatch: no posts matched on a non-empty page"
                        );
                    }

                    // The DOM is cumulative under lazy-load, so "new" means
                    // a source_url we have not seen this session.
                    let fresh: Vec<ExtractedPost> = candidates
                        .into_iter()
                        .filter(|p| seen.insert(p.source_url.clone()))
                        .collect();

                    match fresh.iter().position(|p| p.posted_at < self.cutoff) {
                        Some(idx) => {
                            // The feed is assumed to render in descending
                            // chronological order, so everything from the
                            // first past-cutoff post onward is discarded.
                            harvest.extend(fresh.into_iter().take(idx));
                            PagerState::Stop(StopReason::CutoffReached)
                        }
                        None if fresh.is_empty() => PagerState::Stop(StopReason::FeedExhausted),
                        None => {
                            harvest.extend(fresh);
                            PagerState::Continue
                        }
                    }
                }

                PagerState::Continue => PagerState::Loading,

                PagerState::Stop(reason) => PagerState::Done(reason),

                PagerState::Done(reason) => {
                    info!(
                        url = session.profile_url(),
                        posts = harvest.len(),
                        pages = pages_loaded,
                        stop = ?reason,
                        "Feed session done"
                    );
                    return Ok(Harvest {
                        posts: harvest,
                        pages_loaded,
                        stop: reason,
                    });
                }
            };
        }
    }
}
