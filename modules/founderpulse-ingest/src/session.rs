use std::sync::Arc;

use async_trait::async_trait;
use browserless_client::BrowserlessClient;
use tracing::info;

use crate::error::Result;

// --- FeedSession trait ---

/// One entity's live feed session. Each `load_more` triggers the next round
/// of scroll-driven lazy loading and returns the rendered DOM, which is
/// cumulative: earlier posts stay in the document as new ones appear.
/// Implementations are not reentrant; the pager keeps a single load in
/// flight at a time.
#[async_trait]
pub trait FeedSession: Send {
    fn profile_url(&self) -> &str;
    async fn load_more(&mut self) -> Result<String>;
}

/// Opens feed sessions. Seam between the ingest runner and the browser
/// backend so tests can script sessions.
pub trait SessionFactory: Send + Sync {
    fn open(&self, profile_url: &str) -> Box<dyn FeedSession>;
}

// --- Browserless-backed session ---

/// Pause after each scroll for lazy-loaded content to land.
const SETTLE_MS: u64 = 1200;

pub struct BrowserlessFeedSession {
    client: Arc<BrowserlessClient>,
    profile_url: String,
    rounds: u32,
}

impl BrowserlessFeedSession {
    pub fn new(client: Arc<BrowserlessClient>, profile_url: impl Into<String>) -> Self {
        Self {
            client,
            profile_url: profile_url.into(),
            rounds: 0,
        }
    }
}

#[async_trait]
impl FeedSession for BrowserlessFeedSession {
    fn profile_url(&self) -> &str {
        &self.profile_url
    }

    async fn load_more(&mut self) -> Result<String> {
        self.rounds += 1;
        info!(
            url = %self.profile_url,
            round = self.rounds,
            "Loading next feed page"
        );

        let html = self
            .client
            .scroll_content(&self.profile_url, self.rounds, SETTLE_MS)
            .await?;

        Ok(html)
    }
}

impl SessionFactory for Arc<BrowserlessClient> {
    fn open(&self, profile_url: &str) -> Box<dyn FeedSession> {
        Box::new(BrowserlessFeedSession::new(self.clone(), profile_url))
    }
}
