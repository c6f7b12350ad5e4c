/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Feed load timed out: {0}")]
    Timeout(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Iteration limit exceeded after {pages} pages")]
    IterationLimit { pages: u32 },

    #[error(transparent)]
    Store(#[from] founderpulse_store::StoreError),
}

impl IngestError {
    /// Whether the caller can reasonably retry with backoff. The iteration
    /// limit is a safety valve that needs operator attention, and a bad
    /// owner reference will not fix itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, IngestError::Timeout(_) | IngestError::Navigation(_))
    }
}

impl From<browserless_client::BrowserlessError> for IngestError {
    fn from(err: browserless_client::BrowserlessError) -> Self {
        match err {
            browserless_client::BrowserlessError::Timeout(msg) => IngestError::Timeout(msg),
            other => IngestError::Navigation(other.to_string()),
        }
    }
}
