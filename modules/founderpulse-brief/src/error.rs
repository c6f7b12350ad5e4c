/// Result type alias for retrieval/summarization operations.
pub type Result<T> = std::result::Result<T, BriefError>;

#[derive(Debug, thiserror::Error)]
pub enum BriefError {
    #[error(transparent)]
    Store(#[from] founderpulse_store::StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
