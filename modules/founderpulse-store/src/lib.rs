pub mod error;
pub mod store;
pub mod summaries;

pub use error::{Result, StoreError};
pub use store::{EmbeddedPost, InsertStats, Neighbor, NewPost, PostStore, UnembeddedPost};
pub use summaries::{StoredSummary, SummaryStore};
