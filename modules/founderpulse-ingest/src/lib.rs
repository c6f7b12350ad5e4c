pub mod backfill;
pub mod embedder;
pub mod error;
pub mod extractor;
pub mod paginator;
pub mod runner;
pub mod session;

pub use backfill::{BackfillReport, EmbeddingBackfill};
pub use embedder::{Embedder, TextEmbedder};
pub use error::{IngestError, Result};
pub use extractor::{extract_posts, ExtractedPost};
pub use paginator::{FeedPager, Harvest, StopReason};
pub use runner::{Ingestor, ScrapeReport, ScrapeTarget};
pub use session::{BrowserlessFeedSession, FeedSession, SessionFactory};
