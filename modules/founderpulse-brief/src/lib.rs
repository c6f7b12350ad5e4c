pub mod chunker;
pub mod error;
pub mod retrieval;
pub mod summarizer;

pub use chunker::chunk_text;
pub use error::{BriefError, Result};
pub use retrieval::{RetrievalChunk, RetrievalEngine, VectorIndex};
pub use summarizer::{agent_for_model, ModelOutcome, Summarizer};
