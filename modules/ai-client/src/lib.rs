pub mod claude;
pub mod openai;
pub mod traits;

pub use claude::Claude;
pub use openai::OpenAi;
pub use traits::{ChatAgent, EmbedAgent};
