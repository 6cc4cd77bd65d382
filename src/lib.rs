pub mod batch;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod load_balancer;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod prompt;
pub mod rate_limit;
pub mod retriever;
pub mod slot;
pub mod state;
pub mod worker;

pub use batch::NO_INFORMATION_ANSWER;
pub use config::{Args, BatchConfig};
pub use coordinator::BatchCoordinator;
pub use error::{BatchError, LlmError, RetrievalError};
pub use llm::{LanguageModel, OllamaClient, RetryPolicy};
pub use parser::{FALLBACK_ANSWER, parse_batch_response};
pub use prompt::PromptTemplate;
pub use retriever::{HttpRetriever, Passage, Retriever};
