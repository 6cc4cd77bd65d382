use clap::Parser;
use std::time::Duration;

use crate::error::ConfigError;
use crate::llm::RetryPolicy;
use crate::models::GenerateOptions;
use crate::retriever::RelevancePolicy;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "rag-batcher")]
#[command(about = "Retrieval-augmented QA gateway that batches questions into shared LLM calls")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Ollama backends (comma-separated)
    // Example: "localhost:11434,localhost:11435"
    #[arg(short, long, default_value = "localhost:11434")]
    pub backends: String,

    // Model name passed to Ollama
    #[arg(short, long, default_value = "llama3.1")]
    pub model: String,

    // Context window passed to Ollama
    #[arg(long, default_value_t = 8192)]
    pub num_ctx: u32,

    // Sampling temperature passed to Ollama
    #[arg(long, default_value_t = 0.1)]
    pub temperature: f32,

    // Base URL of the search service used for retrieval
    #[arg(long, default_value = "http://localhost:8001")]
    pub retriever_url: String,

    // Passages requested per question
    #[arg(long, default_value_t = 4)]
    pub top_k: usize,

    // Max questions per combined LLM call
    #[arg(long, default_value_t = 3)]
    pub batch_size: usize,

    // Max wait after the first queued question before dispatching
    #[arg(long, default_value_t = 2000)]
    pub batch_timeout_ms: u64,

    // Per-question deadline in seconds
    #[arg(long, default_value_t = 300)]
    pub request_timeout: u64,

    // HTTP timeout for a single LLM call in seconds
    #[arg(long, default_value_t = 300)]
    pub llm_timeout: u64,

    // Attempts per LLM call, including the first
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    // Base backoff between LLM attempts, doubled each retry
    #[arg(long, default_value_t = 1000)]
    pub retry_base_ms: u64,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 10)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_window: u64,

    // Health check interval in seconds
    #[arg(long, default_value_t = 30)]
    pub health_interval: u64,

    // Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn batch_config(&self) -> Result<BatchConfig, ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Zero("batch size"));
        }
        if self.batch_timeout_ms == 0 {
            return Err(ConfigError::Zero("batch timeout"));
        }
        Ok(BatchConfig {
            max_batch_size: self.batch_size,
            batch_timeout: Duration::from_millis(self.batch_timeout_ms),
            top_k: self.top_k,
            relevance: RelevancePolicy::default(),
            ..BatchConfig::default()
        })
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Zero("max attempts"));
        }
        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_base_ms),
        })
    }

    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            num_ctx: self.num_ctx,
            temperature: self.temperature,
            ..GenerateOptions::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

// Scheduling and retrieval settings for the batch coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub max_batch_size: usize,
    pub batch_timeout: Duration,
    pub top_k: usize,
    pub relevance: RelevancePolicy,
    // pause after a batch fails unexpectedly
    pub recovery_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 3,
            batch_timeout: Duration::from_secs(2),
            top_k: 4,
            relevance: RelevancePolicy::default(),
            recovery_delay: Duration::from_secs(1),
        }
    }
}
