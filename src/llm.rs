use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::load_balancer::LoadBalancer;
use crate::metrics::{LLM_CALLS, LLM_RETRIES};
use crate::models::{GenerateOptions, GenerateRequest, GenerateResponse};

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

// Exponential backoff: base_delay * 2^(attempt-1) between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "Request failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt, max_attempts, delay, e
                    );
                    LLM_RETRIES.inc();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

pub struct OllamaClient {
    client: reqwest::Client,
    load_balancer: Arc<LoadBalancer>,
    model: String,
    options: GenerateOptions,
    retry: RetryPolicy,
}

impl OllamaClient {
    pub fn new(
        client: reqwest::Client,
        load_balancer: Arc<LoadBalancer>,
        model: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            load_balancer,
            model: model.into(),
            options: GenerateOptions::default(),
            retry,
        }
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    async fn generate_once(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let backend = self.load_balancer.get_backend().ok_or(LlmError::NoBackend)?;
        debug!("Using backend {}", backend.url);

        let res = match self
            .client
            .post(format!("{}/api/generate", backend.url))
            .json(request)
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                // health checker brings it back once it answers again
                backend.set_healthy(false);
                warn!("Backend {} failed, marked unhealthy: {}", backend.url, e);
                return Err(LlmError::Transport(e));
            }
        };

        let status = res.status();
        if !status.is_success() {
            return Err(LlmError::Status(status));
        }

        let body: GenerateResponse = res
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        Ok(body.response)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        debug!("Sending prompt to Ollama (length: {} chars)", prompt.len());
        LLM_CALLS.inc();

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: self.options.clone(),
        };
        let response = self.retry.run(|| self.generate_once(&request)).await?;

        debug!("Received LLM response (length: {} chars)", response.len());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
        }
    }

    #[test]
    fn delay_doubles_each_attempt() {
        let p = policy(5);
        assert_eq!(p.delay_after(1), Duration::from_millis(100));
        assert_eq!(p.delay_after(2), Duration::from_millis(200));
        assert_eq!(p.delay_after(3), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = policy(3)
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(LlmError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_return_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(3)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LlmError::NoBackend)
            })
            .await;

        assert!(matches!(result, Err(LlmError::NoBackend)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(3)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LlmError::Status(reqwest::StatusCode::BAD_REQUEST))
            })
            .await;

        assert!(matches!(result, Err(LlmError::Status(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_backend_is_marked_unhealthy() {
        // port 9 (discard) on localhost is not expected to serve HTTP
        let lb = Arc::new(LoadBalancer::new("127.0.0.1:9").unwrap());
        let client = OllamaClient::new(
            reqwest::Client::builder().no_proxy().build().unwrap(),
            Arc::clone(&lb),
            "llama3.1",
            RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
            },
        );

        assert!(client.generate("hello").await.is_err());
        assert!(!lb.all_backends()[0].is_healthy());
    }
}
