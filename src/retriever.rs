use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RetrievalError;

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Passage {
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub score: Option<f32>,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
            score: None,
        }
    }
}

// An empty result is not an error
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn relevant(&self, question: &str, k: usize) -> Result<Vec<Passage>, RetrievalError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relevance {
    Relevant(String),
    Insufficient(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelevancePolicy {
    // trimmed passages this short or shorter are dropped
    pub min_passage_chars: usize,
    pub min_context_chars: usize,
}

impl Default for RelevancePolicy {
    fn default() -> Self {
        Self {
            min_passage_chars: 50,
            min_context_chars: 100,
        }
    }
}

impl RelevancePolicy {
    pub fn assess(&self, passages: &[Passage]) -> Relevance {
        if passages.is_empty() {
            return Relevance::Insufficient("no documents found in the knowledge base");
        }

        let meaningful: Vec<&str> = passages
            .iter()
            .map(|p| p.text.as_str())
            .filter(|text| text.trim().chars().count() > self.min_passage_chars)
            .collect();
        if meaningful.is_empty() {
            return Relevance::Insufficient("no relevant documents found for this question");
        }

        let context = meaningful.join("\n");
        if context.trim().chars().count() > self.min_context_chars {
            Relevance::Relevant(context)
        } else {
            Relevance::Insufficient("retrieved context too short to answer from")
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<Passage>,
}

// Search service client -> POST {base}/search
pub struct HttpRetriever {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRetriever {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn relevant(&self, question: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        let res = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&SearchRequest { query: question, k })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(RetrievalError::Status(status));
        }

        let body: SearchResponse = res.json().await?;
        debug!("Retrieved {} passages", body.results.len());
        Ok(body.results)
    }
}
