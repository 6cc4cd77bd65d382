#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rag_batcher::{
    BatchConfig, BatchCoordinator, LanguageModel, LlmError, Passage, PromptTemplate,
    RetrievalError, Retriever,
};

/// Text long enough to pass the default relevance thresholds.
pub fn relevant_text(topic: &str) -> String {
    format!(
        "{topic} is described at length in the ingested handbook, which covers its history, its design and the reasons behind it."
    )
}

#[derive(Default)]
pub struct MockRetriever {
    contexts: HashMap<String, Vec<Passage>>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl MockRetriever {
    /// Every question not listed here retrieves nothing.
    pub fn with_context(mut self, question: &str) -> Self {
        self.contexts
            .insert(question.to_string(), vec![Passage::new(relevant_text(question))]);
        self
    }

    pub fn failing_on(mut self, question: &str) -> Self {
        self.failing.insert(question.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    async fn relevant(&self, question: &str, _k: usize) -> Result<Vec<Passage>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(question) {
            return Err(RetrievalError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        }
        Ok(self.contexts.get(question).cloned().unwrap_or_default())
    }
}

type Reply = Box<dyn Fn(usize, &str) -> Result<String, LlmError> + Send + Sync>;

/// Language model double. Records every prompt it receives and answers via
/// a reply function given the call number (0-based) and the prompt.
pub struct MockLlm {
    reply: Reply,
    delay: Duration,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn new(reply: impl Fn(usize, &str) -> Result<String, LlmError> + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(reply),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fixed response for every call.
    pub fn replying(response: &str) -> Self {
        let response = response.to_string();
        Self::new(move |_, _| Ok(response.clone()))
    }

    /// Answers every question it finds in the prompt with "answer to <question>".
    pub fn echo() -> Self {
        Self::new(|_, prompt| Ok(echo_answers(prompt)))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for MockLlm {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len() - 1
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.reply)(call, prompt)
    }
}

fn echo_answers(prompt: &str) -> String {
    let combined: Vec<String> = prompt
        .lines()
        .filter_map(|line| line.strip_prefix("QUESTION_"))
        .filter_map(|rest| rest.split_once(": "))
        .map(|(n, question)| format!("ANSWER_{n}: answer to {question}"))
        .collect();
    if !combined.is_empty() {
        return combined.join("\n");
    }
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Question: "))
        .map(|question| format!("answer to {question}"))
        .unwrap_or_default()
}

pub fn config(max_batch_size: usize, batch_timeout: Duration) -> BatchConfig {
    BatchConfig {
        max_batch_size,
        batch_timeout,
        ..BatchConfig::default()
    }
}

pub fn coordinator(
    retriever: &Arc<MockRetriever>,
    llm: &Arc<MockLlm>,
    config: BatchConfig,
) -> Arc<BatchCoordinator> {
    Arc::new(BatchCoordinator::new(
        Arc::clone(retriever) as Arc<dyn Retriever>,
        Arc::clone(llm) as Arc<dyn LanguageModel>,
        PromptTemplate::default(),
        config,
    ))
}
