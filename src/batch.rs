use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::llm::LanguageModel;
use crate::metrics::{BATCH_SIZE, BATCHES_TOTAL, NO_CONTEXT_ANSWERS};
use crate::models::PendingRequest;
use crate::parser::{FALLBACK_ANSWER, parse_batch_response};
use crate::prompt::{PromptTemplate, build_batch_prompt};
use crate::retriever::{Relevance, RelevancePolicy, Retriever};

pub const NO_INFORMATION_ANSWER: &str = "I don't have information about this topic in my knowledge base. Please ensure you've ingested relevant documents first.";

pub struct BatchProcessor {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    top_k: usize,
    relevance: RelevancePolicy,
}

impl BatchProcessor {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        llm: Arc<dyn LanguageModel>,
        template: PromptTemplate,
        config: &BatchConfig,
    ) -> Self {
        Self {
            retriever,
            llm,
            template,
            top_k: config.top_k,
            relevance: config.relevance,
        }
    }

    // Answers are matched to requests by position in the batch
    pub async fn process(&self, batch: &mut [PendingRequest]) {
        info!("Processing batch of {} requests", batch.len());
        BATCHES_TOTAL.inc();
        BATCH_SIZE.observe(batch.len() as f64);

        for item in batch.iter_mut().filter(|item| item.slot.is_abandoned()) {
            debug!(id = %item.id, "Caller already gave up, skipping");
            item.slot.discard();
        }

        self.retrieve_contexts(batch).await;

        let survivors: Vec<usize> = (0..batch.len())
            .filter(|&i| !batch[i].is_resolved())
            .collect();

        match survivors.as_slice() {
            [] => debug!("No questions left for the language model in this batch"),
            [only] => self.answer_single(&mut batch[*only]).await,
            _ => self.answer_combined(batch, &survivors).await,
        }
    }

    // Retrieval runs concurrently for the whole batch; requests without
    // relevant context are answered here and never reach the model.
    async fn retrieve_contexts(&self, batch: &mut [PendingRequest]) {
        let pending: Vec<usize> = (0..batch.len())
            .filter(|&i| !batch[i].is_resolved())
            .collect();

        let results = join_all(
            pending
                .iter()
                .map(|&i| self.retriever.relevant(&batch[i].question, self.top_k)),
        )
        .await;

        for (&i, result) in pending.iter().zip(results) {
            let item = &mut batch[i];
            match result {
                Ok(passages) => match self.relevance.assess(&passages) {
                    Relevance::Relevant(context) => {
                        item.prompt = self.template.format(&context, &item.question);
                        item.context = context;
                    }
                    Relevance::Insufficient(reason) => {
                        info!(id = %item.id, "No relevant content: {}", reason);
                        NO_CONTEXT_ANSWERS.inc();
                        item.slot.fulfil(Ok(NO_INFORMATION_ANSWER.to_string()));
                    }
                },
                Err(e) => {
                    error!(id = %item.id, "Error retrieving context: {}", e);
                    item.slot.fulfil(Err(e.into()));
                }
            }
        }
    }

    // A batch of one skips the marker layout and uses the plain template prompt.
    async fn answer_single(&self, item: &mut PendingRequest) {
        debug!(id = %item.id, "Single question in batch, sending its prompt directly");
        let result = match self.llm.generate(&item.prompt).await {
            Ok(response) => {
                let answer = response.trim();
                if answer.is_empty() {
                    warn!(id = %item.id, "Language model returned an empty answer");
                    Ok(FALLBACK_ANSWER.to_string())
                } else {
                    Ok(answer.to_string())
                }
            }
            Err(e) => {
                error!(id = %item.id, "Error in LLM call: {}", e);
                Err(BatchError::from(e))
            }
        };
        item.slot.fulfil(result);
    }

    async fn answer_combined(&self, batch: &mut [PendingRequest], survivors: &[usize]) {
        let prompt = {
            let items: Vec<&PendingRequest> = survivors.iter().map(|&i| &batch[i]).collect();
            build_batch_prompt(&items)
        };

        info!("Sending batch prompt to LLM for {} questions", survivors.len());
        match self.llm.generate(&prompt).await {
            Ok(response) => {
                let answers = parse_batch_response(&response, survivors.len());
                for (&i, answer) in survivors.iter().zip(answers) {
                    batch[i].slot.fulfil(Ok(answer));
                }
            }
            Err(e) => {
                error!("Error in batch LLM call: {}", e);
                let err = BatchError::from(e);
                for &i in survivors {
                    batch[i].slot.fulfil(Err(err.clone()));
                }
            }
        }
    }
}
