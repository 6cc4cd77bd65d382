//! The batch coordinator: the entry point gateways call with one question at
//! a time, and the owner of the background scheduling loop.
//!
//! ```text
//! submit() ──► queue ──► batch_worker ──► BatchProcessor ──► LanguageModel
//!    ▲                     (size/time        (retrieval,        (one call
//!    │                      bounded)          prompt, parse)     per batch)
//!    └──────────── result slot ◄──────────────────┘
//! ```

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::batch::BatchProcessor;
use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::llm::LanguageModel;
use crate::metrics::{ANSWER_LATENCY, QUESTIONS_TOTAL, QUEUE_DEPTH};
use crate::models::PendingRequest;
use crate::prompt::PromptTemplate;
use crate::retriever::Retriever;
use crate::worker::batch_worker;

enum Lifecycle {
    Ready {
        rx: mpsc::UnboundedReceiver<PendingRequest>,
        processor: BatchProcessor,
    },
    Running(JoinHandle<()>),
    Stopped,
}

/// Coalesces concurrent questions into combined language-model calls.
///
/// Construct once, call [`start`](Self::start), share behind an `Arc`, and
/// call [`stop`](Self::stop) on shutdown. Questions submitted before `start`
/// wait in the queue; questions submitted after `stop` fail with
/// [`BatchError::Cancelled`].
pub struct BatchCoordinator {
    tx: mpsc::UnboundedSender<PendingRequest>,
    config: BatchConfig,
    shutdown: CancellationToken,
    running: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

impl BatchCoordinator {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        llm: Arc<dyn LanguageModel>,
        template: PromptTemplate,
        config: BatchConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let processor = BatchProcessor::new(retriever, llm, template, &config);
        Self {
            tx,
            config,
            shutdown: CancellationToken::new(),
            running: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle::Ready { rx, processor }),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the scheduling loop. No-op if already running or stopped.
    pub async fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        match mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Ready { rx, processor } => {
                let handle = tokio::spawn(batch_worker(
                    rx,
                    processor,
                    self.config,
                    self.shutdown.clone(),
                ));
                *lifecycle = Lifecycle::Running(handle);
                self.running.store(true, Ordering::SeqCst);
                info!("Batch coordinator started");
            }
            other => *lifecycle = other,
        }
    }

    /// Stop the scheduling loop and fail every unanswered question with
    /// [`BatchError::Cancelled`]. Safe to call more than once.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let mut lifecycle = self.lifecycle.lock().await;
        match mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(handle) => {
                if let Err(e) = handle.await {
                    error!("Batch worker task failed: {}", e);
                }
                info!("Batch coordinator stopped");
            }
            Lifecycle::Ready { mut rx, .. } => {
                rx.close();
                while let Ok(mut item) = rx.try_recv() {
                    QUEUE_DEPTH.dec();
                    item.slot.fulfil(Err(BatchError::Cancelled));
                }
                info!("Batch coordinator stopped before it was started");
            }
            Lifecycle::Stopped => {}
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Queue a question and wait for its answer, at most `timeout`.
    ///
    /// An "insufficient information" reply is a successful answer. Errors are
    /// `Timeout`, `Upstream` (retrieval or model failure for this question's
    /// batch), `Cancelled` and `EmptyQuestion`.
    pub async fn submit(&self, question: &str, timeout: Duration) -> Result<String, BatchError> {
        if question.trim().is_empty() {
            return Err(BatchError::EmptyQuestion);
        }
        if self.shutdown.is_cancelled() {
            return Err(BatchError::Cancelled);
        }
        QUESTIONS_TOTAL.inc();

        let started = Instant::now();
        let (request, rx) = PendingRequest::new(question);
        let id = request.id;

        QUEUE_DEPTH.inc();
        if self.tx.send(request).is_err() {
            QUEUE_DEPTH.dec();
            return Err(BatchError::Cancelled);
        }
        debug!(%id, "Added question to batch queue: {}", preview(question));

        let result = rx.wait(timeout).await;
        match &result {
            Ok(_) => ANSWER_LATENCY.observe(started.elapsed().as_secs_f64()),
            Err(e) => warn!(%id, "Question not answered: {}", e),
        }
        result
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 50;
    if text.chars().count() > MAX {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    } else {
        text.to_string()
    }
}
