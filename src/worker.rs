use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::batch::BatchProcessor;
use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::metrics::QUEUE_DEPTH;
use crate::models::PendingRequest;

enum Dispatch {
    Done,
    Cancelled,
    Panicked(String),
}

// Background worker -> collects queued questions into batches bounded by
// size and time, and processes one batch at a time until shutdown.
pub async fn batch_worker(
    mut rx: mpsc::UnboundedReceiver<PendingRequest>,
    processor: BatchProcessor,
    config: BatchConfig,
    shutdown: CancellationToken,
) {
    info!(
        "Batch worker started (max batch size {}, batch timeout {:?})",
        config.max_batch_size, config.batch_timeout
    );

    'scheduler: loop {
        // Idle: block until the first question arrives
        let first = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            item = rx.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };
        QUEUE_DEPTH.dec();

        // Collecting: the window is measured from the first question's arrival
        let deadline = first.arrived_at + config.batch_timeout;
        let mut batch = vec![first];
        while batch.len() < config.max_batch_size {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    fail_unresolved(&mut batch, BatchError::Cancelled);
                    break 'scheduler;
                }
                item = rx.recv() => match item {
                    Some(item) => {
                        QUEUE_DEPTH.dec();
                        batch.push(item);
                    }
                    None => break,
                },
                _ = sleep_until(deadline) => break,
            }
        }
        debug!("Dispatching batch of {}", batch.len());

        // Dispatching
        let dispatch = {
            let processing = AssertUnwindSafe(processor.process(&mut batch)).catch_unwind();
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => Dispatch::Cancelled,
                outcome = processing => match outcome {
                    Ok(()) => Dispatch::Done,
                    Err(panic) => Dispatch::Panicked(panic_message(panic.as_ref())),
                },
            }
        };

        match dispatch {
            Dispatch::Done => {}
            Dispatch::Cancelled => {
                fail_unresolved(&mut batch, BatchError::Cancelled);
                break;
            }
            Dispatch::Panicked(message) => {
                error!("Error in batch worker: {}", message);
                fail_unresolved(
                    &mut batch,
                    BatchError::Upstream(format!("batch processing failed: {message}")),
                );
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(config.recovery_delay) => {}
                }
            }
        }
    }

    // ShuttingDown: nothing queued may be left without an answer
    rx.close();
    let mut cancelled = 0;
    while let Ok(mut item) = rx.try_recv() {
        QUEUE_DEPTH.dec();
        item.slot.fulfil(Err(BatchError::Cancelled));
        cancelled += 1;
    }
    info!("Batch worker stopped ({} queued requests cancelled)", cancelled);
}

fn fail_unresolved(batch: &mut [PendingRequest], error: BatchError) {
    for item in batch.iter_mut().filter(|item| !item.is_resolved()) {
        item.slot.fulfil(Err(error.clone()));
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
