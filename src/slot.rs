use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::BatchError;

pub type SlotResult = Result<String, BatchError>;

pub fn result_slot() -> (ResultSlot, SlotReceiver) {
    let (tx, rx) = oneshot::channel();
    (ResultSlot { tx: Some(tx) }, SlotReceiver { rx })
}

// Producer half -> fulfilled at most once
#[derive(Debug)]
pub struct ResultSlot {
    tx: Option<oneshot::Sender<SlotResult>>,
}

impl ResultSlot {
    // false if already fulfilled or the caller stopped waiting
    pub fn fulfil(&mut self, result: SlotResult) -> bool {
        match self.tx.take() {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    pub fn discard(&mut self) {
        self.tx = None;
    }

    pub fn is_fulfilled(&self) -> bool {
        self.tx.is_none()
    }

    pub fn is_abandoned(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.is_closed())
    }
}

#[derive(Debug)]
pub struct SlotReceiver {
    rx: oneshot::Receiver<SlotResult>,
}

impl SlotReceiver {
    // A producer dropped without a value counts as cancellation
    pub async fn wait(self, timeout: Duration) -> SlotResult {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BatchError::Cancelled),
            Err(_) => Err(BatchError::Timeout(timeout)),
        }
    }
}
