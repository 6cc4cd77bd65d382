use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::slot::{ResultSlot, SlotReceiver, result_slot};

// Ollama API request format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub stream: bool,
    pub options: GenerateOptions,
}

// Sampling options; low temperature keeps the ANSWER_n layout stable across batches
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct GenerateOptions {
    pub num_ctx: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: i32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            num_ctx: 8192,
            temperature: 0.1,
            top_p: 0.9,
            num_predict: -1,
        }
    }
}

// Ollama API response format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GenerateResponse {
    pub model: String,
    pub response: String,
}

// Gateway request/response bodies
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AskResponse {
    pub answer: String,
}

// One question waiting in the coordinator, plus the channel its answer goes back on
#[derive(Debug)]
pub struct PendingRequest {
    pub id: Uuid,
    pub question: String,
    pub arrived_at: Instant,
    pub slot: ResultSlot,
    pub context: String, // filled after retrieval
    pub prompt: String,  // filled after prompt assembly
}

impl PendingRequest {
    pub fn new(question: impl Into<String>) -> (Self, SlotReceiver) {
        let (slot, rx) = result_slot();
        let request = Self {
            id: Uuid::new_v4(),
            question: question.into(),
            arrived_at: Instant::now(),
            slot,
            context: String::new(),
            prompt: String::new(),
        };
        (request, rx)
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.is_fulfilled()
    }
}
