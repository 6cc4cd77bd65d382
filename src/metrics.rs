use lazy_static::lazy_static;
use prometheus::{
    Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram,
    histogram_opts,
};

lazy_static! {
    pub static ref QUESTIONS_TOTAL: Counter =
        register_counter!("rag_questions_total", "Total number of submitted questions").unwrap();
    pub static ref ANSWER_LATENCY: Histogram = register_histogram!(
        "rag_answer_latency_seconds",
        "Time from submit to answer in seconds"
    )
    .unwrap();
    pub static ref BATCHES_TOTAL: Counter =
        register_counter!("rag_batches_total", "Total number of dispatched batches").unwrap();
    pub static ref BATCH_SIZE: Histogram = register_histogram!(histogram_opts!(
        "rag_batch_size",
        "Number of requests per dispatched batch",
        vec![1.0, 2.0, 3.0, 4.0, 6.0, 8.0, 12.0, 16.0]
    ))
    .unwrap();
    pub static ref LLM_CALLS: Counter =
        register_counter!("rag_llm_calls_total", "Total language model invocations").unwrap();
    pub static ref LLM_RETRIES: Counter =
        register_counter!("rag_llm_retries_total", "Language model calls retried after a transient failure").unwrap();
    pub static ref NO_CONTEXT_ANSWERS: Counter = register_counter!(
        "rag_no_context_answers_total",
        "Questions answered without the model because retrieval found nothing relevant"
    )
    .unwrap();
    pub static ref FALLBACK_ANSWERS: Counter = register_counter!(
        "rag_fallback_answers_total",
        "Answers substituted because the batch response could not be parsed"
    )
    .unwrap();
    pub static ref QUEUE_DEPTH: Gauge =
        register_gauge!("rag_queue_depth", "Questions waiting for a batch").unwrap();
}
