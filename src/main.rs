use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use rag_batcher::config::Args;
use rag_batcher::coordinator::BatchCoordinator;
use rag_batcher::handlers;
use rag_batcher::llm::OllamaClient;
use rag_batcher::load_balancer::{LoadBalancer, health_checker};
use rag_batcher::logging::init_logging;
use rag_batcher::prompt::PromptTemplate;
use rag_batcher::rate_limit::RateLimiter;
use rag_batcher::retriever::HttpRetriever;
use rag_batcher::state::AppState;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);

    if let Err(e) = run(args).await {
        error!("Gateway failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let batch_config = args.batch_config()?;
    let retry = args.retry_policy()?;
    let load_balancer = Arc::new(LoadBalancer::new(&args.backends)?);

    // one pool shared by every batch's LLM call
    let llm_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.llm_timeout))
        .pool_idle_timeout(Duration::from_secs(300))
        .build()?;
    let retriever_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let llm = Arc::new(
        OllamaClient::new(
            llm_client.clone(),
            Arc::clone(&load_balancer),
            args.model.clone(),
            retry,
        )
        .with_options(args.generate_options()),
    );
    let retriever = Arc::new(HttpRetriever::new(retriever_client, args.retriever_url.clone()));

    let coordinator = Arc::new(BatchCoordinator::new(
        retriever,
        llm,
        PromptTemplate::default(),
        batch_config,
    ));
    coordinator.start().await;

    let shutdown = CancellationToken::new();
    let health_task = tokio::spawn(health_checker(
        Arc::clone(&load_balancer),
        llm_client,
        Duration::from_secs(args.health_interval),
        shutdown.clone(),
    ));

    let state = Arc::new(AppState {
        coordinator: Arc::clone(&coordinator),
        load_balancer,
        rate_limiter: RateLimiter::new(args.rate_limit, Duration::from_secs(args.rate_window)),
        request_timeout: args.request_timeout(),
    });
    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Gateway running on http://localhost:{}", args.port);
    info!("Forwarding to Ollama at {} (model {})", args.backends, args.model);
    info!("Retrieving context from {}", args.retriever_url);
    info!(
        "Batching up to {} questions per call, waiting at most {:?}",
        coordinator.config().max_batch_size,
        coordinator.config().batch_timeout
    );
    info!(
        "Rate limit: {} requests per {} seconds",
        args.rate_limit, args.rate_window
    );

    // fail queued questions before axum waits on their connections
    let signal_coordinator = Arc::clone(&coordinator);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_coordinator.stop().await;
        })
        .await;

    info!("Shutting down");
    coordinator.stop().await;
    shutdown.cancel();
    let _ = health_task.await;

    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
