use std::sync::Arc;
use std::time::Duration;

use crate::coordinator::BatchCoordinator;
use crate::load_balancer::LoadBalancer;
use crate::rate_limit::RateLimiter;

// app's shared state
pub struct AppState {
    pub coordinator: Arc<BatchCoordinator>,
    pub load_balancer: Arc<LoadBalancer>,
    pub rate_limiter: RateLimiter,
    pub request_timeout: Duration, // per-question deadline handed to submit
}
