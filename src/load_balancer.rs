use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::{Duration, interval};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ConfigError;

// Single Ollama backend
#[derive(Debug)]
pub struct Backend {
    pub url: String,
    healthy: AtomicBool,
}

impl Backend {
    pub fn new(url: String) -> Self {
        Self {
            url,
            healthy: AtomicBool::new(true),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}

// Round-robin over the healthy backends the LLM client may call
#[derive(Debug)]
pub struct LoadBalancer {
    backends: Vec<Arc<Backend>>,
    current: AtomicUsize,
}

impl LoadBalancer {
    // Create from comma-separated urls "localhost:11434, localhost:11435"
    pub fn new(backends_str: &str) -> Result<Self, ConfigError> {
        let backends: Vec<Arc<Backend>> = backends_str
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|url| {
                let full_url = if url.starts_with("http") {
                    url.trim_end_matches('/').to_string()
                } else {
                    format!("http://{}", url.trim_end_matches('/'))
                };
                Arc::new(Backend::new(full_url))
            })
            .collect();
        if backends.is_empty() {
            return Err(ConfigError::NoBackends);
        }

        info!("Load balancer initialized with {} backends", backends.len());
        for (i, b) in backends.iter().enumerate() {
            info!("  [{}] {}", i + 1, b.url);
        }

        Ok(Self {
            backends,
            current: AtomicUsize::new(0),
        })
    }

    // Next healthy backend, round-robin
    pub fn get_backend(&self) -> Option<Arc<Backend>> {
        let len = self.backends.len();
        let start = self.current.fetch_add(1, Ordering::Relaxed) % len;

        (0..len)
            .map(|i| &self.backends[(start + i) % len])
            .find(|backend| backend.is_healthy())
            .map(Arc::clone)
    }

    pub fn all_backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }
}

// Check every backend's /api/tags on each tick until cancelled
pub async fn health_checker(
    load_balancer: Arc<LoadBalancer>,
    client: reqwest::Client,
    check_interval: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = interval(check_interval);

    info!("Health checker started (interval: {:?})", check_interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        for backend in load_balancer.all_backends() {
            let url = format!("{}/api/tags", backend.url);
            let was_healthy = backend.is_healthy();

            let is_healthy = match client.get(&url).timeout(Duration::from_secs(5)).send().await {
                Ok(res) => res.status().is_success(),
                Err(_) => false,
            };
            backend.set_healthy(is_healthy);

            if was_healthy != is_healthy {
                if is_healthy {
                    info!("Backend {} is now healthy", backend.url);
                } else {
                    warn!("Backend {} is now unhealthy", backend.url);
                }
            }
        }
    }

    info!("Health checker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalises_backend_list() {
        let lb = LoadBalancer::new(" localhost:11434, ,https://gpu-box:11434/ ").unwrap();
        let urls: Vec<_> = lb.all_backends().iter().map(|b| b.url.as_str()).collect();
        assert_eq!(urls, vec!["http://localhost:11434", "https://gpu-box:11434"]);
    }

    #[test]
    fn empty_backend_list_is_rejected() {
        assert!(matches!(LoadBalancer::new(" , "), Err(ConfigError::NoBackends)));
    }

    #[test]
    fn round_robin_skips_unhealthy_backends() {
        let lb = LoadBalancer::new("a:1,b:2,c:3").unwrap();
        lb.all_backends()[1].set_healthy(false);

        let picked: Vec<_> = (0..4).map(|_| lb.get_backend().unwrap().url.clone()).collect();
        assert_eq!(picked, vec!["http://a:1", "http://c:3", "http://c:3", "http://a:1"]);

        for b in lb.all_backends() {
            b.set_healthy(false);
        }
        assert!(lb.get_backend().is_none());
    }
}
