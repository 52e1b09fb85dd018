// ═══════════════════════════════════════════════════════════════
// METRICS COLLECTOR - How the engine answers "are you alright?"
// ═══════════════════════════════════════════════════════════════
//
// Atomic counters for the job pipeline, plus live snapshots of every
// circuit breaker and the AI response cache. A tiny HTTP server hands the
// lot out as JSON so the web app's health page can show it.
//
// - Per-kind job counts
// - Malformed slips, failed jobs, publish failures
// - Breaker states and trip counts
// - Cache hit rates

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, error};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerSnapshot, CircuitState};
use crate::response_cache::{CacheSnapshot, ResponseCache};

/// The metrics snapshot - what gets serialized to JSON
#[derive(Debug, Serialize, Clone)]
pub struct MetricsSnapshot {
    pub jobs_received: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub malformed_jobs: u64,
    pub jobs_by_kind: BTreeMap<String, u64>,
    pub results_published: u64,
    pub publish_failures: u64,
    pub intake_errors: u64,
    pub uptime_seconds: u64,
    pub jobs_per_minute: f64,
    pub breakers: Vec<CircuitBreakerSnapshot>,
    pub ai_cache: Option<CacheSnapshot>,
    pub ai_cache_hit_rate: f64,
    pub status: String,
}

/// Thread-safe metrics collector
pub struct MetricsCollector {
    jobs_received: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    malformed_jobs: AtomicU64,
    jobs_by_kind: RwLock<BTreeMap<String, u64>>,
    results_published: AtomicU64,
    publish_failures: AtomicU64,
    intake_errors: AtomicU64,
    breakers: RwLock<Vec<CircuitBreaker>>,
    ai_cache: RwLock<Option<ResponseCache>>,
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            jobs_received: AtomicU64::new(0),
            jobs_succeeded: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            malformed_jobs: AtomicU64::new(0),
            jobs_by_kind: RwLock::new(BTreeMap::new()),
            results_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            intake_errors: AtomicU64::new(0),
            breakers: RwLock::new(Vec::new()),
            ai_cache: RwLock::new(None),
            start_time: Instant::now(),
        }
    }

    /// Report this breaker's state in every snapshot.
    pub fn watch_breaker(&self, breaker: CircuitBreaker) {
        self.breakers.write().push(breaker);
    }

    pub fn watch_cache(&self, cache: ResponseCache) {
        *self.ai_cache.write() = Some(cache);
    }

    pub fn increment_received(&self) {
        self.jobs_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self, kind: &str, ok: bool) {
        if ok {
            self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        }
        *self.jobs_by_kind.write().entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn increment_malformed(&self) {
        self.malformed_jobs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_published(&self) {
        self.results_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_publish_failures(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_intake_errors(&self) {
        self.intake_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime = self.start_time.elapsed().as_secs();
        let received = self.jobs_received.load(Ordering::Relaxed);
        let jobs_per_minute = if uptime > 0 {
            (received as f64 / uptime as f64) * 60.0
        } else {
            0.0
        };

        let breakers: Vec<CircuitBreakerSnapshot> = self.breakers.read().iter().map(CircuitBreaker::snapshot).collect();
        let ai_cache = self.ai_cache.read().as_ref().map(ResponseCache::snapshot);
        let ai_cache_hit_rate = match &ai_cache {
            Some(cache) if cache.lookups > 0 => cache.hits as f64 / cache.lookups as f64,
            _ => 0.0,
        };

        let status = if breakers.iter().any(|b| b.state == CircuitState::Open) {
            "degraded"
        } else {
            "operational"
        };

        MetricsSnapshot {
            jobs_received: received,
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            malformed_jobs: self.malformed_jobs.load(Ordering::Relaxed),
            jobs_by_kind: self.jobs_by_kind.read().clone(),
            results_published: self.results_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            intake_errors: self.intake_errors.load(Ordering::Relaxed),
            uptime_seconds: uptime,
            jobs_per_minute,
            breakers,
            ai_cache,
            ai_cache_hit_rate,
            status: status.to_string(),
        }
    }
}

/// Serve the snapshot as JSON to anything that connects.
pub async fn run_metrics_server(
    metrics: Arc<MetricsCollector>,
    port: u16,
    shutdown: &mut watch::Receiver<bool>,
) {
    use tokio::net::TcpListener;
    use tokio::io::AsyncWriteExt;

    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server on :{}: {}", port, e);
            return;
        }
    };

    info!("📊 Metrics server listening on http://0.0.0.0:{}", port);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((mut stream, _addr)) => {
                        let snapshot = metrics.snapshot();
                        let json = serde_json::to_string_pretty(&snapshot)
                            .unwrap_or_else(|_| "{}".to_string());

                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nAccess-Control-Allow-Origin: *\r\nContent-Length: {}\r\n\r\n{}",
                            json.len(),
                            json,
                        );

                        let _ = stream.write_all(response.as_bytes()).await;
                    }
                    Err(e) => {
                        error!("Metrics server accept error: {}", e);
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("Metrics server: shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_counts_by_kind() {
        let metrics = MetricsCollector::new();
        metrics.increment_received();
        metrics.increment_received();
        metrics.record_completed("rerank", true);
        metrics.record_completed("principles", false);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_received, 2);
        assert_eq!(snapshot.jobs_succeeded, 1);
        assert_eq!(snapshot.jobs_failed, 1);
        assert_eq!(snapshot.jobs_by_kind["rerank"], 1);
    }

    #[test]
    fn test_open_breaker_marks_degraded() {
        let metrics = MetricsCollector::new();
        let breaker = CircuitBreaker::new("chat", 1, Duration::from_secs(300));
        metrics.watch_breaker(breaker.clone());
        assert_eq!(metrics.snapshot().status, "operational");
        breaker.record_failure();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.status, "degraded");
        assert_eq!(snapshot.breakers[0].total_trips, 1);
    }

    #[test]
    fn test_cache_hit_rate() {
        let metrics = MetricsCollector::new();
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        metrics.watch_cache(cache.clone());
        cache.put("k", serde_json::json!(1));
        let _ = cache.get("k");
        let _ = cache.get("missing");
        assert_eq!(metrics.snapshot().ai_cache_hit_rate, 0.5);
    }
}
