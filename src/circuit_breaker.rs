// =============================================================================
// circuit_breaker.rs — THE RECUSAL RULE
// =============================================================================
//
// Every external service the engine leans on (the chat-completion API, the
// Redis job list) gets one of these. After `max_errors` consecutive errors
// the service is marked unavailable and nobody calls it until the cooldown
// since the last error has passed. Then the slate is wiped clean and the
// service gets its full quota of chances again.
//
// There is no half-open probing and no backoff curve. A fixed cooldown is
// what the web app has always done, and the web app is where the judges are.
// =============================================================================

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Available or sitting out its cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum CircuitState {
    /// Requests flow through.
    Closed,
    /// Marked unavailable. Requests are refused until the cooldown passes.
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "AVAILABLE"),
            CircuitState::Open => write!(f, "UNAVAILABLE"),
        }
    }
}

struct CircuitBreakerInner {
    state: CircuitState,
    error_count: u32,
    last_error_time: Option<Instant>,
    last_state_change: Instant,
    total_trips: u64,
}

/// Thread-safe error counter with a cooldown. Cheap to clone; clones share
/// state.
#[derive(Clone)]
pub struct CircuitBreaker {
    /// Service name for logs and metrics ("chat", "redis-intake", ...).
    name: String,

    inner: Arc<RwLock<CircuitBreakerInner>>,

    max_errors: u32,

    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, max_errors: u32, cooldown: Duration) -> Self {
        let name = name.into();
        info!(
            name = %name,
            max_errors = max_errors,
            cooldown_secs = cooldown.as_secs(),
            "Circuit breaker initialized"
        );

        Self {
            name,
            inner: Arc::new(RwLock::new(CircuitBreakerInner {
                state: CircuitState::Closed,
                error_count: 0,
                last_error_time: None,
                last_state_change: Instant::now(),
                total_trips: 0,
            })),
            max_errors: max_errors.max(1),
            cooldown,
        }
    }

    /// Is the service available right now?
    ///
    /// An open breaker whose cooldown has expired closes here, with the
    /// error count reset, and the call returns `true`.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.write();

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let expired = inner
                    .last_error_time
                    .map(|t| t.elapsed() >= self.cooldown)
                    .unwrap_or(true);

                if expired {
                    info!(
                        name = %self.name,
                        "Cooldown over — service marked available again"
                    );
                    inner.state = CircuitState::Closed;
                    inner.error_count = 0;
                    inner.last_state_change = Instant::now();
                    true
                } else {
                    let remaining = inner
                        .last_error_time
                        .map(|t| self.cooldown.saturating_sub(t.elapsed()))
                        .unwrap_or_default();
                    warn!(
                        name = %self.name,
                        remaining_secs = remaining.as_secs(),
                        "Service unavailable — request refused"
                    );
                    false
                }
            }
        }
    }

    /// A call went through. Consecutive errors start counting from zero.
    pub fn record_success(&self) {
        let mut inner = self.inner.write();
        if inner.state == CircuitState::Closed {
            inner.error_count = 0;
        }
    }

    /// A call failed. The cooldown restarts from now.
    pub fn record_failure(&self) {
        let mut inner = self.inner.write();
        inner.error_count = inner.error_count.saturating_add(1);
        inner.last_error_time = Some(Instant::now());

        match inner.state {
            CircuitState::Closed if inner.error_count >= self.max_errors => {
                warn!(
                    name = %self.name,
                    errors = inner.error_count,
                    "Service marked unavailable"
                );
                inner.state = CircuitState::Open;
                inner.total_trips += 1;
                inner.last_state_change = Instant::now();
            }
            CircuitState::Closed => {
                warn!(
                    name = %self.name,
                    errors = inner.error_count,
                    max_errors = self.max_errors,
                    "Service error recorded — {}/{} before it is marked unavailable",
                    inner.error_count,
                    self.max_errors
                );
            }
            CircuitState::Open => {}
        }
    }

    /// Current state without side effects. An expired cooldown still reads
    /// `Open` until the next `allow_request`.
    pub fn state(&self) -> CircuitState {
        self.inner.read().state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.read();
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            error_count: inner.error_count,
            total_trips: inner.total_trips,
            time_in_current_state_secs: inner.last_state_change.elapsed().as_secs(),
        }
    }
}

/// A serializable snapshot of breaker state for the metrics endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub error_count: u32,
    pub total_trips: u64,
    pub time_in_current_state_secs: u64,
}
