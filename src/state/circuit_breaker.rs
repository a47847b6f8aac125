//! Per-URL circuit breaker
//!
//! A URL's circuit opens once its failure count reaches the threshold. While
//! open, callers must not touch the network for that URL. Once the cooldown has
//! elapsed without a new failure the circuit is half-open: one attempt goes
//! through, a success closes the circuit and a failure re-opens it with a fresh
//! cooldown.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Failure bookkeeping for one URL
#[derive(Debug, Clone, Default)]
pub struct CircuitState {
    pub failure_count: u32,
    pub last_failure_time: Option<Instant>,
}

/// Position of a URL's circuit at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitPosition {
    Closed,
    Open { remaining: Duration },
    HalfOpen,
}

/// Circuit breaker keyed by URL
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    circuits: HashMap<String, CircuitState>,
}

impl CircuitBreaker {
    /// Creates a breaker that opens after `threshold` failures for `cooldown`
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            circuits: HashMap::new(),
        }
    }

    /// Returns where the URL's circuit stands at `now`
    pub fn position(&self, url: &str, now: Instant) -> CircuitPosition {
        let Some(state) = self.circuits.get(url) else {
            return CircuitPosition::Closed;
        };

        if state.failure_count < self.threshold {
            return CircuitPosition::Closed;
        }

        match state.last_failure_time {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.cooldown {
                    CircuitPosition::Open {
                        remaining: self.cooldown - elapsed,
                    }
                } else {
                    CircuitPosition::HalfOpen
                }
            }
            None => CircuitPosition::HalfOpen,
        }
    }

    /// Returns true if attempts against the URL must be skipped at `now`
    pub fn is_open(&self, url: &str, now: Instant) -> bool {
        matches!(self.position(url, now), CircuitPosition::Open { .. })
    }

    /// Records a failed attempt, returning the new failure count
    pub fn record_failure(&mut self, url: &str, now: Instant) -> u32 {
        let state = self.circuits.entry(url.to_string()).or_default();
        state.failure_count += 1;
        state.last_failure_time = Some(now);

        if state.failure_count == self.threshold {
            tracing::warn!(
                "Circuit opened for {} after {} failures (cooldown {:?})",
                url,
                state.failure_count,
                self.cooldown
            );
        }

        state.failure_count
    }

    /// Resets the URL's circuit after a success
    pub fn record_success(&mut self, url: &str) {
        if self.circuits.remove(url).is_some() {
            tracing::debug!("Circuit reset for {}", url);
        }
    }

    /// Current failure count for a URL
    pub fn failure_count(&self, url: &str) -> u32 {
        self.circuits
            .get(url)
            .map(|state| state.failure_count)
            .unwrap_or(0)
    }

    /// Number of circuits that are open at `now`
    pub fn open_circuits(&self, now: Instant) -> usize {
        self.circuits
            .keys()
            .filter(|url| self.is_open(url, now))
            .count()
    }
}
