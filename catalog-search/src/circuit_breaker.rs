//! Per-source circuit breaker for adaptive source selection.
//!
//! Tracks consecutive failures of one source and temporarily skips it once
//! they reach a threshold. After a cooldown, a tripped source enters a
//! half-open state where a single probe decides whether to restore or
//! re-trip the circuit. A threshold of 0 disables the breaker entirely.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure             │
//!     └─────────────────────────┴──────────────────────┘
//! ```

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Circuit breaker state for a single source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Source is healthy and queried normally.
    Closed,
    /// Source failed too often and is skipped until the cooldown expires.
    Open,
    /// Cooldown has elapsed; the next search probes the source.
    HalfOpen,
}

/// Configuration for circuit breaker behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens. `0` disables the breaker.
    pub failure_threshold: u32,
    /// Seconds to stay open before allowing a probe.
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 0,
            cooldown_secs: 60,
        }
    }
}

impl CircuitBreakerConfig {
    /// Returns `true` if the breaker can ever open.
    pub fn is_enabled(&self) -> bool {
        self.failure_threshold > 0
    }
}

/// Breaker state for one source.
#[derive(Debug, Clone)]
pub struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    /// When the current half-open probe was admitted.
    probe_started_at: Option<Instant>,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            probe_started_at: None,
        }
    }
}

impl Circuit {
    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Record a successful fetch. Closes the circuit regardless of state.
    pub fn record_success(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.probe_started_at = None;
    }

    /// Record a failed fetch, opening the circuit at the threshold.
    pub fn record_failure(&mut self, config: &CircuitBreakerConfig) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(Instant::now());
        self.probe_started_at = None;

        if config.is_enabled() && self.consecutive_failures >= config.failure_threshold {
            self.state = CircuitState::Open;
        }
    }

    /// Decide whether the source should be queried now.
    ///
    /// - [`CircuitState::Closed`]: `true`
    /// - [`CircuitState::Open`]: `true` only once the cooldown has elapsed,
    ///   moving the circuit to [`CircuitState::HalfOpen`] and admitting the
    ///   probe
    /// - [`CircuitState::HalfOpen`]: `false` while the probe is in flight.
    ///   A probe whose outcome was never recorded expires after one cooldown
    ///   and another is admitted.
    pub fn should_attempt(&mut self, config: &CircuitBreakerConfig) -> bool {
        if !config.is_enabled() {
            return true;
        }
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooldown_elapsed = self
                    .last_failure_at
                    .is_none_or(|t| t.elapsed().as_secs() >= config.cooldown_secs);

                if cooldown_elapsed {
                    self.state = CircuitState::HalfOpen;
                    self.probe_started_at = Some(Instant::now());
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                let probe_pending = self
                    .probe_started_at
                    .is_some_and(|t| t.elapsed().as_secs() < config.cooldown_secs);

                if probe_pending {
                    false
                } else {
                    self.probe_started_at = Some(Instant::now());
                    true
                }
            }
        }
    }
}
