//! Circuit breaker for external dependency health.
//!
//! Three states:
//!
//! - `Closed`: calls pass through, consecutive failures counted
//! - `Open`: calls rejected immediately, no underlying call attempted
//! - `HalfOpen`: exactly one trial call permitted after the timeout
//!
//! A single success in `Closed` resets the failure counter; failures do not
//! accumulate across interleaved successes. The trial caller in `HalfOpen`
//! is selected by a compare-and-swap on the state word, so concurrent
//! callers cannot both probe a recovering dependency.

use foreman_core::{ConfigError, ForemanResult, ResilienceError};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

// ============================================================================
// STATE
// ============================================================================

/// The current state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected without attempting the dependency.
    Open,
    /// One trial call is permitted.
    HalfOpen,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

// ============================================================================
// CONFIG
// ============================================================================

/// Configuration for a circuit breaker.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub max_failures: u32,
    /// How long the circuit stays open before permitting a trial call.
    pub timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the consecutive failure threshold.
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    /// Set the open timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a BreakerConfig from environment variables.
    ///
    /// Unset variables fall back to defaults; a set-but-malformed value is a
    /// `ConfigError::InvalidValue`.
    ///
    /// # Environment Variables
    /// - `FOREMAN_BREAKER_MAX_FAILURES`: failures before opening (default: 5)
    /// - `FOREMAN_BREAKER_TIMEOUT_SECS`: how long the circuit stays open (default: 30)
    pub fn from_env() -> ForemanResult<Self> {
        let defaults = Self::default();

        let max_failures =
            parse_env::<u32>("FOREMAN_BREAKER_MAX_FAILURES")?.unwrap_or(defaults.max_failures);

        let timeout = parse_env::<u64>("FOREMAN_BREAKER_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Ok(Self {
            max_failures,
            timeout,
        })
    }
}

fn parse_env<T: std::str::FromStr>(field: &str) -> ForemanResult<Option<T>> {
    match std::env::var(field) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| {
            ConfigError::InvalidValue {
                field: field.to_string(),
                value: raw,
                reason: "expected a non-negative integer".to_string(),
            }
            .into()
        }),
        Err(_) => Ok(None),
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Error returned by the call wrappers.
#[derive(Debug, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The circuit is open; the underlying function was not invoked.
    Open,
    /// The underlying function was invoked and failed.
    Inner(E),
}

impl<E: std::fmt::Display> std::fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerError::Open => write!(f, "circuit open"),
            BreakerError::Inner(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::fmt::Display + std::fmt::Debug> std::error::Error for BreakerError<E> {}

// ============================================================================
// CIRCUIT BREAKER
// ============================================================================

/// Circuit breaker keyed to a single external dependency.
pub struct CircuitBreaker {
    dependency: String,
    state: AtomicU8,
    failure_count: AtomicU32,
    opened_at: RwLock<Option<Instant>>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    /// Create a breaker for the named dependency.
    pub fn new(dependency: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            dependency: dependency.into(),
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU32::new(0),
            opened_at: RwLock::new(None),
            config,
        }
    }

    /// The dependency this breaker protects.
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::SeqCst))
    }

    /// The distinguished error surfaced when this circuit is open.
    pub fn open_error(&self) -> ResilienceError {
        ResilienceError::CircuitOpen {
            dependency: self.dependency.clone(),
        }
    }

    /// Whether a call may proceed right now.
    ///
    /// In `Open`, a caller arriving after the timeout wins the half-open
    /// trial slot via compare-and-swap; everyone else is rejected until the
    /// trial resolves.
    pub fn try_acquire(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let timed_out = self
                    .opened_at
                    .read()
                    .ok()
                    .and_then(|guard| *guard)
                    .is_some_and(|at| at.elapsed() >= self.config.timeout);
                if !timed_out {
                    return false;
                }
                let won_trial = self
                    .state
                    .compare_exchange(
                        CircuitState::Open as u8,
                        CircuitState::HalfOpen as u8,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok();
                if won_trial {
                    tracing::debug!(dependency = %self.dependency, "circuit half-open, trial call permitted");
                }
                won_trial
            }
            // Trial already in flight.
            CircuitState::HalfOpen => false,
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
        if self.state() == CircuitState::HalfOpen {
            self.state
                .store(CircuitState::Closed as u8, Ordering::SeqCst);
            if let Ok(mut guard) = self.opened_at.write() {
                *guard = None;
            }
            tracing::info!(dependency = %self.dependency, "circuit closed after trial success");
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        if self.state() == CircuitState::HalfOpen {
            // Trial failed: reopen and restart the timer.
            if let Ok(mut guard) = self.opened_at.write() {
                *guard = Some(Instant::now());
            }
            self.state.store(CircuitState::Open as u8, Ordering::SeqCst);
            tracing::warn!(dependency = %self.dependency, "circuit reopened after trial failure");
            return;
        }

        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.config.max_failures {
            if let Ok(mut guard) = self.opened_at.write() {
                *guard = Some(Instant::now());
            }
            self.state.store(CircuitState::Open as u8, Ordering::SeqCst);
            tracing::warn!(
                dependency = %self.dependency,
                failures = count,
                "circuit opened"
            );
        }
    }

    /// Run a synchronous call through the breaker.
    pub fn call<T, E, F>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if !self.try_acquire() {
            return Err(BreakerError::Open);
        }
        match f() {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Run an async call through the breaker.
    pub async fn call_async<T, E, Fut>(&self, fut: Fut) -> Result<T, BreakerError<E>>
    where
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.try_acquire() {
            return Err(BreakerError::Open);
        }
        match fut.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Force the breaker back to `Closed` with counters cleared.
    pub fn reset(&self) {
        self.state
            .store(CircuitState::Closed as u8, Ordering::SeqCst);
        self.failure_count.store(0, Ordering::SeqCst);
        if let Ok(mut guard) = self.opened_at.write() {
            *guard = None;
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("dependency", &self.dependency)
            .field("state", &self.state())
            .field("failure_count", &self.failure_count.load(Ordering::Relaxed))
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn breaker(max_failures: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "broker",
            BreakerConfig::new()
                .with_max_failures(max_failures)
                .with_timeout(timeout),
        )
    }

    #[test]
    fn test_threshold_opens_circuit() {
        let b = breaker(3, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result: Result<(), BreakerError<&str>> = b.call(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down")
            });
            assert!(matches!(result, Err(BreakerError::Inner("down"))));
        }
        assert_eq!(b.state(), CircuitState::Open);

        // Fourth call is rejected without invoking the function.
        let result: Result<(), BreakerError<&str>> = b.call(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("down")
        });
        assert!(matches!(result, Err(BreakerError::Open)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_success_resets_failure_counter() {
        let b = breaker(3, Duration::from_secs(60));
        let fail = || -> Result<(), BreakerError<&str>> { b.call(|| Err("down")) };
        let succeed = || -> Result<(), BreakerError<&str>> { b.call(|| Ok(())) };

        fail().unwrap_err();
        fail().unwrap_err();
        succeed().unwrap();
        fail().unwrap_err();
        fail().unwrap_err();
        // 2 failures, 1 success, 2 failures: never reaches 3 consecutive.
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_recovery_on_success() {
        let b = breaker(1, Duration::from_millis(10));
        let _: Result<(), _> = b.call(|| Err::<(), _>("down"));
        assert_eq!(b.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(20));
        let result: Result<(), BreakerError<&str>> = b.call(|| Ok(()));
        assert!(result.is_ok());
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.failure_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_half_open_reopens_on_trial_failure() {
        let b = breaker(1, Duration::from_millis(10));
        let _: Result<(), _> = b.call(|| Err::<(), _>("down"));
        std::thread::sleep(Duration::from_millis(20));

        let result: Result<(), BreakerError<&str>> = b.call(|| Err("still down"));
        assert!(matches!(result, Err(BreakerError::Inner("still down"))));
        assert_eq!(b.state(), CircuitState::Open);

        // Timer restarted: immediate retry is rejected.
        let result: Result<(), BreakerError<&str>> = b.call(|| Ok(()));
        assert!(matches!(result, Err(BreakerError::Open)));
    }

    #[test]
    fn test_exactly_one_trial_in_half_open() {
        let b = breaker(1, Duration::from_millis(10));
        let _: Result<(), _> = b.call(|| Err::<(), _>("down"));
        std::thread::sleep(Duration::from_millis(20));

        assert!(b.try_acquire());
        // Second caller before the trial resolves is rejected.
        assert!(!b.try_acquire());
        assert_eq!(b.state(), CircuitState::HalfOpen);
    }

    // Single test for all env-derived settings: parallel test threads share
    // the process environment.
    #[test]
    fn test_from_env_rejects_malformed_values() {
        std::env::set_var("FOREMAN_BREAKER_MAX_FAILURES", "lots");
        let err = BreakerConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            foreman_core::ForemanError::Config(ConfigError::InvalidValue { ref field, .. })
                if field == "FOREMAN_BREAKER_MAX_FAILURES"
        ));

        std::env::set_var("FOREMAN_BREAKER_MAX_FAILURES", "9");
        std::env::set_var("FOREMAN_BREAKER_TIMEOUT_SECS", "120");
        let config = BreakerConfig::from_env().unwrap();
        assert_eq!(config.max_failures, 9);
        assert_eq!(config.timeout, Duration::from_secs(120));
        std::env::remove_var("FOREMAN_BREAKER_MAX_FAILURES");
        std::env::remove_var("FOREMAN_BREAKER_TIMEOUT_SECS");

        let config = BreakerConfig::from_env().unwrap();
        assert_eq!(config.max_failures, BreakerConfig::default().max_failures);
    }

    #[test]
    fn test_open_error_names_dependency() {
        let b = breaker(1, Duration::from_secs(60));
        let err = b.open_error();
        assert!(format!("{err}").contains("broker"));
    }

    #[tokio::test]
    async fn test_call_async_records_outcomes() {
        let b = breaker(2, Duration::from_secs(60));
        let ok: Result<u32, BreakerError<&str>> = b.call_async(async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let _: Result<u32, _> = b.call_async(async { Err::<u32, _>("down") }).await;
        let _: Result<u32, _> = b.call_async(async { Err::<u32, _>("down") }).await;
        assert_eq!(b.state(), CircuitState::Open);

        let rejected: Result<u32, BreakerError<&str>> = b.call_async(async { Ok(7) }).await;
        assert!(matches!(rejected, Err(BreakerError::Open)));
    }

    #[test]
    fn test_reset_clears_state() {
        let b = breaker(1, Duration::from_secs(60));
        let _: Result<(), _> = b.call(|| Err::<(), _>("down"));
        assert_eq!(b.state(), CircuitState::Open);
        b.reset();
        assert_eq!(b.state(), CircuitState::Closed);
        let result: Result<(), BreakerError<&str>> = b.call(|| Ok(()));
        assert!(result.is_ok());
    }
}
