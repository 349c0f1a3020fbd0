//! Circuit breaker for identification provider protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: provider assumed down, calls fail fast
//! - Half-Open: probing whether the provider recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: reset_timeout elapsed since opened_at (checked lazily)
//! Half-Open → Closed: success_count >= success_threshold
//! Half-Open → Open: any single failure
//! ```
//!
//! While Half-Open at most `success_threshold` probes are in flight; further
//! calls are rejected as if the circuit were still open.
//!
//! # Design Decisions
//! - One breaker per provider, constructed at startup and injected
//! - Failure classification is a typed predicate supplied at construction;
//!   errors it rejects leave the breaker untouched
//! - Counters and state share one mutex, never held across an `.await`
//! - The breaker never retries

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected without being attempted.
    Open,
    /// Calls pass through while recovery is being confirmed.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds for a single breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures while Closed before opening.
    pub failure_threshold: u32,
    /// How long to stay Open before probing.
    pub reset_timeout: Duration,
    /// Consecutive successes while Half-Open before closing.
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Outcome of a protected call that did not produce a value.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker is open, or half-open with every probe slot taken; the
    /// operation was not attempted.
    #[error("circuit breaker '{name}' is open (retry in {}s)", .retry_after.as_secs())]
    Open { name: String, retry_after: Duration },

    /// The operation ran and returned this error.
    #[error("{0}")]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// True when the call was rejected without being attempted.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// The underlying operation error, if the operation ran.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(err) => Some(err),
            BreakerError::Open { .. } => None,
        }
    }
}

/// Point-in-time view of a breaker, taken without side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub reset_timeout_secs: u64,
    /// Remaining cool-down while Open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug)]
struct Counters {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
    probes_in_flight: u32,
    /// Bumped on every entry into Half-Open so permits from an earlier round
    /// cannot free slots in the current one.
    probe_round: u64,
}

/// Half-open probe slot, released when the admitted call finishes or is
/// dropped mid-flight.
struct ProbePermit<'a, E> {
    breaker: &'a CircuitBreaker<E>,
    round: u64,
}

impl<E> Drop for ProbePermit<'_, E> {
    fn drop(&mut self) {
        let mut counters = self.breaker.counters.lock();
        if counters.probe_round == self.round {
            counters.probes_in_flight = counters.probes_in_flight.saturating_sub(1);
        }
    }
}

type FailurePredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Circuit breaker protecting one call path.
pub struct CircuitBreaker<E> {
    name: String,
    config: BreakerConfig,
    counters: Mutex<Counters>,
    is_failure: FailurePredicate<E>,
}

impl<E> CircuitBreaker<E> {
    /// Create a breaker that counts every operation error as a failure.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_classifier(name, config, |_: &E| true)
    }

    /// Create a breaker that only counts errors for which `is_failure` holds.
    pub fn with_classifier<P>(name: impl Into<String>, config: BreakerConfig, is_failure: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::info!(
            breaker = %name,
            failure_threshold = config.failure_threshold,
            reset_timeout_secs = config.reset_timeout.as_secs(),
            success_threshold = config.success_threshold,
            "Circuit breaker initialized"
        );
        metrics::record_breaker_state(&name, CircuitState::Closed);

        Self {
            name,
            config,
            counters: Mutex::new(Counters {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
                probes_in_flight: 0,
                probe_round: 0,
            }),
            is_failure: Arc::new(is_failure),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state. An Open breaker whose cool-down has elapsed moves to
    /// Half-Open as part of this read.
    pub fn state(&self) -> CircuitState {
        let mut counters = self.counters.lock();
        self.refresh(&mut counters, Instant::now());
        counters.state
    }

    /// Read every counter without performing any transition.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let counters = self.counters.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: counters.state,
            failure_count: counters.failure_count,
            success_count: counters.success_count,
            failure_threshold: self.config.failure_threshold,
            success_threshold: self.config.success_threshold,
            reset_timeout_secs: self.config.reset_timeout.as_secs(),
            retry_after_secs: self
                .remaining_cooldown(&counters, Instant::now())
                .map(|d| d.as_secs() + u64::from(d.subsec_nanos() > 0)),
        }
    }

    /// Remaining cool-down while Open, `None` otherwise.
    pub fn retry_after(&self) -> Option<Duration> {
        let counters = self.counters.lock();
        self.remaining_cooldown(&counters, Instant::now())
    }

    /// Run `operation` if the breaker admits it and record the outcome.
    ///
    /// Errors rejected by the failure predicate are returned untouched and do
    /// not affect any counter.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _probe = self.admit()?;

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                if (self.is_failure)(&err) {
                    self.record_failure();
                } else {
                    tracing::debug!(breaker = %self.name, "Excluded error, breaker unaffected");
                }
                Err(BreakerError::Operation(err))
            }
        }
    }

    fn admit(&self) -> Result<Option<ProbePermit<'_, E>>, BreakerError<E>> {
        let now = Instant::now();
        let mut counters = self.counters.lock();
        self.refresh(&mut counters, now);

        if counters.state == CircuitState::Open {
            let retry_after = self
                .remaining_cooldown(&counters, now)
                .unwrap_or(self.config.reset_timeout);
            tracing::debug!(
                breaker = %self.name,
                retry_after_secs = retry_after.as_secs(),
                "Call rejected, circuit open"
            );
            metrics::record_breaker_rejection(&self.name);
            return Err(BreakerError::Open {
                name: self.name.clone(),
                retry_after,
            });
        }

        if counters.state == CircuitState::HalfOpen {
            if counters.probes_in_flight >= self.config.success_threshold.max(1) {
                tracing::debug!(
                    breaker = %self.name,
                    probes_in_flight = counters.probes_in_flight,
                    "Call rejected, half-open probes saturated"
                );
                metrics::record_breaker_rejection(&self.name);
                return Err(BreakerError::Open {
                    name: self.name.clone(),
                    retry_after: Duration::ZERO,
                });
            }
            counters.probes_in_flight += 1;
            return Ok(Some(ProbePermit {
                breaker: self,
                round: counters.probe_round,
            }));
        }
        Ok(None)
    }

    fn refresh(&self, counters: &mut Counters, now: Instant) {
        if counters.state != CircuitState::Open {
            return;
        }
        match counters.opened_at {
            Some(opened_at) if now.duration_since(opened_at) >= self.config.reset_timeout => {
                self.transition(counters, CircuitState::HalfOpen);
            }
            Some(_) => {}
            None => {
                tracing::warn!(breaker = %self.name, "Circuit open without timestamp, probing");
                self.transition(counters, CircuitState::HalfOpen);
            }
        }
    }

    fn remaining_cooldown(&self, counters: &Counters, now: Instant) -> Option<Duration> {
        if counters.state != CircuitState::Open {
            return None;
        }
        counters
            .opened_at
            .map(|opened_at| self.config.reset_timeout.saturating_sub(now.duration_since(opened_at)))
    }

    fn record_success(&self) {
        let mut counters = self.counters.lock();
        match counters.state {
            CircuitState::Closed => counters.failure_count = 0,
            CircuitState::HalfOpen => {
                counters.success_count += 1;
                tracing::debug!(
                    breaker = %self.name,
                    success_count = counters.success_count,
                    success_threshold = self.config.success_threshold,
                    "Half-open probe succeeded"
                );
                if counters.success_count >= self.config.success_threshold {
                    self.transition(&mut counters, CircuitState::Closed);
                }
            }
            // Admitted before another call opened the circuit.
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut counters = self.counters.lock();
        match counters.state {
            CircuitState::Closed => {
                counters.failure_count += 1;
                tracing::debug!(
                    breaker = %self.name,
                    failure_count = counters.failure_count,
                    failure_threshold = self.config.failure_threshold,
                    "Failure recorded"
                );
                if counters.failure_count >= self.config.failure_threshold {
                    self.transition(&mut counters, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                counters.failure_count += 1;
                self.transition(&mut counters, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    fn transition(&self, counters: &mut Counters, to: CircuitState) {
        let from = counters.state;
        counters.state = to;

        match to {
            CircuitState::Closed => {
                counters.failure_count = 0;
                counters.success_count = 0;
                counters.opened_at = None;
                tracing::info!(breaker = %self.name, from = %from, "Circuit breaker closed (recovered)");
            }
            CircuitState::Open => {
                counters.success_count = 0;
                counters.opened_at = Some(Instant::now());
                tracing::warn!(
                    breaker = %self.name,
                    from = %from,
                    failure_count = counters.failure_count,
                    reset_timeout_secs = self.config.reset_timeout.as_secs(),
                    "Circuit breaker opened (failing fast)"
                );
            }
            CircuitState::HalfOpen => {
                counters.success_count = 0;
                counters.probes_in_flight = 0;
                counters.probe_round += 1;
                tracing::info!(
                    breaker = %self.name,
                    from = %from,
                    success_threshold = self.config.success_threshold,
                    "Circuit breaker half-open (probing recovery)"
                );
            }
        }

        metrics::record_breaker_transition(&self.name, to);
    }
}

impl<E> fmt::Debug for CircuitBreaker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("counters", &*self.counters.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::advance;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Timeout,
        Validation,
    }

    fn config(failure_threshold: u32, reset_secs: u64, success_threshold: u32) -> BreakerConfig {
        BreakerConfig {
            failure_threshold,
            reset_timeout: Duration::from_secs(reset_secs),
            success_threshold,
        }
    }

    fn classified(cfg: BreakerConfig) -> CircuitBreaker<TestError> {
        CircuitBreaker::with_classifier("test", cfg, |e: &TestError| *e == TestError::Timeout)
    }

    async fn fail(breaker: &CircuitBreaker<TestError>, calls: &AtomicU32) -> Result<(), BreakerError<TestError>> {
        breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError::Timeout)
            })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker<TestError>, calls: &AtomicU32) -> Result<(), BreakerError<TestError>> {
        breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(())
            })
            .await
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_fails_fast() {
        let breaker = classified(config(3, 60, 2));
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let _ = fail(&breaker, &calls).await;
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
        let result = fail(&breaker, &calls).await;
        assert!(matches!(result, Err(BreakerError::Operation(TestError::Timeout))));
        assert_eq!(breaker.state(), CircuitState::Open);

        let result = succeed(&breaker, &calls).await;
        assert!(matches!(result, Err(BreakerError::Open { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_scenario() {
        let breaker = classified(config(3, 60, 2));
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let _ = fail(&breaker, &calls).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let result = fail(&breaker, &calls).await;
        assert!(result.as_ref().is_err_and(|e| e.is_open()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        advance(Duration::from_secs(61)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        succeed(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert_eq!(breaker.snapshot().success_count, 1);

        succeed(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_early_half_open() {
        let breaker = classified(config(1, 60, 1));
        let calls = AtomicU32::new(0);
        let _ = fail(&breaker, &calls).await;

        advance(Duration::from_secs(59)).await;
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.retry_after(), Some(Duration::from_secs(1)));

        advance(Duration::from_secs(1)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert_eq!(breaker.retry_after(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let breaker = classified(config(2, 30, 3));
        let calls = AtomicU32::new(0);
        let _ = fail(&breaker, &calls).await;
        let _ = fail(&breaker, &calls).await;

        advance(Duration::from_secs(30)).await;
        succeed(&breaker, &calls).await.unwrap();
        succeed(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.snapshot().success_count, 2);

        let _ = fail(&breaker, &calls).await;
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.success_count, 0);
        assert_eq!(snapshot.retry_after_secs, Some(30));
    }

    #[tokio::test]
    async fn test_excluded_errors_never_count() {
        let breaker = classified(config(2, 60, 2));
        for _ in 0..10 {
            let result = breaker.call(|| async { Err::<(), _>(TestError::Validation) }).await;
            assert!(matches!(result, Err(BreakerError::Operation(TestError::Validation))));
        }
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let breaker = classified(config(3, 60, 2));
        let calls = AtomicU32::new(0);
        let _ = fail(&breaker, &calls).await;
        let _ = fail(&breaker, &calls).await;
        succeed(&breaker, &calls).await.unwrap();
        let _ = fail(&breaker, &calls).await;

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_has_no_side_effects() {
        let breaker: CircuitBreaker<TestError> = CircuitBreaker::new("plain", config(1, 10, 1));
        let _ = breaker.call(|| async { Err::<(), _>(TestError::Validation) }).await;
        assert_eq!(breaker.snapshot().state, CircuitState::Open);

        advance(Duration::from_secs(11)).await;
        assert_eq!(breaker.snapshot().state, CircuitState::Open);
        assert_eq!(breaker.snapshot().retry_after_secs, Some(0));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_limits_concurrent_calls() {
        let breaker = Arc::new(classified(config(1, 10, 2)));
        let calls = AtomicU32::new(0);
        let _ = fail(&breaker, &calls).await;
        advance(Duration::from_secs(10)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        let mut releases = Vec::new();
        let mut in_flight = Vec::new();
        for _ in 0..2 {
            let (release, wait) = tokio::sync::oneshot::channel::<()>();
            releases.push(release);
            let breaker = breaker.clone();
            in_flight.push(tokio::spawn(async move {
                breaker
                    .call(|| async move {
                        let _ = wait.await;
                        Ok::<_, TestError>(())
                    })
                    .await
            }));
        }
        tokio::task::yield_now().await;

        let before = calls.load(Ordering::SeqCst);
        let result = succeed(&breaker, &calls).await;
        assert!(matches!(result, Err(BreakerError::Open { retry_after, .. }) if retry_after.is_zero()));
        assert_eq!(calls.load(Ordering::SeqCst), before);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        for release in releases {
            let _ = release.send(());
        }
        for call in in_flight {
            assert!(call.await.unwrap().is_ok());
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_half_open_call_frees_its_slot() {
        let breaker = Arc::new(classified(config(1, 10, 1)));
        let calls = AtomicU32::new(0);
        let _ = fail(&breaker, &calls).await;
        advance(Duration::from_secs(10)).await;

        let stuck = {
            let breaker = breaker.clone();
            tokio::spawn(async move {
                breaker
                    .call(|| async {
                        std::future::pending::<()>().await;
                        Ok::<_, TestError>(())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(succeed(&breaker, &calls).await.unwrap_err().is_open());

        stuck.abort();
        assert!(stuck.await.unwrap_err().is_cancelled());

        succeed(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_are_counted_once() {
        let breaker = Arc::new(classified(config(3, 60, 2)));
        let invoked = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let breaker = breaker.clone();
            let invoked = invoked.clone();
            handles.push(tokio::spawn(async move {
                breaker
                    .call(|| async move {
                        invoked.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Err::<(), _>(TestError::Timeout)
                    })
                    .await
            }));
        }

        let mut rejected = 0;
        for handle in handles {
            if handle.await.unwrap().is_err_and(|e| e.is_open()) {
                rejected += 1;
            }
        }

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.failure_count, 3);
        assert!(invoked.load(Ordering::SeqCst) >= 3);
        assert_eq!(invoked.load(Ordering::SeqCst) + rejected, 10);
    }
}
