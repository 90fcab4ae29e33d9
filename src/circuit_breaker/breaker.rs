//! Circuit breaker implementation.

use crate::audit::{BreakerEvent, BreakerEventKind, EventSink, TracingEventSink};
use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::circuit_breaker::state::{self, Admission, BreakerMetrics};
use crate::core::clock::{ArcClock, SystemClock};
use crate::core::error::{CircuitBreakerError, StorageError};
use crate::core::state::{CircuitState, CircuitStatus};
use crate::repository::CircuitStateRepository;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// A persistent circuit breaker guarding one service key.
///
/// The breaker monitors failures of the operations it runs and prevents
/// cascading failures by temporarily rejecting calls to an unhealthy
/// dependency. Every state change is written through a
/// [`CircuitStateRepository`] before control returns to the caller, so a
/// restarted process resumes with the same decision.
///
/// # States
///
/// - **Closed**: Normal operation. Calls pass through, failures are counted.
/// - **Open**: The dependency is failing. Calls are rejected immediately.
/// - **Half-Open**: Probing. Calls are attempted; one failure reopens the
///   circuit, `success_threshold` successes close it.
///
/// # Concurrency
///
/// Admission and outcome recording are serialized per breaker. The protected
/// operation itself runs outside that section, so concurrent calls may be in
/// flight at the same time.
///
/// # Example
///
/// ```rust,ignore
/// use durable_breaker::{CircuitBreaker, CircuitBreakerConfig};
///
/// let breaker = CircuitBreaker::builder("inventory")
///     .config(CircuitBreakerConfig::high_availability())
///     .build()
///     .await?;
///
/// let stock = breaker
///     .call_with_fallback(|| fetch_stock(42), |_err| async { 0 })
///     .await;
/// ```
pub struct CircuitBreaker {
    service_key: String,
    config: CircuitBreakerConfig,
    repository: CircuitStateRepository,
    clock: ArcClock,
    events: Arc<dyn EventSink>,
    /// Serializes read-decide-persist sections.
    section: Mutex<()>,
    /// Latest committed snapshot.
    state: RwLock<CircuitState>,
    metrics: RwLock<BreakerMetrics>,
}

impl CircuitBreaker {
    /// Starts building a breaker for `service_key`.
    pub fn builder(service_key: impl Into<String>) -> CircuitBreakerBuilder {
        CircuitBreakerBuilder::new(service_key)
    }

    /// Returns the service key this breaker guards.
    pub fn service_key(&self) -> &str {
        &self.service_key
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Returns the repository the breaker persists through.
    pub fn repository(&self) -> &CircuitStateRepository {
        &self.repository
    }

    /// Returns the current state snapshot.
    pub fn state(&self) -> CircuitState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the current status.
    pub fn status(&self) -> CircuitStatus {
        self.state().status()
    }

    /// Returns the current failure counter.
    pub fn failure_count(&self) -> u32 {
        self.state().failure_count()
    }

    /// Returns the current success counter.
    pub fn success_count(&self) -> u32 {
        self.state().success_count()
    }

    /// Returns a copy of the in-process metrics.
    pub fn metrics(&self) -> BreakerMetrics {
        self.metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Runs `operation` under the breaker's protection.
    ///
    /// # Errors
    ///
    /// - [`CircuitBreakerError::CircuitOpen`] if the circuit rejected the
    ///   call; `operation` was not invoked.
    /// - [`CircuitBreakerError::Operation`] if `operation` failed. The
    ///   failure is counted and persisted first.
    /// - [`CircuitBreakerError::OperationUnpersisted`] if `operation` failed
    ///   and persisting the resulting state failed too. Both errors are
    ///   carried.
    /// - [`CircuitBreakerError::Storage`] if persisting a transition on the
    ///   admission or success path failed.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.admit().await?;

        match operation().await {
            Ok(value) => {
                self.record_success().await?;
                Ok(value)
            }
            Err(e) => match self.record_failure(&e).await {
                Ok(()) => Err(CircuitBreakerError::Operation(e)),
                Err(storage) => {
                    tracing::error!(
                        service = %self.service_key,
                        error = %storage,
                        "Failed to persist circuit state after operation failure"
                    );
                    Err(CircuitBreakerError::OperationUnpersisted { error: e, storage })
                }
            },
        }
    }

    /// Runs `operation` and hands any error to `recover`.
    ///
    /// `recover` receives the triggering error, whether the circuit rejected
    /// the call, the operation failed or persistence failed. Fallback runs
    /// are outside the state machine and do not touch its counters.
    pub async fn call_with_fallback<T, E, F, Fut, R, RFut>(&self, operation: F, recover: R) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        R: FnOnce(CircuitBreakerError<E>) -> RFut,
        RFut: Future<Output = T>,
    {
        match self.call(operation).await {
            Ok(value) => value,
            Err(e) => {
                self.metrics
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .record_fallback();
                self.emit(
                    BreakerEventKind::FallbackInvoked {
                        error: e.to_string(),
                    },
                    self.state(),
                );
                recover(e).await
            }
        }
    }

    /// Forces the circuit into the open state; the timeout starts now.
    pub async fn force_open(&self) -> Result<(), StorageError> {
        let _section = self.section.lock().await;
        let current = self.state();
        let next = state::forced_open(&current, self.clock.now());
        self.commit(&current, next).await
    }

    /// Forces the circuit into the closed state with zero counters.
    pub async fn force_close(&self) -> Result<(), StorageError> {
        let _section = self.section.lock().await;
        let current = self.state();
        let next = current.transition_to(CircuitStatus::Closed);
        self.commit(&current, next).await
    }

    /// Resets the persisted state and the in-process metrics.
    pub async fn reset(&self) -> Result<(), StorageError> {
        let _section = self.section.lock().await;
        let current = self.state();
        let next = CircuitState::closed(self.service_key.as_str());
        *self
            .metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = BreakerMetrics::new();
        self.commit(&current, next).await
    }

    /// Re-reads the persisted state, e.g. after another process changed it.
    ///
    /// A missing record resets the snapshot to closed.
    pub async fn reload(&self) -> Result<CircuitState, StorageError> {
        let _section = self.section.lock().await;
        let loaded = self
            .repository
            .find(&self.service_key)
            .await?
            .unwrap_or_else(|| CircuitState::closed(self.service_key.as_str()));

        let previous = self.replace_state(loaded.clone());
        if previous.status() != loaded.status() {
            self.emit(
                BreakerEventKind::StateChanged {
                    from: previous.status(),
                    to: loaded.status(),
                },
                loaded.clone(),
            );
        }
        Ok(loaded)
    }

    async fn admit<E>(&self) -> Result<(), CircuitBreakerError<E>> {
        let _section = self.section.lock().await;
        let current = self.state();

        match state::admit(&current, &self.config, self.clock.now()) {
            Admission::Allowed(next) => {
                self.commit(&current, next).await?;
                Ok(())
            }
            Admission::Rejected { retry_after } => {
                self.metrics
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .record_rejected();
                self.emit(BreakerEventKind::CallRejected, current);
                Err(CircuitBreakerError::CircuitOpen {
                    service: self.service_key.clone(),
                    retry_after,
                })
            }
        }
    }

    async fn record_success(&self) -> Result<(), StorageError> {
        let _section = self.section.lock().await;
        let current = self.state();
        let next = state::on_success(&current, &self.config);

        self.metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record_success();
        let result = self.commit(&current, next).await;
        self.emit(BreakerEventKind::CallSucceeded, self.state());
        result
    }

    async fn record_failure<E: fmt::Display>(&self, error: &E) -> Result<(), StorageError> {
        let _section = self.section.lock().await;
        let current = self.state();
        let next = state::on_failure(&current, &self.config, self.clock.now());

        self.metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record_failure();
        let result = self.commit(&current, next).await;
        self.emit(
            BreakerEventKind::CallFailed {
                error: error.to_string(),
            },
            self.state(),
        );
        result
    }

    /// Publishes `next` and persists it if it differs from `current`.
    ///
    /// The in-memory snapshot is updated even when persisting fails, so the
    /// breaker keeps protecting the dependency during a storage outage.
    async fn commit(&self, current: &CircuitState, next: CircuitState) -> Result<(), StorageError> {
        if *current == next {
            return Ok(());
        }

        self.replace_state(next.clone());
        if current.status() != next.status() {
            self.metrics
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .record_transition(next.status());
            self.emit(
                BreakerEventKind::StateChanged {
                    from: current.status(),
                    to: next.status(),
                },
                next.clone(),
            );
        }

        self.repository.save(&next).await
    }

    fn replace_state(&self, next: CircuitState) -> CircuitState {
        std::mem::replace(
            &mut *self
                .state
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
            next,
        )
    }

    fn emit(&self, kind: BreakerEventKind, state: CircuitState) {
        self.events.emit(&BreakerEvent::new(kind, state));
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("service_key", &self.service_key)
            .field("state", &self.state())
            .field("config", &self.config)
            .field("repository", &self.repository)
            .finish()
    }
}

/// Builder for [`CircuitBreaker`].
///
/// Defaults: [`CircuitBreakerConfig::default`], a repository that persists
/// nothing, [`SystemClock`] and [`TracingEventSink`].
#[derive(Debug)]
pub struct CircuitBreakerBuilder {
    service_key: String,
    config: CircuitBreakerConfig,
    repository: Option<CircuitStateRepository>,
    clock: ArcClock,
    events: Arc<dyn EventSink>,
}

impl CircuitBreakerBuilder {
    /// Creates a builder for `service_key`.
    pub fn new(service_key: impl Into<String>) -> Self {
        Self {
            service_key: service_key.into(),
            config: CircuitBreakerConfig::default(),
            repository: None,
            clock: Arc::new(SystemClock),
            events: Arc::new(TracingEventSink),
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: CircuitBreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the repository used to load and persist state.
    pub fn repository(mut self, repository: CircuitStateRepository) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Sets the time source.
    pub fn clock(mut self, clock: ArcClock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the sink receiving lifecycle events.
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Builds the breaker, loading any persisted state.
    ///
    /// A corrupted record is logged and replaced by a closed state on the
    /// next transition.
    ///
    /// # Errors
    ///
    /// Returns the repository's error if the state cannot be read.
    pub async fn build(self) -> Result<CircuitBreaker, StorageError> {
        let repository = self
            .repository
            .unwrap_or_else(CircuitStateRepository::in_memory_only);

        let state = match repository.find(&self.service_key).await {
            Ok(Some(state)) => {
                tracing::debug!(
                    service = %self.service_key,
                    state = %state.status(),
                    failure_count = state.failure_count(),
                    "Restored circuit state"
                );
                state
            }
            Ok(None) => CircuitState::closed(self.service_key.as_str()),
            Err(e) if e.is_corruption() => {
                tracing::warn!(
                    service = %self.service_key,
                    error = %e,
                    "Ignoring corrupted circuit state"
                );
                CircuitState::closed(self.service_key.as_str())
            }
            Err(e) => return Err(e),
        };

        Ok(CircuitBreaker {
            service_key: self.service_key,
            config: self.config.normalized(),
            repository,
            clock: self.clock,
            events: self.events,
            section: Mutex::new(()),
            state: RwLock::new(state),
            metrics: RwLock::new(BreakerMetrics::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::RecordingEventSink;
    use crate::core::clock::ManualClock;
    use crate::core::hasher::storage_key;
    use crate::storage::testing::FailingStorageAdapter;
    use crate::storage::{InMemoryStorageAdapter, StorageAdapter};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Harness {
        clock: Arc<ManualClock>,
        memory: Arc<InMemoryStorageAdapter>,
        events: Arc<RecordingEventSink>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                clock: Arc::new(ManualClock::new(1_000)),
                memory: Arc::new(InMemoryStorageAdapter::new()),
                events: Arc::new(RecordingEventSink::new()),
            }
        }

        async fn breaker(&self, config: CircuitBreakerConfig) -> CircuitBreaker {
            CircuitBreaker::builder("payments")
                .config(config)
                .repository(CircuitStateRepository::new(self.memory.clone()))
                .clock(self.clock.clone())
                .event_sink(self.events.clone())
                .build()
                .await
                .unwrap()
        }

        async fn persisted(&self) -> Option<CircuitState> {
            CircuitStateRepository::new(self.memory.clone())
                .find("payments")
                .await
                .unwrap()
        }
    }

    fn config(failures: u32, successes: u32, timeout: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(failures)
            .with_success_threshold(successes)
            .with_timeout(Duration::from_secs(timeout))
    }

    async fn fail(breaker: &CircuitBreaker) -> CircuitBreakerError<String> {
        breaker
            .call(|| async { Err::<(), _>("boom".to_string()) })
            .await
            .unwrap_err()
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<u32, CircuitBreakerError<String>> {
        breaker.call(|| async { Ok::<_, String>(7) }).await
    }

    #[tokio::test]
    async fn test_passes_through_when_closed() {
        let harness = Harness::new();
        let breaker = harness.breaker(CircuitBreakerConfig::default()).await;

        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        assert!(breaker.state().is_closed());
        assert_eq!(breaker.metrics().successful_requests, 1);
        // Nothing changed, nothing written.
        assert_eq!(harness.persisted().await, None);
    }

    #[tokio::test]
    async fn test_failures_below_threshold_stay_closed() {
        let harness = Harness::new();
        let breaker = harness.breaker(config(3, 1, 60)).await;

        assert!(fail(&breaker).await.is_operation_error());
        assert!(fail(&breaker).await.is_operation_error());
        assert!(breaker.state().is_closed());
        assert_eq!(breaker.failure_count(), 2);
        assert_eq!(harness.persisted().await.unwrap().failure_count(), 2);

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(harness.persisted().await.unwrap().failure_count(), 0);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let harness = Harness::new();
        let breaker = harness.breaker(config(1, 1, 30)).await;

        fail(&breaker).await;
        assert_eq!(breaker.status(), CircuitStatus::Open);

        let invoked = AtomicU32::new(0);
        harness.clock.advance(10);
        let err = breaker
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await
            .unwrap_err();

        match err {
            CircuitBreakerError::CircuitOpen {
                service,
                retry_after,
            } => {
                assert_eq!(service, "payments");
                assert_eq!(retry_after, Some(Duration::from_secs(20)));
            }
            other => panic!("expected open circuit, got {other:?}"),
        }
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.metrics().rejected_requests, 1);
    }

    #[tokio::test]
    async fn test_timeout_moves_to_half_open_before_executing() {
        let harness = Harness::new();
        let breaker = harness.breaker(config(1, 2, 30)).await;

        fail(&breaker).await;
        harness.clock.advance(30);

        let seen = breaker
            .call(|| async { Ok::<_, String>(breaker.status()) })
            .await
            .unwrap();
        assert_eq!(seen, CircuitStatus::HalfOpen);
        assert!(breaker.state().is_half_open());
        assert_eq!(breaker.success_count(), 1);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let harness = Harness::new();
        let breaker = harness.breaker(config(1, 3, 0)).await;

        fail(&breaker).await;
        succeed(&breaker).await.unwrap();
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.success_count(), 2);

        // Freeze the clock so the reopened circuit rejects.
        let breaker = CircuitBreaker::builder("payments")
            .config(config(1, 3, 60))
            .repository(CircuitStateRepository::new(harness.memory.clone()))
            .clock(harness.clock.clone())
            .build()
            .await
            .unwrap();
        assert!(breaker.state().is_half_open());

        fail(&breaker).await;
        assert!(breaker.state().is_open());
        assert_eq!(breaker.success_count(), 0);
        assert!(fail(&breaker).await.is_circuit_open());
    }

    #[tokio::test]
    async fn test_threshold_two_timeout_zero_walkthrough() {
        let harness = Harness::new();
        let breaker = harness.breaker(config(2, 1, 0)).await;

        fail(&breaker).await;
        fail(&breaker).await;
        assert!(breaker.state().is_open());
        assert_eq!(harness.persisted().await.unwrap().status(), CircuitStatus::Open);

        succeed(&breaker).await.unwrap();
        let state = breaker.state();
        assert!(state.is_closed());
        assert_eq!((state.failure_count(), state.success_count()), (0, 0));

        assert_eq!(
            harness.events.transitions(),
            vec![
                (CircuitStatus::Closed, CircuitStatus::Open),
                (CircuitStatus::Open, CircuitStatus::HalfOpen),
                (CircuitStatus::HalfOpen, CircuitStatus::Closed),
            ]
        );
        let metrics = breaker.metrics();
        assert_eq!((metrics.times_opened, metrics.times_closed), (1, 1));
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let harness = Harness::new();
        let breaker = harness.breaker(config(2, 1, 60)).await;
        fail(&breaker).await;
        fail(&breaker).await;
        drop(breaker);

        let restarted = harness.breaker(config(2, 1, 60)).await;
        assert!(restarted.state().is_open());
        assert_eq!(restarted.failure_count(), 2);
        assert!(fail(&restarted).await.is_circuit_open());
    }

    #[tokio::test]
    async fn test_fallback_receives_rejection_and_is_not_counted() {
        let harness = Harness::new();
        let breaker = harness.breaker(config(1, 1, 60)).await;

        let value = breaker
            .call_with_fallback(
                || async { Err::<u32, _>("down".to_string()) },
                |err| async move {
                    assert!(err.is_operation_error());
                    1
                },
            )
            .await;
        assert_eq!(value, 1);
        let before = breaker.state();

        let value = breaker
            .call_with_fallback(
                || async { Ok::<u32, String>(5) },
                |err| async move {
                    assert!(err.is_circuit_open());
                    2
                },
            )
            .await;
        assert_eq!(value, 2);
        assert_eq!(breaker.state(), before);
        assert_eq!(breaker.metrics().fallbacks_invoked, 2);
        assert!(harness.events.names().contains(&"fallback_invoked"));
    }

    #[tokio::test]
    async fn test_force_open_close_reset() {
        let harness = Harness::new();
        let breaker = harness.breaker(config(5, 1, 60)).await;

        breaker.force_open().await.unwrap();
        assert!(breaker.state().is_open());
        assert_eq!(breaker.state().last_failure_time(), Some(1_000));
        assert!(fail(&breaker).await.is_circuit_open());

        breaker.force_close().await.unwrap();
        assert!(breaker.state().is_closed());
        assert_eq!(harness.persisted().await.unwrap().status(), CircuitStatus::Closed);

        fail(&breaker).await;
        breaker.reset().await.unwrap();
        assert_eq!(breaker.state(), CircuitState::closed("payments"));
        assert_eq!(breaker.metrics().total_requests, 0);
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_changes() {
        let harness = Harness::new();
        let breaker = harness.breaker(config(5, 1, 60)).await;

        let other = harness.breaker(config(5, 1, 60)).await;
        other.force_open().await.unwrap();
        assert!(breaker.state().is_closed());

        let reloaded = breaker.reload().await.unwrap();
        assert!(reloaded.is_open());
        assert!(breaker.state().is_open());

        harness.memory.clear().await.unwrap();
        assert!(breaker.reload().await.unwrap().is_closed());
    }

    async fn breaker_on(adapter: Arc<FailingStorageAdapter>, failures: u32) -> CircuitBreaker {
        CircuitBreaker::builder("payments")
            .config(config(failures, 1, 60))
            .repository(CircuitStateRepository::new(adapter))
            .clock(Arc::new(ManualClock::new(0)))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unreadable_state_fails_build() {
        let result = CircuitBreaker::builder("payments")
            .repository(CircuitStateRepository::new(Arc::new(
                FailingStorageAdapter::new("disk"),
            )))
            .build()
            .await;
        assert!(result.unwrap_err().is_read_error());
    }

    #[tokio::test]
    async fn test_unsaved_open_transition_reports_both_errors() {
        let adapter = Arc::new(FailingStorageAdapter::failing_times("disk", 0));
        let breaker = breaker_on(adapter.clone(), 1).await;
        adapter.fail_next(u32::MAX);

        let err = fail(&breaker).await;
        assert!(err.is_operation_error());
        assert!(err.is_storage_error());
        assert!(err.storage_error().is_some_and(|e| e.is_write_error()));
        assert_eq!(err.into_operation_error().as_deref(), Some("boom"));

        // Memory moved on even though storage did not.
        assert!(breaker.state().is_open());
        assert!(fail(&breaker).await.is_circuit_open());

        adapter.fail_next(0);
        assert_eq!(breaker.repository().find("payments").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_storage_error_surfaces_on_success_path() {
        let adapter = Arc::new(FailingStorageAdapter::failing_times("disk", 0));
        let breaker = breaker_on(adapter.clone(), 2).await;

        fail(&breaker).await;
        assert_eq!(breaker.failure_count(), 1);

        adapter.fail_next(u32::MAX);
        let err = succeed(&breaker).await.unwrap_err();
        assert!(err.is_storage_error());
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupted_state_starts_closed() {
        let harness = Harness::new();
        harness
            .memory
            .write(&storage_key("payments"), b"not json", None)
            .await
            .unwrap();

        let breaker = harness.breaker(CircuitBreakerConfig::default()).await;
        assert!(breaker.state().is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_are_all_counted() {
        let harness = Harness::new();
        let breaker = Arc::new(harness.breaker(config(1_000, 1, 60)).await);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let breaker = breaker.clone();
            handles.push(tokio::spawn(async move {
                let _ = breaker
                    .call(|| async { Err::<(), _>("boom".to_string()) })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(breaker.failure_count(), 50);
        assert_eq!(harness.persisted().await.unwrap().failure_count(), 50);
    }
}
