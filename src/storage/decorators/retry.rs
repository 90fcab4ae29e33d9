//! Retry decorator with exponential backoff.

use crate::core::error::{StorageOperation, StorageResult};
use crate::storage::traits::{root_adapter, StorageAdapter};

use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,

    /// Delay after the first failed attempt.
    pub initial_delay: Duration,

    /// Upper bound for any single delay.
    pub max_delay: Duration,

    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,

    /// Whether to spread delays by ±25%.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sets the maximum number of attempts (at least 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier (at least 1.0).
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the delay to wait after failed attempt `attempt` (1-based).
    ///
    /// `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`,
    /// then scaled by a random factor in `[0.75, 1.25]` when jitter is on.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter && capped_delay > 0.0 {
            capped_delay * rand::thread_rng().gen_range(0.75..=1.25)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay.round() as u64)
    }

    /// Returns whether another attempt may follow attempt `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Retries every operation of the wrapped adapter with exponential backoff.
///
/// If every attempt fails, the error of the last attempt is returned as is.
/// No delay follows the final attempt.
#[derive(Debug)]
pub struct RetryStorageDecorator<A: StorageAdapter> {
    inner: A,
    config: RetryConfig,
}

impl<A: StorageAdapter> RetryStorageDecorator<A> {
    /// Wraps `inner` with the given retry configuration.
    pub fn new(inner: A, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Returns the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns the wrapped adapter.
    pub fn inner_adapter(&self) -> &A {
        &self.inner
    }

    /// Returns the innermost adapter of the decorator chain.
    pub fn root(&self) -> &dyn StorageAdapter {
        root_adapter(&self.inner)
    }

    async fn retry<T, F, Fut>(
        &self,
        operation: StorageOperation,
        key: &str,
        mut attempt_fn: F,
    ) -> StorageResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = StorageResult<T>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !self.config.should_retry(attempt) {
                        return Err(e);
                    }

                    let delay = self.config.delay_for_attempt(attempt);
                    tracing::debug!(
                        adapter = %self.inner.name(),
                        operation = %operation,
                        key = %key,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying storage operation"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl<A: StorageAdapter> StorageAdapter for RetryStorageDecorator<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.retry(StorageOperation::Read, key, || self.inner.read(key))
            .await
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()> {
        self.retry(StorageOperation::Write, key, || {
            self.inner.write(key, value, ttl)
        })
        .await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.retry(StorageOperation::Exists, key, || self.inner.exists(key))
            .await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.retry(StorageOperation::Delete, key, || self.inner.delete(key))
            .await
    }

    async fn clear(&self) -> StorageResult<()> {
        self.retry(StorageOperation::Clear, "", || self.inner.clear())
            .await
    }

    fn inner(&self) -> Option<&dyn StorageAdapter> {
        Some(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StorageError;
    use crate::storage::testing::FailingStorageAdapter;
    use std::sync::Arc;

    fn fast_config(attempts: u32) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(attempts)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false)
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert!(config.jitter);
    }

    #[test]
    fn test_no_retry() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_attempts, 1);
        assert!(!config.should_retry(1));
    }

    #[test]
    fn test_setters_clamp() {
        let config = RetryConfig::new()
            .with_max_attempts(0)
            .with_backoff_multiplier(0.5);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.backoff_multiplier, 1.0);
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0)
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0)
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_millis(1000))
            .with_jitter(true);

        for _ in 0..100 {
            let delay = config.delay_for_attempt(1).as_millis();
            assert!((750..=1250).contains(&delay), "delay {delay} out of range");
        }
    }

    #[tokio::test]
    async fn test_recovers_from_transient_failures() {
        let flaky = Arc::new(FailingStorageAdapter::failing_times("flaky", 2));
        let adapter = RetryStorageDecorator::new(flaky.clone(), fast_config(3));

        adapter.write("k", b"v", None).await.unwrap();
        assert_eq!(flaky.calls(), 3);
        assert_eq!(adapter.read("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_last_error_propagates() {
        let broken = Arc::new(FailingStorageAdapter::new("broken"));
        let adapter = RetryStorageDecorator::new(broken.clone(), fast_config(4));

        let err = adapter.read("k").await.unwrap_err();
        assert!(matches!(err, StorageError::ReadFailed { ref adapter, .. } if adapter == "broken"));
        assert_eq!(broken.calls(), 4);
    }

    #[tokio::test]
    async fn test_single_attempt_does_not_sleep() {
        let broken = Arc::new(FailingStorageAdapter::new("broken"));
        let config = RetryConfig::no_retry().with_initial_delay(Duration::from_secs(60));
        let adapter = RetryStorageDecorator::new(broken.clone(), config);

        let started = std::time::Instant::now();
        assert!(adapter.delete("k").await.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(broken.calls(), 1);
    }

    #[tokio::test]
    async fn test_root_unwraps_chain() {
        let memory = crate::storage::InMemoryStorageAdapter::new().with_name("base");
        let adapter = RetryStorageDecorator::new(memory, RetryConfig::no_retry());
        assert_eq!(adapter.root().name(), "base");
        assert_eq!(adapter.inner_adapter().name(), "base");
        assert_eq!(adapter.name(), "base");
    }
}
