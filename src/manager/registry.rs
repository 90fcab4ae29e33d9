//! Per-process registry of breakers.

use crate::audit::{EventSink, TracingEventSink};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::core::clock::{ArcClock, SystemClock};
use crate::core::error::StorageError;
use crate::repository::CircuitStateRepository;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Hands out one shared [`CircuitBreaker`] per service key.
///
/// Every breaker created by the registry shares its repository, clock and
/// event sink. Configuration defaults to the registry-wide value and can be
/// overridden per service.
#[derive(Debug)]
pub struct BreakerRegistry {
    repository: CircuitStateRepository,
    config: CircuitBreakerConfig,
    overrides: HashMap<String, CircuitBreakerConfig>,
    clock: ArcClock,
    events: Arc<dyn EventSink>,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Creates a registry persisting through `repository`.
    pub fn new(repository: CircuitStateRepository) -> Self {
        Self {
            repository,
            config: CircuitBreakerConfig::default(),
            overrides: HashMap::new(),
            clock: Arc::new(SystemClock),
            events: Arc::new(TracingEventSink),
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the configuration used for services without an override.
    pub fn with_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the configuration for one service.
    pub fn with_service_config(
        mut self,
        service_key: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Self {
        self.overrides.insert(service_key.into(), config);
        self
    }

    /// Sets the time source.
    pub fn with_clock(mut self, clock: ArcClock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the event sink.
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the configuration that applies to `service_key`.
    pub fn config_for(&self, service_key: &str) -> &CircuitBreakerConfig {
        self.overrides.get(service_key).unwrap_or(&self.config)
    }

    /// Returns the breaker for `service_key`, creating it on first use.
    ///
    /// Creation loads the persisted state, so the first call for a service
    /// resumes whatever a previous process left behind.
    pub async fn get_or_create(
        &self,
        service_key: &str,
    ) -> Result<Arc<CircuitBreaker>, StorageError> {
        let mut breakers = self.breakers.lock().await;
        if let Some(breaker) = breakers.get(service_key) {
            return Ok(Arc::clone(breaker));
        }

        let breaker = Arc::new(
            CircuitBreaker::builder(service_key)
                .config(self.config_for(service_key).clone())
                .repository(self.repository.clone())
                .clock(Arc::clone(&self.clock))
                .event_sink(Arc::clone(&self.events))
                .build()
                .await?,
        );
        tracing::debug!(service = %service_key, "Registered circuit breaker");

        breakers.insert(service_key.to_string(), Arc::clone(&breaker));
        Ok(breaker)
    }

    /// Returns the breaker for `service_key` if it was already created.
    pub async fn get(&self, service_key: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.lock().await.get(service_key).cloned()
    }

    /// Drops the registry's handle to a breaker. Its persisted state is kept.
    pub async fn remove(&self, service_key: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.lock().await.remove(service_key)
    }

    /// Returns the service keys of every created breaker, sorted.
    pub async fn service_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.breakers.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::storage::InMemoryStorageAdapter;
    use std::time::Duration;

    fn registry() -> BreakerRegistry {
        BreakerRegistry::new(CircuitStateRepository::new(Arc::new(
            InMemoryStorageAdapter::new(),
        )))
        .with_clock(Arc::new(ManualClock::new(0)))
    }

    #[tokio::test]
    async fn test_same_breaker_per_key() {
        let registry = registry();
        let a = registry.get_or_create("a").await.unwrap();
        let again = registry.get_or_create("a").await.unwrap();
        let b = registry.get_or_create("b").await.unwrap();

        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.service_keys().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_service_override() {
        let registry = registry()
            .with_config(CircuitBreakerConfig::new().with_failure_threshold(7))
            .with_service_config(
                "fragile",
                CircuitBreakerConfig::new()
                    .with_failure_threshold(1)
                    .with_timeout(Duration::from_secs(5)),
            );

        let fragile = registry.get_or_create("fragile").await.unwrap();
        let sturdy = registry.get_or_create("sturdy").await.unwrap();
        assert_eq!(fragile.config().failure_threshold, 1);
        assert_eq!(sturdy.config().failure_threshold, 7);
    }

    #[tokio::test]
    async fn test_remove_keeps_persisted_state() {
        let registry = registry();
        let breaker = registry.get_or_create("svc").await.unwrap();
        breaker.force_open().await.unwrap();

        assert!(registry.remove("svc").await.is_some());
        assert!(registry.get("svc").await.is_none());

        let recreated = registry.get_or_create("svc").await.unwrap();
        assert!(!Arc::ptr_eq(&breaker, &recreated));
        assert!(recreated.state().is_open());
    }
}
