//! Persistent circuit breaker example.
//!
//! This example shows how to:
//! - Persist breaker state to disk through a decorated storage stack
//! - Report storage timings through the `metrics` facade
//! - Fall back to in-memory storage when the disk fails
//! - Watch the breaker open, reject, recover and close
//! - Resume the same state after a "restart"
//!
//! Run with: RUST_LOG=debug cargo run --example persistent_breaker

use durable_breaker::prelude::*;
use durable_breaker::storage::decorators::MetricsFacadeCollector;
use durable_breaker::storage::ArcStorageAdapter;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn storage_stack(dir: &std::path::Path) -> Result<ArcStorageAdapter, StorageError> {
    let file = MetricsStorageDecorator::new(
        RetryStorageDecorator::new(
            LoggingStorageDecorator::new(FileStorageAdapter::new(dir)?),
            RetryConfig::new()
                .with_max_attempts(3)
                .with_initial_delay(Duration::from_millis(20)),
        ),
        Arc::new(MetricsFacadeCollector),
    );
    let memory = InMemoryStorageAdapter::new().with_name("memory");

    let chain = FallbackStorageAdapter::new(vec![
        Arc::new(file) as ArcStorageAdapter,
        Arc::new(memory) as ArcStorageAdapter,
    ])?;
    Ok(Arc::new(chain))
}

async fn flaky_dependency(calls: &AtomicU32) -> Result<&'static str, String> {
    let n = calls.fetch_add(1, Ordering::SeqCst);
    if (2..5).contains(&n) {
        Err(format!("upstream timeout on call {n}"))
    } else {
        Ok("200 OK")
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Persistent Circuit Breaker Example ===\n");

    let dir = tempfile::tempdir()?;
    let repository = CircuitStateRepository::new(storage_stack(dir.path())?);

    let config = CircuitBreakerConfig::default()
        .with_failure_threshold(3)
        .with_success_threshold(1)
        .with_timeout(Duration::from_secs(1));

    println!("Configuration:");
    println!("  Failure threshold: {}", config.failure_threshold);
    println!("  Success threshold: {}", config.success_threshold);
    println!("  Timeout: {:?}", config.timeout);
    println!("  State directory: {}\n", dir.path().display());

    let breaker = CircuitBreaker::builder("inventory-api")
        .config(config.clone())
        .repository(repository.clone())
        .build()
        .await?;

    let calls = AtomicU32::new(0);
    for i in 1..=8 {
        let response = breaker
            .call_with_fallback(
                || flaky_dependency(&calls),
                |err| async move {
                    if err.is_circuit_open() {
                        "cached response (circuit open)"
                    } else {
                        "cached response (call failed)"
                    }
                },
            )
            .await;

        let state = breaker.state();
        println!(
            "Request #{i}: {response:<32} state={} failures={}",
            state.status(),
            state.failure_count()
        );
    }

    println!("\nSimulating a restart...");
    drop(breaker);
    let restarted = CircuitBreaker::builder("inventory-api")
        .config(config)
        .repository(repository)
        .build()
        .await?;
    println!("  Restored state: {}", restarted.status());

    println!("\nWaiting for the timeout to elapse...");
    tokio::time::sleep(Duration::from_millis(2100)).await;

    match restarted.call(|| flaky_dependency(&calls)).await {
        Ok(body) => println!("  Trial call succeeded: {body}"),
        Err(e) => println!("  Trial call failed: {e}"),
    }
    println!("  State after trial call: {}", restarted.status());

    let metrics = restarted.metrics();
    println!(
        "\nMetrics since restart: {} total, {} success, {} failed, {} rejected",
        metrics.total_requests,
        metrics.successful_requests,
        metrics.failed_requests,
        metrics.rejected_requests
    );

    Ok(())
}
