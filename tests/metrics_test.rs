//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use chemsnap::providers::retry::{RetryConfig, RetryingInvoker};
use chemsnap::providers::traits::{ModelInvoker, TextStream};
use chemsnap::telemetry;
use chemsnap::{BatchEngine, CacheConfig, ChemSnapError, InputRow, InvokeOptions, Prompt, Result};

// ============================================================================
// Mock invokers
// ============================================================================

struct EmptyArrayInvoker;

#[async_trait]
impl ModelInvoker for EmptyArrayInvoker {
    fn name(&self) -> &str {
        "mock-ok"
    }

    async fn invoke(&self, _prompt: &Prompt, _options: &InvokeOptions) -> Result<String> {
        Ok("[]".into())
    }

    async fn invoke_stream(
        &self,
        _prompt: &Prompt,
        _options: &InvokeOptions,
    ) -> Result<TextStream> {
        Err(ChemSnapError::Stream("not used".into()))
    }
}

struct ThrottleOnceInvoker {
    throttles_left: AtomicU32,
}

#[async_trait]
impl ModelInvoker for ThrottleOnceInvoker {
    fn name(&self) -> &str {
        "mock-throttle"
    }

    async fn invoke(&self, _prompt: &Prompt, _options: &InvokeOptions) -> Result<String> {
        if self.throttles_left.load(Ordering::Relaxed) > 0 {
            self.throttles_left.fetch_sub(1, Ordering::Relaxed);
            return Err(ChemSnapError::Throttled { retry_after: None });
        }
        Ok("[]".into())
    }

    async fn invoke_stream(
        &self,
        _prompt: &Prompt,
        _options: &InvokeOptions,
    ) -> Result<TextStream> {
        Err(ChemSnapError::Stream("not used".into()))
    }
}

// ============================================================================
// Snapshot helpers
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

fn rows(n: usize) -> Vec<InputRow> {
    (0..n)
        .map(|i| InputRow::from_pairs([("Number", format!("N{i}"))]))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn engine_run_records_request_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let engine = BatchEngine::new(
                    Arc::new(EmptyArrayInvoker),
                    InvokeOptions::new("test-model"),
                )
                .batch_size(5);
                engine.run(&rows(10)).await
            })
        })
    });
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();

    let count = counter_total(&snapshot, telemetry::REQUESTS_TOTAL);
    assert_eq!(count, 2, "expected one request counter per batch");

    assert!(
        has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS),
        "expected a duration histogram entry"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn throttle_retries_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let invoker = RetryingInvoker::new(
                    Arc::new(ThrottleOnceInvoker {
                        throttles_left: AtomicU32::new(1),
                    }),
                    RetryConfig::new()
                        .max_attempts(3)
                        .initial_delay(Duration::from_millis(1))
                        .jitter(false),
                );
                invoker
                    .invoke(&Prompt::text("x"), &InvokeOptions::new("test-model"))
                    .await
            })
        })
    });
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cache_hits_and_misses_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let engine = BatchEngine::new(
                    Arc::new(EmptyArrayInvoker),
                    InvokeOptions::new("test-model"),
                )
                .batch_size(10)
                .cache(&CacheConfig::new());
                let input = rows(5);
                engine.run(&input).await.unwrap();
                engine.run(&input).await.unwrap();
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let engine = BatchEngine::new(
        Arc::new(EmptyArrayInvoker),
        InvokeOptions::new("test-model"),
    );
    let _result = engine.run(&rows(3)).await.unwrap();
}
