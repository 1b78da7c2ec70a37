//! Engine orchestration tests: ordering, isolation, streaming, caching.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chemsnap::providers::traits::{ModelInvoker, TextEvent, TextStream};
use chemsnap::{
    BatchEngine, CacheConfig, ChemSnapError, InputRow, InvocationResult, InvokeOptions, Prompt,
    ResponseMode, Result,
};
use serde_json::{Value, json};

/// Mock invoker that echoes each prompt line back as a prediction record.
///
/// Rows whose serialized form contains `THROTTLE` fail the batch with a
/// throttling error; `GARBAGE` makes the model reply with non-JSON text.
/// To shuffle completion order, earlier batches sleep longer than later
/// ones (keyed off the first row's `Number` field).
struct EchoInvoker {
    total_calls: AtomicU32,
}

impl EchoInvoker {
    fn new() -> Self {
        Self {
            total_calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::Relaxed)
    }

    fn respond(&self, prompt: &Prompt) -> Result<String> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if prompt.user.contains("THROTTLE") {
            return Err(ChemSnapError::Throttled { retry_after: None });
        }
        if prompt.user.contains("GARBAGE") {
            return Ok("the model refused to answer in JSON".into());
        }
        let records: Vec<Value> = prompt
            .user
            .lines()
            .map(|line| {
                let row: Value = serde_json::from_str(line).expect("engine sends JSON rows");
                json!({"row": row, "prediction": "Not a Chemical"})
            })
            .collect();
        Ok(serde_json::to_string(&records).expect("records serialize"))
    }

    /// Sleep so that batches complete in reverse dispatch order.
    async fn stagger(&self, prompt: &Prompt) {
        let first_number = prompt
            .user
            .lines()
            .next()
            .and_then(|line| serde_json::from_str::<Value>(line).ok())
            .and_then(|row| {
                row.get("Number")
                    .and_then(Value::as_str)
                    .and_then(|n| n.trim_start_matches('R').parse::<u64>().ok())
            })
            .unwrap_or(0);
        let delay = 30u64.saturating_sub(first_number);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

#[async_trait]
impl ModelInvoker for EchoInvoker {
    fn name(&self) -> &str {
        "mock-echo"
    }

    async fn invoke(&self, prompt: &Prompt, _options: &InvokeOptions) -> Result<String> {
        self.stagger(prompt).await;
        self.respond(prompt)
    }

    async fn invoke_stream(
        &self,
        prompt: &Prompt,
        _options: &InvokeOptions,
    ) -> Result<TextStream> {
        // Chop the full response into small fragments, splitting JSON tokens
        // mid-way, the way real streamed chunks arrive.
        let text = self.respond(prompt)?;
        let mut events: Vec<Result<TextEvent>> = text
            .as_bytes()
            .chunks(7)
            .map(|chunk| Ok(TextEvent::Delta(String::from_utf8_lossy(chunk).into_owned())))
            .collect();
        events.push(Ok(TextEvent::Done));
        Ok(Box::pin(futures_util::stream::iter(events)))
    }
}

fn rows(n: usize) -> Vec<InputRow> {
    (0..n)
        .map(|i| {
            InputRow::from_pairs([
                ("Number", format!("R{i}")),
                ("Part_Description", format!("part {i}")),
            ])
        })
        .collect()
}

fn engine(invoker: Arc<EchoInvoker>) -> BatchEngine {
    BatchEngine::new(invoker, InvokeOptions::new("test-model"))
}

/// Extract the echoed `Number` values from a run's results, flattened.
fn echoed_numbers(results: &[InvocationResult]) -> Vec<String> {
    results
        .iter()
        .flat_map(|result| result.predictions().expect("batch should succeed"))
        .map(|record| record.row["Number"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn twenty_five_rows_batch_ten_yields_three_batches() {
    let invoker = Arc::new(EchoInvoker::new());
    let engine = engine(invoker.clone()).batch_size(10);

    let results = engine.run(&rows(25)).await.unwrap();

    assert_eq!(results.len(), 3);
    let sizes: Vec<usize> = results
        .iter()
        .map(|r| r.predictions().unwrap().len())
        .collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(invoker.call_count(), 3);
}

#[tokio::test]
async fn aggregated_results_preserve_input_order() {
    let invoker = Arc::new(EchoInvoker::new());
    // High concurrency plus the mock's reverse stagger: completion order is
    // scrambled, result order must not be.
    let engine = engine(invoker).batch_size(10).concurrency(8);

    let input = rows(25);
    let results = engine.run(&input).await.unwrap();

    let expected: Vec<String> = (0..25).map(|i| format!("R{i}")).collect();
    assert_eq!(echoed_numbers(&results), expected);
}

#[tokio::test]
async fn failed_batch_does_not_abort_siblings() {
    let invoker = Arc::new(EchoInvoker::new());
    let engine = engine(invoker).batch_size(2).concurrency(4);

    let mut input = rows(6);
    // Poison the middle batch (rows 2 and 3)
    input[3].insert("Part_Description", "THROTTLE");

    let results = engine.run(&input).await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(!results[0].is_failed());
    assert!(results[1].is_failed());
    assert!(!results[2].is_failed());

    match &results[1] {
        InvocationResult::Failed(failure) => {
            assert_eq!(failure.batch.len(), 2);
            assert_eq!(failure.batch[0].get("Number"), Some(&json!("R2")));
        }
        InvocationResult::Predictions(_) => unreachable!(),
    }
}

#[tokio::test]
async fn garbage_output_degrades_to_error_record_with_raw_text() {
    let invoker = Arc::new(EchoInvoker::new());
    let engine = engine(invoker).batch_size(10);

    let mut input = rows(3);
    input[0].insert("Part_Description", "GARBAGE");

    let results = engine.run(&input).await.unwrap();

    assert_eq!(results.len(), 1);
    match &results[0] {
        InvocationResult::Failed(failure) => {
            assert_eq!(
                failure.raw_text.as_deref(),
                Some("the model refused to answer in JSON")
            );
            assert_eq!(failure.batch.len(), 3);
        }
        InvocationResult::Predictions(_) => panic!("garbage output must not parse"),
    }
}

#[tokio::test]
async fn streamed_mode_matches_buffered_mode() {
    let input = rows(25);

    let buffered_invoker = Arc::new(EchoInvoker::new());
    let buffered = engine(buffered_invoker).batch_size(10);
    let buffered_results = buffered.run(&input).await.unwrap();

    let streamed_invoker = Arc::new(EchoInvoker::new());
    let streamed = BatchEngine::new(
        streamed_invoker,
        InvokeOptions::new("test-model").mode(ResponseMode::Streamed),
    )
    .batch_size(10);
    let streamed_results = streamed.run(&input).await.unwrap();

    assert_eq!(buffered_results, streamed_results);
}

#[tokio::test]
async fn cache_hit_skips_provider_call() {
    let invoker = Arc::new(EchoInvoker::new());
    let engine = BatchEngine::new(invoker.clone(), InvokeOptions::new("test-model"))
        .batch_size(10)
        .cache(&CacheConfig::new());

    let input = rows(5);
    let first = engine.run(&input).await.unwrap();
    assert_eq!(invoker.call_count(), 1);

    let second = engine.run(&input).await.unwrap();
    assert_eq!(invoker.call_count(), 1); // served from cache
    assert_eq!(first, second);
}

#[tokio::test]
async fn dispatch_delay_staggers_batches() {
    let invoker = Arc::new(EchoInvoker::new());
    let engine = engine(invoker)
        .batch_size(1)
        .concurrency(4)
        .dispatch_delay(Duration::from_millis(20));

    let start = std::time::Instant::now();
    let results = engine.run(&rows(3)).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(results.len(), 3);
    // Third batch waits 2 * 20ms before sending.
    assert!(elapsed >= Duration::from_millis(40));
}

#[tokio::test]
async fn zero_batch_size_is_an_input_error() {
    let invoker = Arc::new(EchoInvoker::new());
    let engine = engine(invoker).batch_size(0);

    let err = engine.run(&rows(3)).await.unwrap_err();
    assert!(matches!(err, ChemSnapError::InvalidInput(_)));
}
