//! Batch orchestration: partition → build request → invoke → normalize.
//!
//! Batches fan out concurrently; `buffered` yields results in dispatch
//! order, so the aggregated list mirrors input order no matter when each
//! batch completes. Each batch's state is independent — a failed batch
//! degrades to an error record and its siblings proceed untouched.
//!
//! Per batch the lifecycle is Pending → Sent → (Succeeded | Throttled→Sent
//! | Failed); throttling retries happen inside the invoker decorator, and
//! terminal outcomes never retry further.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{StreamExt, stream};
use tracing::{debug, instrument};

use crate::batch::{self, DEFAULT_BATCH_SIZE};
use crate::cache::{CacheConfig, PredictionCache};
use crate::normalize;
use crate::prompt;
use crate::providers::{ModelInvoker, invoke_text};
use crate::telemetry;
use crate::types::{InputRow, InvocationResult, InvokeOptions};
use crate::Result;

/// Default number of batches in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Orchestrates batched classification against one invoker.
pub struct BatchEngine {
    invoker: Arc<dyn ModelInvoker>,
    options: InvokeOptions,
    batch_size: usize,
    concurrency: usize,
    dispatch_delay: Option<Duration>,
    cache: Option<PredictionCache>,
}

impl BatchEngine {
    /// Create an engine with default batching and no cache.
    pub fn new(invoker: Arc<dyn ModelInvoker>, options: InvokeOptions) -> Self {
        Self {
            invoker,
            options,
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            dispatch_delay: None,
            cache: None,
        }
    }

    /// Set the number of rows per batch.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the number of batches in flight at once.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Stagger batch dispatches by a fixed delay to stay under provider
    /// rate limits. Batch `i` waits `delay * i` before sending.
    pub fn dispatch_delay(mut self, delay: Duration) -> Self {
        self.dispatch_delay = Some(delay);
        self
    }

    /// Enable the prediction cache.
    pub fn cache(mut self, config: &CacheConfig) -> Self {
        self.cache = Some(PredictionCache::new(config));
        self
    }

    /// Classify all rows, returning one result per batch in input order.
    ///
    /// The only `Err` paths are input errors (zero batch size, unserializable
    /// rows caught per batch); provider failures degrade to per-batch error
    /// records.
    #[instrument(skip(self, rows), fields(row_count = rows.len(), batch_size = self.batch_size))]
    pub async fn run(&self, rows: &[InputRow]) -> Result<Vec<InvocationResult>> {
        let batches = batch::partition(rows, self.batch_size)?;
        debug!(batches = batches.len(), "dispatching batches");
        let results = stream::iter(batches.into_iter().enumerate())
            .map(|(index, rows)| self.run_batch(index, rows))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;
        Ok(results)
    }

    async fn run_batch(&self, index: usize, rows: &[InputRow]) -> InvocationResult {
        if let Some(delay) = self.dispatch_delay
            && index > 0
        {
            tokio::time::sleep(delay * index as u32).await;
        }

        let prompt = match prompt::classification_prompt(rows) {
            Ok(prompt) => prompt,
            Err(e) => {
                return InvocationResult::failed(rows, format!("failed to build request: {e}"), None);
            }
        };

        if let Some(cache) = &self.cache {
            if let Some(records) = cache.get(&self.options.model, &prompt.user).await {
                return InvocationResult::Predictions(records);
            }
        }

        let start = Instant::now();
        let outcome = invoke_text(self.invoker.as_ref(), &prompt, &self.options).await;
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => self.invoker.name().to_owned(),
            "operation" => "classify",
        )
        .record(start.elapsed().as_secs_f64());

        match outcome {
            Ok(raw) => {
                let result = normalize::parse_predictions(rows, &raw);
                if let (Some(cache), InvocationResult::Predictions(records)) =
                    (&self.cache, &result)
                {
                    cache
                        .insert(&self.options.model, &prompt.user, records.clone())
                        .await;
                }
                self.record_request(!result.is_failed());
                result
            }
            Err(e) => {
                self.record_request(false);
                InvocationResult::failed(rows, e.to_string(), None)
            }
        }
    }

    fn record_request(&self, ok: bool) {
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => self.invoker.name().to_owned(),
            "operation" => "classify",
            "status" => if ok { "ok" } else { "error" },
        )
        .increment(1);
    }
}
