//! Provider trait for model invocation.
//!
//! Providers implement [`ModelInvoker`] rather than exposing their wire
//! formats. This enables:
//! - Decorator patterns: `RetryingInvoker` wraps any invoker
//! - A single engine that orchestrates batches against any provider
//! - Mock invokers in tests with no network involved
//!
//! # Streaming contract
//!
//! `invoke_stream` yields text fragments; [`collect_text`] concatenates
//! every fragment before parsing, so the streamed and buffered paths feed
//! the normalizer identically.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

use crate::Result;
use crate::prompt::Prompt;
use crate::types::{InvokeOptions, ResponseMode};

/// Fragment of a streamed model response.
#[derive(Debug, Clone, PartialEq)]
pub enum TextEvent {
    /// Text delta.
    Delta(String),
    /// Stream complete.
    Done,
}

/// Boxed stream of text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<TextEvent>> + Send>>;

/// Provider for model invocation.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Single-response invocation; returns the model's raw text.
    async fn invoke(&self, prompt: &Prompt, options: &InvokeOptions) -> Result<String>;

    /// Streaming invocation.
    async fn invoke_stream(&self, prompt: &Prompt, options: &InvokeOptions)
    -> Result<TextStream>;
}

/// Concatenate all text fragments of a stream into one string.
pub async fn collect_text(mut stream: TextStream) -> Result<String> {
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            TextEvent::Delta(fragment) => text.push_str(&fragment),
            TextEvent::Done => break,
        }
    }
    Ok(text)
}

/// Invoke per the options' response mode, returning the full text either way.
pub async fn invoke_text(
    invoker: &dyn ModelInvoker,
    prompt: &Prompt,
    options: &InvokeOptions,
) -> Result<String> {
    match options.mode {
        ResponseMode::Buffered => invoker.invoke(prompt, options).await,
        ResponseMode::Streamed => {
            let stream = invoker.invoke_stream(prompt, options).await?;
            collect_text(stream).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn stream_of(events: Vec<Result<TextEvent>>) -> TextStream {
        Box::pin(stream::iter(events))
    }

    #[tokio::test]
    async fn collect_text_concatenates_fragments() {
        let stream = stream_of(vec![
            Ok(TextEvent::Delta("[{\"row\"".into())),
            Ok(TextEvent::Delta(": {}}".into())),
            Ok(TextEvent::Delta("]".into())),
            Ok(TextEvent::Done),
        ]);
        assert_eq!(collect_text(stream).await.unwrap(), "[{\"row\": {}}]");
    }

    #[tokio::test]
    async fn collect_text_stops_at_done() {
        let stream = stream_of(vec![
            Ok(TextEvent::Delta("a".into())),
            Ok(TextEvent::Done),
            Ok(TextEvent::Delta("ignored".into())),
        ]);
        assert_eq!(collect_text(stream).await.unwrap(), "a");
    }

    #[tokio::test]
    async fn collect_text_propagates_stream_errors() {
        let stream = stream_of(vec![
            Ok(TextEvent::Delta("a".into())),
            Err(crate::ChemSnapError::Stream("connection reset".into())),
        ]);
        assert!(collect_text(stream).await.is_err());
    }

    #[tokio::test]
    async fn collect_text_handles_unterminated_stream() {
        // Providers that end without an explicit Done still produce full text.
        let stream = stream_of(vec![Ok(TextEvent::Delta("partial".into()))]);
        assert_eq!(collect_text(stream).await.unwrap(), "partial");
    }
}
