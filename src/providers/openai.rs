//! OpenAI-compatible chat completions client.
//!
//! Covers batched text classification and label-image extraction (vision
//! content parts). Streaming uses the SSE wire format
//! (`data: {...}` lines, `data: [DONE]` terminator).
//! See: <https://platform.openai.com/docs/api-reference/chat>

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_stream::wrappers::ReceiverStream;
use tracing::instrument;

use super::traits::{ModelInvoker, TextEvent, TextStream};
use crate::prompt::{ImageSource, Prompt};
use crate::types::InvokeOptions;
use crate::{ChemSnapError, Result};

/// Default base URL for the OpenAI API
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Number of stream events buffered between producer and consumer.
const STREAM_BUFFER: usize = 64;

/// Client for an OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    http: Client,
    base_url: String,
}

impl OpenAiClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self::with_http_client(api_key, base_url, http)
    }

    /// Create a client sharing a pooled HTTP client.
    ///
    /// Prefer this when several providers should share a connection pool.
    pub fn with_http_client(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        http: Client,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            http,
            base_url: base_url.into(),
        }
    }

    /// Build the chat completions request body for a prompt.
    fn request_body(&self, prompt: &Prompt, options: &InvokeOptions, stream: bool) -> Value {
        let mut content = vec![json!({"type": "text", "text": prompt.user})];
        if let Some(image) = &prompt.image {
            let url = match image {
                ImageSource::Url(url) => url.clone(),
                ImageSource::Base64 { media_type, data } => {
                    format!("data:{media_type};base64,{data}")
                }
            };
            content.push(json!({"type": "image_url", "image_url": {"url": url}}));
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &prompt.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": content}));

        let mut body = json!({
            "model": options.model,
            "messages": messages,
        });
        if let Some(max) = options.max_tokens {
            body["max_tokens"] = json!(max);
        }
        if let Some(temp) = options.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(p) = options.top_p {
            body["top_p"] = json!(p);
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    /// Check response status and map to the appropriate error.
    fn handle_response_errors(&self, response: &reqwest::Response, model: &str) -> Result<()> {
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        match status.as_u16() {
            401 => Err(ChemSnapError::AuthenticationFailed),
            404 => Err(ChemSnapError::ModelNotFound(model.to_string())),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(ChemSnapError::Throttled { retry_after })
            }
            code => Err(ChemSnapError::Api {
                code: code.to_string(),
                message: format!("OpenAI API error: {status}"),
            }),
        }
    }
}

#[async_trait]
impl ModelInvoker for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(name = "openai.invoke", skip(self, prompt, options), fields(model = %options.model))]
    async fn invoke(&self, prompt: &Prompt, options: &InvokeOptions) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt, options, false))
            .send()
            .await
            .map_err(|e| ChemSnapError::Http(e.to_string()))?;

        self.handle_response_errors(&response, &options.model)?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ChemSnapError::Http(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(ChemSnapError::EmptyResponse)
    }

    #[instrument(name = "openai.invoke_stream", skip(self, prompt, options), fields(model = %options.model))]
    async fn invoke_stream(
        &self,
        prompt: &Prompt,
        options: &InvokeOptions,
    ) -> Result<TextStream> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt, options, true))
            .send()
            .await
            .map_err(|e| ChemSnapError::Http(e.to_string()))?;

        self.handle_response_errors(&response, &options.model)?;

        // Pump SSE lines through a bounded channel so a fast provider can't
        // outrun a slow consumer. Lines may span chunk boundaries, so a
        // carry-over buffer holds the unterminated tail.
        let (tx, rx) = tokio::sync::mpsc::channel(STREAM_BUFFER);
        let mut byte_stream = response.bytes_stream();
        tokio::spawn(async move {
            let mut buffer = String::new();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(ChemSnapError::Stream(e.to_string()))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);
                    let Some(payload) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let payload = payload.trim();
                    if payload == "[DONE]" {
                        let _ = tx.send(Ok(TextEvent::Done)).await;
                        return;
                    }
                    match serde_json::from_str::<ChatCompletionChunk>(payload) {
                        Ok(event) => {
                            let delta = event
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|choice| choice.delta.content)
                                .filter(|delta| !delta.is_empty());
                            if let Some(delta) = delta {
                                if tx.send(Ok(TextEvent::Delta(delta))).await.is_err() {
                                    return; // receiver dropped
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx
                                .send(Err(ChemSnapError::Stream(format!("bad SSE event: {e}"))))
                                .await;
                            return;
                        }
                    }
                }
            }
            // Stream ended without [DONE]; treat as complete.
            let _ = tx.send(Ok(TextEvent::Done)).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_includes_system_and_user() {
        let client = OpenAiClient::new("sk-test");
        let prompt = Prompt::text("classify this").with_system("you are a classifier");
        let body = client.request_body(&prompt, &InvokeOptions::new("gpt-4o"), false);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"][0]["text"], "classify this");
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn body_embeds_base64_image_as_data_url() {
        let client = OpenAiClient::new("sk-test");
        let prompt = Prompt::text("read the label").with_image(ImageSource::Base64 {
            media_type: "image/jpeg".into(),
            data: "aGVsbG8=".into(),
        });
        let body = client.request_body(&prompt, &InvokeOptions::new("gpt-4o"), false);
        let image_url = &body["messages"][0]["content"][1]["image_url"]["url"];
        assert_eq!(image_url, "data:image/jpeg;base64,aGVsbG8=");
    }

    #[test]
    fn body_carries_inference_parameters_and_stream_flag() {
        let client = OpenAiClient::new("sk-test");
        let options = InvokeOptions::new("gpt-4o")
            .max_tokens(300)
            .temperature(0.7)
            .top_p(0.9);
        let body = client.request_body(&Prompt::text("hi"), &options, true);
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn parses_chunk_delta() {
        let payload = r#"{"choices":[{"delta":{"content":"Chem"}}]}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(payload).unwrap();
        assert_eq!(
            chunk.choices.into_iter().next().unwrap().delta.content,
            Some("Chem".into())
        );
    }

    #[test]
    fn parses_role_only_chunk() {
        // First SSE event carries the role with no content.
        let payload = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(payload).unwrap();
        assert!(chunk.choices[0].delta.content.is_none());
    }
}
