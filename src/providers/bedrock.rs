//! AWS Bedrock runtime client for Nova-family models.
//!
//! Uses the `messages-v1` request schema. Signing and transport are handled
//! by the AWS SDK; the runtime client handle is injected (see
//! [`ChemSnapBuilder`](crate::ChemSnapBuilder)) rather than constructed as a
//! process-wide global.

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client;
use aws_sdk_bedrockruntime::error::ProvideErrorMetadata;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::ResponseStream;
use aws_smithy_types::error::display::DisplayErrorContext;
use serde_json::{Map, Value, json};
use tokio_stream::wrappers::ReceiverStream;
use tracing::instrument;

use super::traits::{ModelInvoker, TextEvent, TextStream};
use crate::prompt::{ImageSource, Prompt};
use crate::types::InvokeOptions;
use crate::{ChemSnapError, Result};

/// Number of stream events buffered between producer and consumer.
const STREAM_BUFFER: usize = 64;

/// Client for the Bedrock runtime model-invocation API.
pub struct BedrockClient {
    client: Client,
}

impl BedrockClient {
    /// Wrap an injected Bedrock runtime client.
    ///
    /// The SDK client carries its own connection pool and is cheap to clone;
    /// share one across gateways rather than building per call.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from ambient AWS configuration (env, profile, IMDS).
    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config))
    }

    /// Build the `messages-v1` request body for a prompt.
    fn request_body(prompt: &Prompt, options: &InvokeOptions) -> Result<Vec<u8>> {
        let mut content = Vec::with_capacity(2);
        if let Some(image) = &prompt.image {
            match image {
                ImageSource::Base64 { media_type, data } => {
                    let format = media_type.strip_prefix("image/").unwrap_or(media_type);
                    content.push(json!({
                        "image": {
                            "format": format,
                            "source": { "bytes": data },
                        }
                    }));
                }
                ImageSource::Url(_) => {
                    return Err(ChemSnapError::InvalidInput(
                        "bedrock models take base64 image data, not URLs".into(),
                    ));
                }
            }
        }
        content.push(json!({"text": prompt.user}));

        let mut body = json!({
            "schemaVersion": "messages-v1",
            "messages": [
                { "role": "user", "content": content }
            ],
        });
        if let Some(system) = &prompt.system {
            body["system"] = json!([{"text": system}]);
        }

        let mut inference = Map::new();
        if let Some(max) = options.max_tokens {
            inference.insert("max_new_tokens".into(), json!(max));
        }
        if let Some(p) = options.top_p {
            inference.insert("top_p".into(), json!(p));
        }
        if let Some(k) = options.top_k {
            inference.insert("top_k".into(), json!(k));
        }
        if let Some(temp) = options.temperature {
            inference.insert("temperature".into(), json!(temp));
        }
        if !inference.is_empty() {
            body["inferenceConfig"] = Value::Object(inference);
        }

        Ok(serde_json::to_vec(&body)?)
    }

    /// Extract the text content block from a buffered response body.
    fn parse_response_body(bytes: &[u8]) -> Result<String> {
        let value: Value = serde_json::from_slice(bytes)?;
        value
            .pointer("/output/message/content/0/text")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                ChemSnapError::MalformedResponse("no text content in model response".into())
            })
    }

    /// Extract the text delta from one stream chunk, if it carries one.
    ///
    /// Non-delta events (messageStart, metadata, ...) yield `None`.
    fn parse_chunk(bytes: &[u8]) -> Result<Option<String>> {
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(value
            .pointer("/contentBlockDelta/delta/text")
            .and_then(Value::as_str)
            .map(str::to_owned))
    }

    /// Map an SDK error by its service error code.
    fn map_sdk_error(model: &str, code: Option<&str>, message: String) -> ChemSnapError {
        match code {
            Some("ThrottlingException") | Some("TooManyRequestsException") => {
                ChemSnapError::Throttled { retry_after: None }
            }
            Some("AccessDeniedException")
            | Some("UnrecognizedClientException")
            | Some("ExpiredTokenException") => ChemSnapError::AuthenticationFailed,
            Some("ResourceNotFoundException") => ChemSnapError::ModelNotFound(model.to_string()),
            Some(code) => ChemSnapError::Api {
                code: code.to_string(),
                message,
            },
            None => ChemSnapError::Http(message),
        }
    }
}

#[async_trait]
impl ModelInvoker for BedrockClient {
    fn name(&self) -> &str {
        "bedrock"
    }

    #[instrument(name = "bedrock.invoke", skip(self, prompt, options), fields(model = %options.model))]
    async fn invoke(&self, prompt: &Prompt, options: &InvokeOptions) -> Result<String> {
        let body = Self::request_body(prompt, options)?;
        let response = self
            .client
            .invoke_model()
            .model_id(&options.model)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| {
                Self::map_sdk_error(
                    &options.model,
                    e.code(),
                    DisplayErrorContext(&e).to_string(),
                )
            })?;

        Self::parse_response_body(response.body().as_ref())
    }

    #[instrument(name = "bedrock.invoke_stream", skip(self, prompt, options), fields(model = %options.model))]
    async fn invoke_stream(
        &self,
        prompt: &Prompt,
        options: &InvokeOptions,
    ) -> Result<TextStream> {
        let body = Self::request_body(prompt, options)?;
        let response = self
            .client
            .invoke_model_with_response_stream()
            .model_id(&options.model)
            .content_type("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| {
                Self::map_sdk_error(
                    &options.model,
                    e.code(),
                    DisplayErrorContext(&e).to_string(),
                )
            })?;

        // Pump the SDK event receiver through a bounded channel; delta text
        // fragments become `TextEvent::Delta` in arrival order.
        let (tx, rx) = tokio::sync::mpsc::channel(STREAM_BUFFER);
        let mut receiver = response.body;
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(Some(ResponseStream::Chunk(part))) => {
                        let Some(blob) = part.bytes() else { continue };
                        match Self::parse_chunk(blob.as_ref()) {
                            Ok(Some(delta)) if !delta.is_empty() => {
                                if tx.send(Ok(TextEvent::Delta(delta))).await.is_err() {
                                    return; // receiver dropped
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                let _ = tx.send(Err(e)).await;
                                return;
                            }
                        }
                    }
                    Ok(Some(_)) => {} // non-chunk event types
                    Ok(None) => {
                        let _ = tx.send(Ok(TextEvent::Done)).await;
                        return;
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(ChemSnapError::Stream(
                                DisplayErrorContext(&e).to_string(),
                            )))
                            .await;
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
