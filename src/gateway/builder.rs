//! Builder for configuring gateway instances

use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::engine::{BatchEngine, DEFAULT_CONCURRENCY};
use crate::batch::DEFAULT_BATCH_SIZE;
use crate::providers::{ModelInvoker, RetryConfig, RetryingInvoker};
use crate::types::{InvokeOptions, ResponseMode};
use crate::{ChemSnapError, Result};

use super::service::ChemSnapGateway;

/// Default OpenAI vision/classification model.
#[cfg(feature = "openai")]
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// Default Bedrock classification model.
#[cfg(feature = "bedrock")]
const DEFAULT_BEDROCK_MODEL: &str = "us.amazon.nova-lite-v1:0";

/// Main entry point for creating gateway instances.
pub struct ChemSnap;

impl ChemSnap {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> ChemSnapBuilder {
        ChemSnapBuilder::new()
    }
}

/// Builder for configuring gateway instances.
///
/// Everything the gateway touches — provider credentials/clients, the
/// inbound product key, batching and retry tuning — is injected here;
/// nothing is read from process-wide globals.
pub struct ChemSnapBuilder {
    #[cfg(feature = "openai")]
    openai_key: Option<String>,
    #[cfg(feature = "openai")]
    openai_base_url: Option<String>,
    #[cfg(feature = "bedrock")]
    bedrock_client: Option<aws_sdk_bedrockruntime::Client>,
    invoker: Option<Arc<dyn ModelInvoker>>,
    product_key: Option<String>,
    options: Option<InvokeOptions>,
    model: Option<String>,
    mode: Option<ResponseMode>,
    batch_size: usize,
    concurrency: usize,
    dispatch_delay: Option<Duration>,
    retry: RetryConfig,
    cache: Option<CacheConfig>,
}

impl ChemSnapBuilder {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "openai")]
            openai_key: None,
            #[cfg(feature = "openai")]
            openai_base_url: None,
            #[cfg(feature = "bedrock")]
            bedrock_client: None,
            invoker: None,
            product_key: None,
            options: None,
            model: None,
            mode: None,
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            dispatch_delay: None,
            retry: RetryConfig::default(),
            cache: None,
        }
    }

    /// Configure the OpenAI provider.
    #[cfg(feature = "openai")]
    pub fn openai(mut self, api_key: impl Into<String>) -> Self {
        self.openai_key = Some(api_key.into());
        self
    }

    /// Override the OpenAI base URL (for testing with wiremock).
    #[cfg(feature = "openai")]
    pub fn openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = Some(url.into());
        self
    }

    /// Configure the Bedrock provider with an injected runtime client.
    #[cfg(feature = "bedrock")]
    pub fn bedrock(mut self, client: aws_sdk_bedrockruntime::Client) -> Self {
        self.bedrock_client = Some(client);
        self
    }

    /// Use a custom invoker instead of a built-in provider.
    ///
    /// Takes precedence over `openai`/`bedrock` when both are set.
    pub fn invoker(mut self, invoker: Arc<dyn ModelInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Set the secret the caller-supplied API key is compared against.
    ///
    /// Without one, the gateway accepts any key.
    pub fn product_key(mut self, key: impl Into<String>) -> Self {
        self.product_key = Some(key.into());
        self
    }

    /// Set the model to invoke. Defaults to the provider's usual model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Replace the invocation options wholesale.
    ///
    /// Defaults carry the inference parameters the classification prompt was
    /// tuned with (max_tokens 4000, temperature 0.7, top_p 0.9, top_k 20).
    pub fn invoke_options(mut self, options: InvokeOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Select buffered or streamed response handling.
    pub fn response_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set the number of rows per batch.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the number of batches in flight at once.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    /// Stagger batch dispatches by a fixed delay.
    pub fn dispatch_delay(mut self, delay: Duration) -> Self {
        self.dispatch_delay = Some(delay);
        self
    }

    /// Set the retry configuration for throttled requests.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Enable the prediction cache.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = Some(config);
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<ChemSnapGateway> {
        let (invoker, default_model) = self.resolve_invoker()?;

        let mut options = self.options.unwrap_or_else(default_invoke_options);
        if let Some(model) = self.model {
            options.model = model;
        }
        if options.model.is_empty() {
            match default_model {
                Some(model) => options.model = model.to_string(),
                None => {
                    return Err(ChemSnapError::Configuration(
                        "a model must be configured for a custom invoker".into(),
                    ));
                }
            }
        }
        if let Some(mode) = self.mode {
            options.mode = mode;
        }

        // Retry wraps the raw provider so the engine and the label path get
        // identical throttle handling.
        let invoker: Arc<dyn ModelInvoker> =
            Arc::new(RetryingInvoker::new(invoker, self.retry.clone()));

        let mut engine = BatchEngine::new(invoker.clone(), options.clone())
            .batch_size(self.batch_size)
            .concurrency(self.concurrency);
        if let Some(delay) = self.dispatch_delay {
            engine = engine.dispatch_delay(delay);
        }
        if let Some(cache) = &self.cache {
            engine = engine.cache(cache);
        }

        Ok(ChemSnapGateway::new(
            invoker,
            engine,
            options,
            self.product_key,
        ))
    }

    /// Pick the configured provider, with its default model.
    fn resolve_invoker(&self) -> Result<(Arc<dyn ModelInvoker>, Option<&'static str>)> {
        if let Some(custom) = &self.invoker {
            return Ok((custom.clone(), None));
        }

        #[cfg(feature = "openai")]
        if let Some(key) = &self.openai_key {
            let client = match &self.openai_base_url {
                Some(url) => crate::providers::OpenAiClient::with_base_url(key, url),
                None => crate::providers::OpenAiClient::new(key),
            };
            return Ok((Arc::new(client), Some(DEFAULT_OPENAI_MODEL)));
        }

        #[cfg(feature = "bedrock")]
        if let Some(client) = &self.bedrock_client {
            let client = crate::providers::BedrockClient::new(client.clone());
            return Ok((Arc::new(client), Some(DEFAULT_BEDROCK_MODEL)));
        }

        Err(ChemSnapError::NoProvider)
    }
}

impl Default for ChemSnapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Inference parameters the classification prompt was tuned with.
fn default_invoke_options() -> InvokeOptions {
    InvokeOptions::default()
        .max_tokens(4000)
        .temperature(0.7)
        .top_p(0.9)
        .top_k(20)
}
