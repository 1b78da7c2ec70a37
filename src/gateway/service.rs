//! Gateway operations: API-key guard, classification, label extraction.
//!
//! Operations never panic and never surface provider failures as errors —
//! every outcome lands in an [`Envelope`] with the wire status codes the
//! original consumers expect ("200" full, "206" partial, "500" error).

use std::io::Read;
use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use crate::engine::BatchEngine;
use crate::ingest;
use crate::normalize;
use crate::prompt::{self, ImageSource};
use crate::providers::{ModelInvoker, invoke_text};
use crate::types::{
    ClassificationOutput, Envelope, InputRow, InvocationResult, InvokeOptions, LabelFields,
    RowOutcome,
};
use crate::{ChemSnapError, Result};

/// Gateway handle over one provider.
///
/// Build via [`ChemSnap::builder()`](crate::ChemSnap::builder).
pub struct ChemSnapGateway {
    invoker: Arc<dyn ModelInvoker>,
    engine: BatchEngine,
    options: InvokeOptions,
    product_key: Option<String>,
}

impl std::fmt::Debug for ChemSnapGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChemSnapGateway")
            .field("options", &self.options)
            .field("product_key", &self.product_key)
            .finish_non_exhaustive()
    }
}

impl ChemSnapGateway {
    pub(crate) fn new(
        invoker: Arc<dyn ModelInvoker>,
        engine: BatchEngine,
        options: InvokeOptions,
        product_key: Option<String>,
    ) -> Self {
        Self {
            invoker,
            engine,
            options,
            product_key,
        }
    }

    /// Validate the caller-supplied API key.
    ///
    /// Runs before anything else — an invalid key means no remote call.
    fn authorize(&self, api_key: &str) -> Result<()> {
        match &self.product_key {
            None => Ok(()),
            Some(expected) if api_key == expected => Ok(()),
            Some(_) => Err(ChemSnapError::InvalidApiKey),
        }
    }

    /// Classify rows in batches; one outcome per row, in input order.
    #[instrument(skip(self, api_key, rows), fields(row_count = rows.len()))]
    pub async fn classify_rows(
        &self,
        api_key: &str,
        rows: &[InputRow],
    ) -> Envelope<ClassificationOutput> {
        if self.authorize(api_key).is_err() {
            return Envelope::error("Error: API key is invalid");
        }
        if rows.is_empty() {
            return Envelope::error("Error: a non-empty list of rows is required");
        }

        let results = match self.engine.run(rows).await {
            Ok(results) => results,
            Err(e) => return Envelope::error(format!("Error: {e}")),
        };

        let any_failed = results.iter().any(InvocationResult::is_failed);
        let predictions: Vec<RowOutcome> = results
            .into_iter()
            .flat_map(InvocationResult::into_row_outcomes)
            .collect();
        let partial = any_failed || predictions.iter().any(RowOutcome::has_null_fields);

        let output = ClassificationOutput { predictions };
        if partial {
            Envelope::partial(output)
        } else {
            Envelope::ok(output)
        }
    }

    /// Classify rows parsed from CSV data (header-mapped).
    pub async fn classify_csv<R: Read>(
        &self,
        api_key: &str,
        reader: R,
    ) -> Envelope<ClassificationOutput> {
        if self.authorize(api_key).is_err() {
            return Envelope::error("Error: API key is invalid");
        }
        let rows = match ingest::rows_from_csv(reader) {
            Ok(rows) => rows,
            Err(e) => return Envelope::error(format!("Error: {e}")),
        };
        self.classify_rows(api_key, &rows).await
    }

    /// Classify rows supplied as a JSON array of objects.
    pub async fn classify_json(&self, api_key: &str, rows: Value) -> Envelope<ClassificationOutput> {
        if self.authorize(api_key).is_err() {
            return Envelope::error("Error: API key is invalid");
        }
        let rows = match ingest::rows_from_json(rows) {
            Ok(rows) => rows,
            Err(e) => return Envelope::error(format!("Error: {e}")),
        };
        self.classify_rows(api_key, &rows).await
    }

    /// Extract structured label fields from a single image.
    #[instrument(skip(self, api_key, image))]
    pub async fn extract_label(&self, api_key: &str, image: ImageSource) -> Envelope<LabelFields> {
        if self.authorize(api_key).is_err() {
            return Envelope::error("Error: API key is invalid");
        }

        let prompt = prompt::label_extraction_prompt(image);
        let raw = match invoke_text(self.invoker.as_ref(), &prompt, &self.options).await {
            Ok(raw) => raw,
            Err(e) => return Envelope::error(format!("Error: label extraction failed: {e}")),
        };

        match normalize::parse_label_fields(&raw) {
            Ok(fields) => {
                if fields.has_null_fields() {
                    Envelope::partial(fields)
                } else {
                    Envelope::ok(fields)
                }
            }
            Err(e) => Envelope::error(format!("Error: could not parse label response: {e}")),
        }
    }
}
