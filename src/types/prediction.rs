//! Classification output types

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::row::InputRow;

/// Classification label emitted by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "Chemical", alias = "chemical", alias = "CHEMICAL")]
    Chemical,
    #[serde(
        rename = "Not a Chemical",
        alias = "not a chemical",
        alias = "Not A Chemical"
    )]
    NotAChemical,
}

/// Output for one input row.
///
/// Field names mirror the schema the instruction prompt asks the model for;
/// deserialization accepts the key-case variations models actually produce.
/// Absent fields serialize as `null`, never omitted — consumers rely on the
/// full shape being present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// The input row, echoed back by the model.
    pub row: Value,
    pub prediction: Label,
    #[serde(
        rename = "Confidence score",
        alias = "Confidence Score",
        alias = "confidence score",
        alias = "confidence_score",
        default
    )]
    pub confidence_score: Option<f64>,
    #[serde(
        rename = "CAS number",
        alias = "CAS Number",
        alias = "cas number",
        alias = "cas_number",
        default,
        deserialize_with = "stringish"
    )]
    pub cas_number: Option<String>,
    #[serde(
        rename = "Lot Number",
        alias = "Lot number",
        alias = "lot number",
        alias = "lot_number",
        default,
        deserialize_with = "stringish"
    )]
    pub lot_number: Option<String>,
    #[serde(
        rename = "Manufacturer",
        alias = "manufacturer",
        default,
        deserialize_with = "stringish"
    )]
    pub manufacturer: Option<String>,
    #[serde(
        rename = "Quantity",
        alias = "quantity",
        default,
        deserialize_with = "stringish"
    )]
    pub quantity: Option<String>,
    #[serde(
        rename = "Chemical Name",
        alias = "Chemical name",
        alias = "chemical name",
        alias = "chemical_name",
        default,
        deserialize_with = "stringish"
    )]
    pub chemical_name: Option<String>,
    #[serde(
        rename = "Product Name",
        alias = "Product name",
        alias = "product name",
        alias = "product_name",
        default,
        deserialize_with = "stringish"
    )]
    pub product_name: Option<String>,
    #[serde(
        rename = "Product Number",
        alias = "Product number",
        alias = "product number",
        alias = "product_number",
        default,
        deserialize_with = "stringish"
    )]
    pub product_number: Option<String>,
    #[serde(
        rename = "Units",
        alias = "units",
        default,
        deserialize_with = "stringish"
    )]
    pub units: Option<String>,
}

impl PredictionRecord {
    /// True when the row was classified as a chemical but any extraction
    /// field came back null. Drives the partial-success ("206") status.
    pub fn has_null_fields(&self) -> bool {
        self.prediction == Label::Chemical
            && (self.confidence_score.is_none()
                || self.cas_number.is_none()
                || self.lot_number.is_none()
                || self.manufacturer.is_none()
                || self.quantity.is_none()
                || self.chemical_name.is_none()
                || self.product_name.is_none()
                || self.product_number.is_none()
                || self.units.is_none())
    }
}

/// Accept strings, numbers, and booleans for extracted fields.
///
/// Models asked for "500 mL" sometimes return `500` — a numeric quantity
/// must not fail the whole batch.
fn stringish<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Result of invoking the model over one batch.
///
/// Never a hard failure: a batch that cannot be classified yields a
/// [`BatchFailure`] echoing its rows, and sibling batches are unaffected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InvocationResult {
    Predictions(Vec<PredictionRecord>),
    Failed(BatchFailure),
}

impl InvocationResult {
    /// Build a failure result echoing the batch rows.
    pub fn failed(
        batch: &[InputRow],
        error: impl Into<String>,
        raw_text: Option<String>,
    ) -> Self {
        InvocationResult::Failed(BatchFailure {
            batch: batch.to_vec(),
            error: error.into(),
            raw_text,
        })
    }

    /// Whether this batch failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, InvocationResult::Failed(_))
    }

    /// Parsed predictions, if the batch succeeded.
    pub fn predictions(&self) -> Option<&[PredictionRecord]> {
        match self {
            InvocationResult::Predictions(records) => Some(records),
            InvocationResult::Failed(_) => None,
        }
    }

    /// Flatten into per-row outcomes, echoing the batch error onto each row.
    pub fn into_row_outcomes(self) -> Vec<RowOutcome> {
        match self {
            InvocationResult::Predictions(records) => {
                records.into_iter().map(RowOutcome::Prediction).collect()
            }
            InvocationResult::Failed(failure) => failure
                .batch
                .into_iter()
                .map(|row| RowOutcome::Failed {
                    row,
                    error: failure.error.clone(),
                    raw_text: failure.raw_text.clone(),
                })
                .collect(),
        }
    }
}

/// Error descriptor for a batch that could not be classified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    /// The rows of the failed batch, echoed back.
    pub batch: Vec<InputRow>,
    pub error: String,
    /// Raw model output, kept when the failure was unparseable text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

/// Per-row outcome after flattening all batch results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowOutcome {
    Prediction(PredictionRecord),
    Failed {
        row: InputRow,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw_text: Option<String>,
    },
}

impl RowOutcome {
    /// Whether this outcome leaves extraction fields null.
    pub fn has_null_fields(&self) -> bool {
        match self {
            RowOutcome::Prediction(record) => record.has_null_fields(),
            RowOutcome::Failed { .. } => false,
        }
    }
}

/// Flattened classification payload returned by the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationOutput {
    /// One outcome per input row, in input order.
    pub predictions: Vec<RowOutcome>,
}
