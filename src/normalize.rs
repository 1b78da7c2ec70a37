//! Response normalization: fence stripping, JSON parsing, key mapping.
//!
//! Model output is not guaranteed well-formed. Classification parsing
//! degrades gracefully: unparseable text becomes an error record carrying
//! the raw output rather than an error that would abort sibling batches.

use serde_json::Value;
use tracing::{error, warn};

use crate::types::{InputRow, InvocationResult, LabelFields, PredictionRecord};
use crate::{ChemSnapError, Result};

/// Strip markdown code fences and language hints from model output.
///
/// Handles ```` ```json\n...\n``` ````, bare ```` ``` ```` fences, and
/// fenceless text (returned unchanged).
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // A language hint occupies the rest of the opening line.
        text = match rest.split_once('\n') {
            Some((first, body)) if first.chars().all(|c| c.is_ascii_alphanumeric()) => body,
            _ => rest,
        };
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse a classification response for `batch`.
///
/// On parse failure the whole batch degrades to a failure record carrying
/// the raw text — never an `Err`.
pub fn parse_predictions(batch: &[InputRow], raw: &str) -> InvocationResult {
    let cleaned = strip_fences(raw);
    match serde_json::from_str::<Vec<PredictionRecord>>(cleaned) {
        Ok(records) => {
            if records.len() != batch.len() {
                warn!(
                    expected = batch.len(),
                    got = records.len(),
                    "model returned unexpected record count"
                );
            }
            InvocationResult::Predictions(records)
        }
        Err(e) => {
            error!(error = %e, "failed to parse model output as predictions");
            InvocationResult::failed(
                batch,
                format!("JSON decode error: {e}"),
                Some(raw.to_string()),
            )
        }
    }
}

/// Parse a label extraction response.
///
/// Models vary the key spelling ("CAS_Number", "cas number", "Chemical name
/// or CAS Number"); fields are matched by substring against the lowercased,
/// space-normalized key. Unrecognized keys are ignored.
pub fn parse_label_fields(raw: &str) -> Result<LabelFields> {
    let cleaned = strip_fences(raw);
    let value: Value = serde_json::from_str(cleaned)?;
    let Some(object) = value.as_object() else {
        return Err(ChemSnapError::MalformedResponse(
            "label response is not a JSON object".into(),
        ));
    };

    let mut fields = LabelFields {
        raw_output: raw.to_string(),
        ..LabelFields::default()
    };
    for (key, value) in object {
        let key = key.to_lowercase().replace(' ', "_");
        // "chemical_name_or_cas_number" matches the first rule that applies
        let slot = if key.contains("cas") {
            &mut fields.cas_number
        } else if key.contains("chemical") {
            &mut fields.chemical_name
        } else if key.contains("amount") {
            &mut fields.amount
        } else if key.contains("unit") {
            &mut fields.units
        } else if key.contains("lot") {
            &mut fields.lot_number
        } else if key.contains("product_num") {
            &mut fields.product_number
        } else if key.contains("product_nam") {
            &mut fields.product_name
        } else if key.contains("manuf") {
            &mut fields.manufacturer
        } else {
            continue;
        };
        *slot = clean_value(value);
    }
    Ok(fields)
}

/// Strip stray formatting characters the model tends to leave in values.
fn clean_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '"' | '/' | '\\' | '}' | '\n' | '`'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(cleaned.to_string())
    }
}
