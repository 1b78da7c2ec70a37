//! Prompt construction for classification and label extraction.
//!
//! The instruction text is fixed, so for identical input the built prompt
//! is byte-identical — any variation in results comes from the provider
//! side, never from request construction.

use crate::Result;
use crate::types::InputRow;

/// System instruction for batched row classification.
///
/// Defines the exact output schema the normalizer parses. Kept as a single
/// constant so the request builder stays deterministic.
pub(crate) const CLASSIFY_SYSTEM_PROMPT: &str = "\
You are an AI trained to identify chemicals based on text descriptions and extract relevant data if present.
The following is a batch of rows from a dataset. For each, determine if the data has any chemical info at all.

Respond with a structured JSON array where each object corresponds to one row in the batch.
Each object should have the following fields:

if your prediction is not chemical, it should just have:
- row (the input data),
- prediction (\"Chemical\" or \"Not a Chemical\").

if it is a chemical then build and include all these fields as best you can:
- row (the input data),
- prediction (\"Chemical\" or \"Not a Chemical\"),
- Confidence score (a 4-digit decimal between 0.000 and 1.000),
- CAS number (if present in row, else null),
- Lot Number (if present in row, else null),
- Manufacturer (if present in row, else null),
- Quantity (if present in row, else null),
- Chemical Name (if present in row, else null),
- Product Name (if present in row, else null),
- Product Number (if present in row, else null),
- Units (if present in row, else null).

Respond only with the JSON array.";

/// Instruction for extracting structured fields from a label photo.
pub(crate) const LABEL_EXTRACTION_PROMPT: &str = "\
Please provide a structured JSON response that contains info on the label in the photo, specifically look for:
(Chemical_Name or CAS_Number,
Amount,
Units,
Lot_Number,
Product_Number,
Product_Name,
Manufacturer)
make sure the keys for each appear exactly as written above,
if no label info is detected say null,
if grade information is found add it to product name, if not keep text as is,
if no product name use chemical name,
add no text besides null about what you can't find to the response.";

/// Reference to a label image.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Publicly fetchable URL (providers that accept image URLs only).
    Url(String),
    /// Base64-encoded image data with its media type (e.g. "image/jpeg").
    Base64 { media_type: String, data: String },
}

/// A provider-agnostic request: instruction plus user content.
///
/// Providers map this onto their own wire format — the prompt itself never
/// contains provider-specific structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
    pub image: Option<ImageSource>,
}

impl Prompt {
    /// Create a plain text prompt.
    pub fn text(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
            image: None,
        }
    }

    /// Attach a system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Attach an image.
    pub fn with_image(mut self, image: ImageSource) -> Self {
        self.image = Some(image);
        self
    }
}

/// Build the classification prompt for one batch.
///
/// One serialized row per line. `serde_json` writes map keys in sorted
/// order, so identical rows always produce identical prompt text.
pub fn classification_prompt(batch: &[InputRow]) -> Result<Prompt> {
    let mut lines = Vec::with_capacity(batch.len());
    for row in batch {
        lines.push(serde_json::to_string(row)?);
    }
    Ok(Prompt::text(lines.join("\n")).with_system(CLASSIFY_SYSTEM_PROMPT))
}

/// Build the label extraction prompt for one image.
pub fn label_extraction_prompt(image: ImageSource) -> Prompt {
    Prompt::text(LABEL_EXTRACTION_PROMPT).with_image(image)
}
