//! Label extraction output type

use serde::Serialize;

/// Structured fields extracted from a chemical label photo.
///
/// Built by the normalizer from whatever key spelling the model chose
/// (substring matching), with values cleaned of stray formatting characters.
/// `raw_output` always carries the unmodified model text for debugging.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelFields {
    #[serde(rename = "Chemical Name")]
    pub chemical_name: Option<String>,
    #[serde(rename = "CAS Number")]
    pub cas_number: Option<String>,
    #[serde(rename = "Amount")]
    pub amount: Option<String>,
    #[serde(rename = "Units")]
    pub units: Option<String>,
    #[serde(rename = "Lot Number")]
    pub lot_number: Option<String>,
    #[serde(rename = "Product Number")]
    pub product_number: Option<String>,
    #[serde(rename = "Product Name")]
    pub product_name: Option<String>,
    #[serde(rename = "Manufacturer")]
    pub manufacturer: Option<String>,
    #[serde(rename = "raw output")]
    pub raw_output: String,
}

impl LabelFields {
    /// True when any field is missing. Drives the partial ("206") status.
    pub fn has_null_fields(&self) -> bool {
        self.chemical_name.is_none()
            || self.cas_number.is_none()
            || self.amount.is_none()
            || self.units.is_none()
            || self.lot_number.is_none()
            || self.product_number.is_none()
            || self.product_name.is_none()
            || self.manufacturer.is_none()
    }
}
