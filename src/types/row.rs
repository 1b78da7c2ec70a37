//! Input row type

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One input record: an opaque mapping of field name to value.
///
/// Rows are supplied by the caller (or built from CSV/JSON via
/// [`ingest`](crate::ingest)) and echoed back verbatim in results.
/// The gateway never interprets field names — the model does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputRow(pub Map<String, Value>);

impl InputRow {
    /// Create an empty row.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a row from field/value pairs.
    ///
    /// ```rust
    /// # use chemsnap::InputRow;
    /// let row = InputRow::from_pairs([
    ///     ("Number", "N04010"),
    ///     ("Part_Description", "MScn Dp Well Solv. 0.4 um NS 10PK"),
    /// ]);
    /// assert_eq!(row.len(), 2);
    /// ```
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Set a field value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Number of fields in the row.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the row has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for InputRow {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
