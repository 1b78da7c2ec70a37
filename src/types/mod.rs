//! Public types for the ChemSnap API.

mod envelope;
mod label;
mod options;
mod prediction;
mod row;

pub use envelope::{Envelope, Payload, StatusCode};
pub use label::LabelFields;
pub use options::{InvokeOptions, ResponseMode};
pub use prediction::{
    BatchFailure, ClassificationOutput, InvocationResult, Label, PredictionRecord, RowOutcome,
};
pub use row::InputRow;
