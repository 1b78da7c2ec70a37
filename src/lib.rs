//! ChemSnap - batched LLM gateway for chemical label data
//!
//! This crate forwards tabular rows and label photos to remote LLM
//! endpoints and returns structured chemical-label data. Rows are
//! partitioned into fixed-size batches, each batch is invoked with bounded
//! retry on throttling, and the model's text output is normalized into
//! typed prediction records — unparseable output degrades to an error
//! record instead of failing the run.
//!
//! # Classification Example
//!
//! ```rust,no_run
//! use chemsnap::{ChemSnap, InputRow};
//!
//! #[tokio::main]
//! async fn main() -> chemsnap::Result<()> {
//!     let gateway = ChemSnap::builder()
//!         .openai("sk-your-key")
//!         .product_key("shared-secret")
//!         .batch_size(10)
//!         .build()?;
//!
//!     let rows = vec![
//!         InputRow::from_pairs([("Number", "N04010"), ("Part_Description", "Acetone 500mL")]),
//!         InputRow::from_pairs([("Number", "125L"), ("Part_Description", "Vial Scint 20ML")]),
//!     ];
//!
//!     let envelope = gateway.classify_rows("shared-secret", &rows).await;
//!     println!("{}", serde_json::to_string_pretty(&envelope)?);
//!     Ok(())
//! }
//! ```
//!
//! # Label Extraction Example (requires an image-capable model)
//!
//! ```rust,no_run
//! use chemsnap::{ChemSnap, ImageSource};
//!
//! #[tokio::main]
//! async fn main() -> chemsnap::Result<()> {
//!     let gateway = ChemSnap::builder().openai("sk-your-key").build()?;
//!
//!     let envelope = gateway
//!         .extract_label("", ImageSource::Url("https://example.com/label.jpg".into()))
//!         .await;
//!
//!     if let Some(fields) = envelope.output() {
//!         println!("CAS: {:?}", fields.cas_number);
//!     }
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod ingest;
pub mod normalize;
pub mod prompt;
pub mod providers;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use error::{ChemSnapError, Result};
pub use gateway::{ChemSnap, ChemSnapBuilder, ChemSnapGateway};
pub use prompt::{ImageSource, Prompt};

pub use cache::CacheConfig;
pub use engine::BatchEngine;
pub use providers::{ModelInvoker, RetryConfig, TextEvent, TextStream};

// Re-export all types
pub use types::{
    BatchFailure, ClassificationOutput, Envelope, InputRow, InvocationResult, InvokeOptions,
    Label, LabelFields, Payload, PredictionRecord, ResponseMode, RowOutcome, StatusCode,
};
