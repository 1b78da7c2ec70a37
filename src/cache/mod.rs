//! Opt-in caching for classification responses.
//!
//! [`response::PredictionCache`] — LRU + TTL cache keyed on the exact
//! prompt payload. Activated via the builder's `.cache()` method; without
//! it, no cache is allocated (zero overhead). A cache hit bypasses retry
//! logic and the provider call entirely.

pub mod response;

pub use response::{CacheConfig, PredictionCache};
