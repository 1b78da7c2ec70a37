//! Gateway implementations

mod builder;
mod service;

pub use builder::{ChemSnap, ChemSnapBuilder};
pub use service::ChemSnapGateway;
