//! Report rendering for classification results.

pub mod generator;

pub use generator::*;
