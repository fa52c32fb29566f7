//! Utility modules for Segmerge.

pub mod varint;

pub use varint::*;
