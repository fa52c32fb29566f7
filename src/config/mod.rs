//! Schema and index configuration consumed by merges.
//!
//! Configurations arrive from JSON and are validated here before any merge
//! may use them.

pub mod dictionary;
pub mod index;
pub mod source;

pub use dictionary::*;
pub use index::*;
pub use source::*;
