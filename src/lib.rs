//! # Segmerge
//!
//! Segment merge engine for an on-disk inverted index.
//!
//! ## Features
//!
//! - Validated schema model (dictionaries, source field groups)
//! - Deterministic redistribution of live documents into output segments
//! - Streaming per-index posting merge (text and spatial)
//! - Pluggable storage backends
//! - All-or-nothing publication of merged segments

pub mod config;
pub mod error;
pub mod index;
pub mod merger;
pub mod storage;
pub mod util;

pub use error::{Result, SegmergeError};

/// Local document id within one segment.
pub type DocId = u32;
/// Segment identifier.
pub type SegmentId = u32;
/// Source group identifier (position in the owning schema).
pub type GroupId = usize;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
