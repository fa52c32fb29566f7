//! Segment merging: merge plan, document placement and the merge driver.
//!
//! A merge runs in two phases. First the split strategy places every
//! surviving document of the old segments, producing an immutable
//! [`SplitAssignment`]. Then each index of the schema is merged against that
//! assignment and the result is published by [`SegmentMerger`].

pub mod assignment;
pub mod default_split_strategy;
pub mod deletion;
pub mod hint;
pub mod meta;
pub mod plan;
pub mod segment_merger;
pub mod split_strategy;

pub use assignment::*;
pub use default_split_strategy::*;
pub use deletion::*;
pub use hint::*;
pub use meta::*;
pub use plan::*;
pub use segment_merger::*;
pub use split_strategy::*;
