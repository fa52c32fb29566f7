//! Storage abstraction layer for Segmerge.
//!
//! Old segments are read and merged segments are written through the
//! [`Storage`] trait, so the merge logic never touches the filesystem
//! directly. Names are `/`-separated relative paths such as
//! `segment_3/index/body.post`.

pub mod file;
pub mod memory;
pub mod structured;
pub mod traits;

// Re-export commonly used types
pub use file::*;
pub use memory::*;
pub use structured::*;
pub use traits::*;
