//! Index data of a segment and how it is merged.
//!
//! Every index of a segment lives in one posting file,
//! `segment_<id>/index/<name>.post`. Text indexes key their lists by term,
//! spatial indexes by geohash cell.

pub mod geohash;
pub mod merger;
pub mod posting;
pub mod posting_file;
pub mod spatial;
pub mod text;

#[cfg(test)]
pub(crate) mod test_support;

pub use merger::*;
pub use posting::*;
pub use posting_file::*;
pub use spatial::*;
pub use text::*;

use crate::SegmentId;

/// Directory of a published segment.
pub fn segment_dir_name(segment_id: SegmentId) -> String {
    format!("segment_{segment_id}")
}

/// Posting file of `index_name` inside a segment directory.
pub fn index_file_name(segment_dir: &str, index_name: &str) -> String {
    format!("{segment_dir}/index/{index_name}.post")
}
