//! Spatial index merge: geohash cell postings, coarsened to the configured
//! resolution where old segments were built finer.

use crate::error::{Result, SegmergeError};
use crate::index::geohash;
use crate::index::merger::{IndexMergeContext, IndexMergeStats, IndexMerger, KeyTransform, merge_postings};
use crate::index::posting::{KeyKind, PostingKey};
use crate::index::posting_file::PostingFileHeader;

/// Maps cells of any step at or above `target` onto their enclosing cell at
/// `target`. At equal steps this is the identity.
#[derive(Debug, Clone, Copy)]
pub struct GeoCellRebucket {
    target: u8,
}

impl GeoCellRebucket {
    pub fn new(target: u8) -> Self {
        GeoCellRebucket { target }
    }
}

impl KeyTransform for GeoCellRebucket {
    fn output_header(&self) -> PostingFileHeader {
        PostingFileHeader::spatial(self.target)
    }

    fn check_input(&self, file: &str, header: &PostingFileHeader) -> Result<()> {
        if header.key_kind != KeyKind::Cell {
            return Err(SegmergeError::index(format!(
                "{file}: expected cell keys, found {:?}",
                header.key_kind
            )));
        }
        geohash::check_step(header.resolution as usize)?;
        if header.resolution < self.target {
            return Err(SegmergeError::config(format!(
                "{file}: stored at step {} but merge targets finer step {}",
                header.resolution, self.target
            )));
        }
        Ok(())
    }

    fn transform(&self, header: &PostingFileHeader, key: PostingKey) -> Result<PostingKey> {
        match key {
            PostingKey::Cell(cell) => Ok(PostingKey::Cell(geohash::coarsen(
                cell,
                header.resolution as usize,
                self.target as usize,
            )?)),
            PostingKey::Term(term) => Err(SegmergeError::index(format!(
                "term key '{term}' in a spatial index"
            ))),
        }
    }
}

/// Merges a cell-keyed index at a fixed resolution.
#[derive(Debug, Clone)]
pub struct SpatialIndexMerger {
    index_name: String,
    resolution: u8,
}

impl SpatialIndexMerger {
    pub fn new<S: Into<String>>(index_name: S, resolution: u8) -> Self {
        SpatialIndexMerger {
            index_name: index_name.into(),
            resolution,
        }
    }

    pub fn resolution(&self) -> u8 {
        self.resolution
    }
}

impl IndexMerger for SpatialIndexMerger {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn merge(&self, context: &IndexMergeContext<'_>) -> Result<IndexMergeStats> {
        geohash::check_step(self.resolution as usize)?;
        merge_postings(context, &self.index_name, &GeoCellRebucket::new(self.resolution))
    }
}
