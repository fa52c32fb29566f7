//! Text index merge: term postings remapped into the output segments.

use crate::error::Result;
use crate::index::merger::{IdentityKeys, IndexMergeContext, IndexMergeStats, IndexMerger, merge_postings};
use crate::index::posting_file::PostingFileHeader;

/// Merges a term-keyed index. Terms keep their identity; only doc ids move.
#[derive(Debug, Clone)]
pub struct TextIndexMerger {
    index_name: String,
}

impl TextIndexMerger {
    pub fn new<S: Into<String>>(index_name: S) -> Self {
        TextIndexMerger {
            index_name: index_name.into(),
        }
    }
}

impl IndexMerger for TextIndexMerger {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn merge(&self, context: &IndexMergeContext<'_>) -> Result<IndexMergeStats> {
        let keys = IdentityKeys::new(PostingFileHeader::text());
        merge_postings(context, &self.index_name, &keys)
    }
}
