use std::sync::Arc;

use crate::index::posting::{Posting, PostingKey, PostingList};
use crate::merger::{
    DefaultSplitStrategy, DeletionMap, KeyValueMap, NoHints, SegmentMergeInfos, SplitAssignment,
    SplitContext, SplitSegmentStrategy,
};
use crate::{DocId, SegmentId};

pub fn term_list(term: &str, docs: &[DocId]) -> PostingList {
    PostingList {
        key: PostingKey::from(term),
        postings: docs.iter().map(|&d| Posting::new(d)).collect(),
    }
}

pub fn cell_list(cell: u64, docs: &[DocId]) -> PostingList {
    PostingList {
        key: PostingKey::Cell(cell),
        postings: docs.iter().map(|&d| Posting::new(d)).collect(),
    }
}

pub fn assignment(
    segments: &[(SegmentId, u32)],
    split_doc_count: Option<u64>,
    deletions: &DeletionMap,
) -> SplitAssignment {
    let infos = SegmentMergeInfos::from_deletion_map(segments, deletions).unwrap();
    let mut strategy = DefaultSplitStrategy::new(SplitContext {
        infos: infos.clone(),
        hints: Arc::new(NoHints),
    });
    let mut params = KeyValueMap::new();
    if let Some(split) = split_doc_count {
        params.insert("split_doc_count".to_string(), split.to_string());
    }
    strategy.init(&params).unwrap();
    SplitAssignment::compute(&mut strategy, &infos, deletions)
}
