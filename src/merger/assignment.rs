//! The computed split assignment: old `(segment, doc)` to new
//! `(output segment, new local doc, hint)`.

use ahash::AHashMap;

use crate::merger::deletion::DeletionMapReader;
use crate::merger::plan::SegmentMergeInfos;
use crate::merger::split_strategy::SplitSegmentStrategy;
use crate::{DocId, SegmentId};

/// Where a surviving document ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocPlacement {
    pub segment_index: usize,
    /// Local id within the output segment.
    pub doc_id: DocId,
    pub hint: i64,
}

#[derive(Debug, Clone, Copy, Default)]
struct OutputSummary {
    doc_count: u32,
    hint_range: Option<(i64, i64)>,
}

/// Immutable once computed; index mergers share it read-only.
#[derive(Debug)]
pub struct SplitAssignment {
    placements: AHashMap<SegmentId, Vec<Option<DocPlacement>>>,
    outputs: Vec<OutputSummary>,
    deleted_doc_count: u64,
}

impl SplitAssignment {
    /// Run `strategy` over every surviving document.
    ///
    /// Segments are visited in plan order and local ids ascending; new
    /// local ids are handed out densely per output in that same order, so
    /// the result depends only on the inputs.
    pub fn compute(
        strategy: &mut dyn SplitSegmentStrategy,
        infos: &SegmentMergeInfos,
        deletion_map: &dyn DeletionMapReader,
    ) -> Self {
        let mut placements = AHashMap::with_capacity(infos.len());
        let mut outputs: Vec<OutputSummary> = Vec::new();
        let mut deleted_doc_count = 0u64;

        for info in infos.iter() {
            let mut segment_placements = Vec::with_capacity(info.doc_count as usize);
            for doc in 0..info.doc_count {
                if deletion_map.is_deleted(info.segment_id, doc) {
                    deleted_doc_count += 1;
                    segment_placements.push(None);
                    continue;
                }

                let placement = strategy.process(info.segment_id, doc);
                if placement.segment_index >= outputs.len() {
                    outputs.resize(placement.segment_index + 1, OutputSummary::default());
                }

                let output = &mut outputs[placement.segment_index];
                let doc_id = output.doc_count;
                output.doc_count += 1;
                output.hint_range = Some(match output.hint_range {
                    Some((min, max)) => (min.min(placement.hint), max.max(placement.hint)),
                    None => (placement.hint, placement.hint),
                });

                segment_placements.push(Some(DocPlacement {
                    segment_index: placement.segment_index,
                    doc_id,
                    hint: placement.hint,
                }));
            }
            placements.insert(info.segment_id, segment_placements);
        }

        if outputs.is_empty() {
            outputs.push(OutputSummary::default());
        }

        SplitAssignment {
            placements,
            outputs,
            deleted_doc_count,
        }
    }

    /// New location of an old document; `None` for deleted documents and
    /// ids outside the merge.
    pub fn placement(&self, segment: SegmentId, doc: DocId) -> Option<DocPlacement> {
        self.placements
            .get(&segment)
            .and_then(|docs| docs.get(doc as usize))
            .copied()
            .flatten()
    }

    /// Whether `doc` is a local id of a segment in the merge, deleted or not.
    pub fn covers(&self, segment: SegmentId, doc: DocId) -> bool {
        self.placements
            .get(&segment)
            .is_some_and(|docs| (doc as usize) < docs.len())
    }

    /// Number of output segments that received documents (at least one).
    pub fn segment_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn doc_count(&self, segment_index: usize) -> u32 {
        self.outputs
            .get(segment_index)
            .map(|o| o.doc_count)
            .unwrap_or(0)
    }

    pub fn total_doc_count(&self) -> u64 {
        self.outputs.iter().map(|o| o.doc_count as u64).sum()
    }

    /// Deleted documents dropped by the merge.
    pub fn deleted_doc_count(&self) -> u64 {
        self.deleted_doc_count
    }

    /// Smallest and largest hint in an output segment.
    pub fn hint_range(&self, segment_index: usize) -> Option<(i64, i64)> {
        self.outputs.get(segment_index).and_then(|o| o.hint_range)
    }
}
