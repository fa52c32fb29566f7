//! Read-only lookup of deleted documents per old segment.

use ahash::AHashMap;
use bit_vec::BitVec;

use crate::{DocId, SegmentId};

/// Answers "is local doc `doc` of segment `segment` deleted?".
pub trait DeletionMapReader: Send + Sync {
    fn is_deleted(&self, segment: SegmentId, doc: DocId) -> bool;

    /// Number of deleted documents among local ids `0..doc_count` of
    /// `segment`.
    fn deleted_count(&self, segment: SegmentId, doc_count: u32) -> u32;
}

/// One deletion bitmap per segment. Segments without a bitmap have no
/// deletions.
#[derive(Debug, Clone, Default)]
pub struct DeletionMap {
    bitmaps: AHashMap<SegmentId, BitVec>,
}

impl DeletionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a document deleted. Returns false if it already was.
    pub fn delete(&mut self, segment: SegmentId, doc: DocId) -> bool {
        let bitmap = self.bitmaps.entry(segment).or_default();
        let index = doc as usize;
        if index >= bitmap.len() {
            bitmap.grow(index + 1 - bitmap.len(), false);
        }

        let was_deleted = bitmap.get(index).unwrap_or(false);
        bitmap.set(index, true);
        !was_deleted
    }

    /// Install a whole bitmap for a segment, replacing any previous one.
    pub fn set_bitmap(&mut self, segment: SegmentId, bitmap: BitVec) {
        self.bitmaps.insert(segment, bitmap);
    }
}

impl DeletionMapReader for DeletionMap {
    fn is_deleted(&self, segment: SegmentId, doc: DocId) -> bool {
        self.bitmaps
            .get(&segment)
            .and_then(|bitmap| bitmap.get(doc as usize))
            .unwrap_or(false)
    }

    fn deleted_count(&self, segment: SegmentId, doc_count: u32) -> u32 {
        self.bitmaps
            .get(&segment)
            .map(|bitmap| {
                bitmap
                    .iter()
                    .take(doc_count as usize)
                    .filter(|deleted| *deleted)
                    .count() as u32
            })
            .unwrap_or(0)
    }
}
