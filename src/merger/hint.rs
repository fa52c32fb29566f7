//! Precomputed per-document hint values supplied by the planner.

use ahash::AHashMap;

use crate::{DocId, SegmentId};

/// Source of optional per-document hints. A missing hint is not an error.
pub trait HintProvider: Send + Sync + std::fmt::Debug {
    fn hint(&self, segment: SegmentId, doc: DocId) -> Option<i64>;
}

/// Hints keyed by `(segment, doc)`.
#[derive(Debug, Clone, Default)]
pub struct HintMap {
    hints: AHashMap<(SegmentId, DocId), i64>,
}

impl HintMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, segment: SegmentId, doc: DocId, hint: i64) {
        self.hints.insert((segment, doc), hint);
    }

    pub fn len(&self) -> usize {
        self.hints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}

impl FromIterator<((SegmentId, DocId), i64)> for HintMap {
    fn from_iter<I: IntoIterator<Item = ((SegmentId, DocId), i64)>>(iter: I) -> Self {
        HintMap {
            hints: iter.into_iter().collect(),
        }
    }
}

impl HintProvider for HintMap {
    fn hint(&self, segment: SegmentId, doc: DocId) -> Option<i64> {
        self.hints.get(&(segment, doc)).copied()
    }
}

/// Provider that never has a hint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHints;

impl HintProvider for NoHints {
    fn hint(&self, _segment: SegmentId, _doc: DocId) -> Option<i64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_map() {
        let hints: HintMap = [((0, 1), 42), ((1, 0), -7)].into_iter().collect();

        assert_eq!(hints.len(), 2);
        assert_eq!(hints.hint(0, 1), Some(42));
        assert_eq!(hints.hint(1, 0), Some(-7));
        assert_eq!(hints.hint(0, 0), None);
        assert_eq!(NoHints.hint(0, 1), None);
    }
}
