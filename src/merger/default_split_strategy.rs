//! Sequential fill: output segments are filled one after another, each up
//! to a fixed number of live documents.

use log::debug;

use crate::error::{Result, SegmergeError};
use crate::merger::plan::KeyValueMap;
use crate::merger::split_strategy::{Placement, SplitContext, SplitSegmentStrategy};
use crate::{DocId, SegmentId};

/// Maximum live documents per output segment.
pub const SPLIT_DOC_COUNT: &str = "split_doc_count";
/// Number of output segments wanted.
pub const SEGMENT_COUNT: &str = "segment_count";
/// Hint emitted for documents the hint provider knows nothing about.
pub const MISSING_HINT_VALUE: &str = "missing_hint_value";

pub const DEFAULT_MISSING_HINT: i64 = -1;

/// Fills output segment 0 up to the split size, then segment 1, and so on.
/// The last planned segment absorbs any remainder.
///
/// With `split_doc_count` the split size is fixed. With only `segment_count`
/// it is `ceil(total / segment_count)`. When both are set the fixed size
/// wins and `segment_count` still caps the index. With neither there is a
/// single output.
#[derive(Debug)]
pub struct DefaultSplitStrategy {
    context: SplitContext,
    total_valid_doc_count: u64,
    split_doc_count: u64,
    segment_count: usize,
    missing_hint_value: i64,
    current_doc_count: u64,
    current_seg_index: usize,
}

impl DefaultSplitStrategy {
    pub const STRATEGY_NAME: &'static str = "default";

    pub fn new(context: SplitContext) -> Self {
        let total_valid_doc_count = context.infos.total_valid_doc_count();
        DefaultSplitStrategy {
            context,
            total_valid_doc_count,
            split_doc_count: u64::MAX,
            segment_count: 1,
            missing_hint_value: DEFAULT_MISSING_HINT,
            current_doc_count: 0,
            current_seg_index: 0,
        }
    }

    pub(crate) fn create(context: SplitContext) -> Box<dyn SplitSegmentStrategy> {
        Box::new(Self::new(context))
    }

    pub fn split_doc_count(&self) -> u64 {
        self.split_doc_count
    }

    pub fn total_valid_doc_count(&self) -> u64 {
        self.total_valid_doc_count
    }
}

fn positive_param(parameters: &KeyValueMap, key: &str) -> Result<Option<u64>> {
    let Some(raw) = parameters.get(key) else {
        return Ok(None);
    };

    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(SegmergeError::config(format!(
            "{key} must be a positive integer, got '{raw}'"
        ))),
        Ok(value) => Ok(Some(value)),
    }
}

impl SplitSegmentStrategy for DefaultSplitStrategy {
    fn init(&mut self, parameters: &KeyValueMap) -> Result<()> {
        let split_doc_count = positive_param(parameters, SPLIT_DOC_COUNT)?;
        let segment_count = positive_param(parameters, SEGMENT_COUNT)?;
        self.missing_hint_value = match parameters.get(MISSING_HINT_VALUE) {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                SegmergeError::config(format!(
                    "{MISSING_HINT_VALUE} must be an integer, got '{raw}'"
                ))
            })?,
            None => DEFAULT_MISSING_HINT,
        };

        let total = self.total_valid_doc_count;
        let (split, count) = match (split_doc_count, segment_count) {
            (Some(split), Some(count)) => (split, count),
            (Some(split), None) => (split, total.div_ceil(split).max(1)),
            (None, Some(count)) => (total.div_ceil(count).max(1), count),
            (None, None) => (u64::MAX, 1),
        };

        self.split_doc_count = split;
        self.segment_count = usize::try_from(count)
            .map_err(|_| SegmergeError::config(format!("{SEGMENT_COUNT} {count} too large")))?;
        self.current_doc_count = 0;
        self.current_seg_index = 0;

        debug!(
            "default split strategy: {total} valid docs, split size {split}, {count} segments"
        );
        Ok(())
    }

    fn process(&mut self, segment: SegmentId, doc: DocId) -> Placement {
        let Some(info) = self.context.infos.get(segment) else {
            panic!("segment {segment} is not part of the merge plan");
        };
        assert!(
            info.contains(doc),
            "doc {doc} out of range for segment {segment} with {} docs",
            info.doc_count
        );

        let segment_index = self.current_seg_index.min(self.segment_count - 1);
        self.current_doc_count += 1;
        if self.current_doc_count >= self.split_doc_count {
            self.current_seg_index += 1;
            self.current_doc_count = 0;
        }

        let hint = self
            .context
            .hints
            .hint(segment, doc)
            .unwrap_or(self.missing_hint_value);

        Placement {
            segment_index,
            hint,
        }
    }

    fn segment_count(&self) -> usize {
        self.segment_count
    }

    fn name(&self) -> &'static str {
        Self::STRATEGY_NAME
    }
}
