//! Merge plan and the descriptors of participating old segments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmergeError};
use crate::merger::deletion::DeletionMapReader;
use crate::merger::default_split_strategy::DefaultSplitStrategy;
use crate::{DocId, SegmentId};

/// String parameters as supplied by the planner.
pub type KeyValueMap = BTreeMap<String, String>;

/// How one merge operation splits its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePlan {
    /// Name of the split strategy, resolved by the strategy factory.
    #[serde(default = "default_strategy_name")]
    pub split_strategy: String,

    /// Strategy parameters, e.g. `split_doc_count` or `segment_count`.
    #[serde(default)]
    pub split_parameters: KeyValueMap,

    /// Id given to the first output segment; later outputs count up from it.
    pub target_segment_id: SegmentId,
}

fn default_strategy_name() -> String {
    DefaultSplitStrategy::STRATEGY_NAME.to_string()
}

impl MergePlan {
    /// A plan using the default strategy with no parameters (one output).
    pub fn new(target_segment_id: SegmentId) -> Self {
        MergePlan {
            split_strategy: default_strategy_name(),
            split_parameters: KeyValueMap::new(),
            target_segment_id,
        }
    }

    /// Set a strategy parameter.
    pub fn with_parameter<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.split_parameters.insert(key.into(), value.to_string());
        self
    }

    /// Use a different strategy.
    pub fn with_strategy<S: Into<String>>(mut self, name: S) -> Self {
        self.split_strategy = name.into();
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One old segment taking part in a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMergeInfo {
    pub segment_id: SegmentId,
    /// Total documents, deleted ones included. Local ids are `0..doc_count`.
    pub doc_count: u32,
    pub deleted_doc_count: u32,
}

impl SegmentMergeInfo {
    pub fn new(segment_id: SegmentId, doc_count: u32) -> Self {
        SegmentMergeInfo {
            segment_id,
            doc_count,
            deleted_doc_count: 0,
        }
    }

    pub fn live_doc_count(&self) -> u32 {
        self.doc_count.saturating_sub(self.deleted_doc_count)
    }

    pub fn contains(&self, doc_id: DocId) -> bool {
        doc_id < self.doc_count
    }
}

/// Old segments of a merge, in plan order.
#[derive(Debug, Clone, Default)]
pub struct SegmentMergeInfos {
    infos: Vec<SegmentMergeInfo>,
}

impl SegmentMergeInfos {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(segment id, doc count)` pairs, taking deleted counts
    /// from the deletion map.
    pub fn from_deletion_map(
        segments: &[(SegmentId, u32)],
        deletion_map: &dyn DeletionMapReader,
    ) -> Result<Self> {
        let mut infos = SegmentMergeInfos::new();
        for &(segment_id, doc_count) in segments {
            infos.push(SegmentMergeInfo {
                segment_id,
                doc_count,
                deleted_doc_count: deletion_map.deleted_count(segment_id, doc_count),
            })?;
        }
        Ok(infos)
    }

    /// Copy of these infos with deleted counts taken from `deletion_map`,
    /// the same map that decides which documents survive.
    pub fn with_deleted_counts(&self, deletion_map: &dyn DeletionMapReader) -> Self {
        let infos = self
            .infos
            .iter()
            .map(|info| SegmentMergeInfo {
                deleted_doc_count: deletion_map.deleted_count(info.segment_id, info.doc_count),
                ..*info
            })
            .collect();
        SegmentMergeInfos { infos }
    }

    /// Append a segment. Each segment may appear once.
    pub fn push(&mut self, info: SegmentMergeInfo) -> Result<()> {
        if self.get(info.segment_id).is_some() {
            return Err(SegmergeError::config(format!(
                "segment {} listed twice in merge plan",
                info.segment_id
            )));
        }
        if info.deleted_doc_count > info.doc_count {
            return Err(SegmergeError::config(format!(
                "segment {} has {} deleted of {} documents",
                info.segment_id, info.deleted_doc_count, info.doc_count
            )));
        }

        self.infos.push(info);
        Ok(())
    }

    pub fn get(&self, segment_id: SegmentId) -> Option<&SegmentMergeInfo> {
        self.infos.iter().find(|i| i.segment_id == segment_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SegmentMergeInfo> {
        self.infos.iter()
    }

    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.infos.iter().map(|i| i.segment_id).collect()
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn total_doc_count(&self) -> u64 {
        self.infos.iter().map(|i| i.doc_count as u64).sum()
    }

    pub fn total_valid_doc_count(&self) -> u64 {
        self.infos.iter().map(|i| i.live_doc_count() as u64).sum()
    }
}
