//! Metadata written next to the index files of every merged segment.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::segment_dir_name;
use crate::storage::Storage;
use crate::{GroupId, SegmentId};

pub const META_FILE_NAME: &str = "meta.json";

/// Description of one output segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub segment_id: SegmentId,
    pub doc_count: u32,
    /// Smallest and largest document hint, absent for an empty segment.
    pub hint_min: Option<i64>,
    pub hint_max: Option<i64>,
    /// Old segments this one was merged from.
    pub source_segments: Vec<SegmentId>,
    /// Source groups disabled at merge time; their data is not carried.
    pub disabled_source_groups: Vec<GroupId>,
    pub indexes: Vec<String>,
    pub merge_id: String,
    pub created_at: DateTime<Utc>,
}

impl SegmentMeta {
    /// Name of the meta file inside a segment directory.
    pub fn file_name(segment_dir: &str) -> String {
        format!("{segment_dir}/{META_FILE_NAME}")
    }

    pub fn write(&self, storage: &dyn Storage, name: &str) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let mut output = storage.create_output(name)?;
        output.write_all(&json)?;
        output.flush_and_sync()?;
        output.close()
    }

    pub fn read(storage: &dyn Storage, name: &str) -> Result<Self> {
        let mut input = storage.open_input(name)?;
        let mut json = Vec::new();
        input.read_to_end(&mut json)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Load the meta of a published segment.
    pub fn load(storage: &dyn Storage, segment_id: SegmentId) -> Result<Self> {
        Self::read(storage, &Self::file_name(&segment_dir_name(segment_id)))
    }
}
