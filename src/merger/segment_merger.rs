//! Merge driver: turns a merge plan into published output segments.
//!
//! Output is staged under `merge_<uuid>/segment_<id>/...` and renamed to
//! `segment_<id>/...` only after every index merged successfully. Any
//! failure removes the staged files, so a failed merge leaves no usable
//! output behind.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::{debug, info, warn};
use rayon::prelude::*;
use uuid::Uuid;

use crate::config::{IndexSchema, SourceSchema};
use crate::error::{Result, SegmergeError};
use crate::index::{
    IndexMergeContext, IndexMergeStats, PostingFileReader, create_index_merger, index_file_name,
    segment_dir_name,
};
use crate::merger::assignment::SplitAssignment;
use crate::merger::deletion::DeletionMapReader;
use crate::merger::hint::HintProvider;
use crate::merger::meta::{META_FILE_NAME, SegmentMeta};
use crate::merger::plan::{MergePlan, SegmentMergeInfos};
use crate::merger::split_strategy::{SplitContext, SplitStrategyFactory};
use crate::storage::Storage;
use crate::SegmentId;

/// Configuration for merge operations.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Merge different indexes concurrently.
    pub parallel_index_merge: bool,

    /// Upper bound on threads used for concurrent index merges.
    pub max_merge_threads: usize,

    /// Re-read every written posting file before publishing.
    pub verify_after_merge: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            parallel_index_merge: true,
            max_merge_threads: num_cpus::get(),
            verify_after_merge: true,
        }
    }
}

/// Statistics about a merge operation.
#[derive(Debug, Clone, Default)]
pub struct MergeStats {
    /// Number of old segments merged.
    pub segments_merged: usize,

    /// Number of segments published.
    pub segments_created: usize,

    /// Live documents carried into the new segments.
    pub docs_merged: u64,

    /// Number of deleted documents removed.
    pub deleted_docs_removed: u64,

    /// Posting lists written.
    pub lists_written: u64,

    /// Postings written.
    pub postings_written: u64,

    /// Per-index breakdown, in index schema order.
    pub index_stats: Vec<IndexMergeStats>,

    /// Time taken for merge (in milliseconds).
    pub merge_time_ms: u64,
}

/// Result of a merge operation.
#[derive(Debug)]
pub struct MergeResult {
    /// Metadata of the published segments, in output order.
    pub new_segments: Vec<SegmentMeta>,

    /// Statistics about the merge operation.
    pub stats: MergeStats,
}

/// Runs merge operations against one storage.
#[derive(Debug)]
pub struct SegmentMerger {
    config: MergeConfig,
    storage: Arc<dyn Storage>,
}

impl SegmentMerger {
    pub fn new(config: MergeConfig, storage: Arc<dyn Storage>) -> Self {
        SegmentMerger { config, storage }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge the old segments `infos` into new segments as `plan` directs.
    ///
    /// The split assignment is computed in full before any index is
    /// touched. Old segments are only read.
    pub fn merge(
        &self,
        source_schema: &SourceSchema,
        index_schema: &IndexSchema,
        plan: &MergePlan,
        infos: &SegmentMergeInfos,
        deletion_map: &dyn DeletionMapReader,
        hints: Arc<dyn HintProvider>,
    ) -> Result<MergeResult> {
        let start = Instant::now();

        source_schema.check()?;
        if infos.is_empty() {
            return Err(SegmergeError::config("merge plan lists no segments"));
        }

        let infos = &infos.with_deleted_counts(deletion_map);

        let mut strategy = SplitStrategyFactory::create(
            &plan.split_strategy,
            SplitContext {
                infos: infos.clone(),
                hints,
            },
        )?;
        strategy.init(&plan.split_parameters)?;
        let assignment = SplitAssignment::compute(strategy.as_mut(), infos, deletion_map);

        let target_ids = self.target_segment_ids(plan, assignment.segment_count())?;
        let merge_id = Uuid::new_v4().to_string();
        let staging_root = format!("merge_{merge_id}");
        let staging_dirs: Vec<String> = target_ids
            .iter()
            .map(|&id| format!("{staging_root}/{}", segment_dir_name(id)))
            .collect();

        info!(
            "merge {merge_id}: {} segments with {} live docs into segments {:?}",
            infos.len(),
            assignment.total_doc_count(),
            target_ids
        );

        let staged = self.stage(
            &merge_id,
            source_schema,
            index_schema,
            infos,
            &assignment,
            &target_ids,
            &staging_dirs,
        );
        let (index_stats, new_segments) = match staged {
            Ok(staged) => staged,
            Err(e) => {
                warn!("merge {merge_id} failed, discarding staged output: {e}");
                self.discard(&staging_root);
                return Err(e);
            }
        };

        self.publish(&staging_root)?;

        let stats = MergeStats {
            segments_merged: infos.len(),
            segments_created: new_segments.len(),
            docs_merged: assignment.total_doc_count(),
            deleted_docs_removed: assignment.deleted_doc_count(),
            lists_written: index_stats.iter().map(|s| s.lists_written).sum(),
            postings_written: index_stats.iter().map(|s| s.postings_written).sum(),
            index_stats,
            merge_time_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "merge {merge_id} finished in {} ms: {} docs, {} deleted removed, {} postings",
            stats.merge_time_ms, stats.docs_merged, stats.deleted_docs_removed, stats.postings_written
        );
        Ok(MergeResult {
            new_segments,
            stats,
        })
    }

    fn target_segment_ids(&self, plan: &MergePlan, count: usize) -> Result<Vec<SegmentId>> {
        let existing = self.storage.list_files()?;
        let mut ids = Vec::with_capacity(count);
        for offset in 0..count {
            let id = u32::try_from(offset)
                .ok()
                .and_then(|offset| plan.target_segment_id.checked_add(offset))
                .ok_or_else(|| SegmergeError::config("target segment id overflow"))?;

            let prefix = format!("{}/", segment_dir_name(id));
            if existing.iter().any(|name| name.starts_with(&prefix)) {
                return Err(SegmergeError::merge(format!(
                    "target segment {id} already exists"
                )));
            }
            ids.push(id);
        }
        Ok(ids)
    }

    #[allow(clippy::too_many_arguments)]
    fn stage(
        &self,
        merge_id: &str,
        source_schema: &SourceSchema,
        index_schema: &IndexSchema,
        infos: &SegmentMergeInfos,
        assignment: &SplitAssignment,
        target_ids: &[SegmentId],
        staging_dirs: &[String],
    ) -> Result<(Vec<IndexMergeStats>, Vec<SegmentMeta>)> {
        let source_segments = infos.segment_ids();
        let context = IndexMergeContext {
            storage: self.storage.as_ref(),
            assignment,
            source_segments: &source_segments,
            output_dirs: staging_dirs,
        };
        let mergers: Vec<_> = index_schema
            .indexes()
            .iter()
            .map(create_index_merger)
            .collect();

        let index_stats = if self.config.parallel_index_merge && mergers.len() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.max_merge_threads.clamp(1, mergers.len()))
                .build()
                .map_err(|e| SegmergeError::merge(format!("failed to build merge pool: {e}")))?;
            pool.install(|| {
                mergers
                    .par_iter()
                    .map(|merger| merger.merge(&context))
                    .collect::<Result<Vec<_>>>()
            })?
        } else {
            mergers
                .iter()
                .map(|merger| merger.merge(&context))
                .collect::<Result<Vec<_>>>()?
        };

        if self.config.verify_after_merge {
            self.verify(index_schema, assignment, staging_dirs)?;
        }

        let index_names: Vec<String> = index_schema
            .indexes()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        let disabled_source_groups = source_schema.disable_group_ids();
        let created_at = Utc::now();

        let mut metas = Vec::with_capacity(target_ids.len());
        for (output, (&segment_id, dir)) in target_ids.iter().zip(staging_dirs).enumerate() {
            let hint_range = assignment.hint_range(output);
            let meta = SegmentMeta {
                segment_id,
                doc_count: assignment.doc_count(output),
                hint_min: hint_range.map(|(min, _)| min),
                hint_max: hint_range.map(|(_, max)| max),
                source_segments: source_segments.clone(),
                disabled_source_groups: disabled_source_groups.clone(),
                indexes: index_names.clone(),
                merge_id: merge_id.to_string(),
                created_at,
            };
            meta.write(self.storage.as_ref(), &SegmentMeta::file_name(dir))?;
            metas.push(meta);
        }
        Ok((index_stats, metas))
    }

    /// Re-read every staged posting file: checksums, ordering and doc id
    /// bounds.
    fn verify(
        &self,
        index_schema: &IndexSchema,
        assignment: &SplitAssignment,
        staging_dirs: &[String],
    ) -> Result<()> {
        for (output, dir) in staging_dirs.iter().enumerate() {
            let doc_count = assignment.doc_count(output);
            for config in index_schema.indexes() {
                let name = index_file_name(dir, &config.name);
                let mut reader = PostingFileReader::open(self.storage.as_ref(), &name)?;
                while let Some(list) = reader.next_list()? {
                    if list.postings.iter().any(|p| p.doc_id >= doc_count) {
                        return Err(SegmergeError::merge(format!(
                            "{name}: list {} references doc beyond {doc_count}",
                            list.key
                        )));
                    }
                }
            }
            debug!("verified {dir}");
        }
        Ok(())
    }

    /// Move staged files into place, meta files last. On failure, already
    /// published files are removed again.
    fn publish(&self, staging_root: &str) -> Result<()> {
        let prefix = format!("{staging_root}/");
        let mut staged: Vec<String> = self
            .storage
            .list_files()?
            .into_iter()
            .filter(|name| name.starts_with(&prefix))
            .collect();
        staged.sort_by_key(|name| name.ends_with(META_FILE_NAME));

        let mut published: Vec<String> = Vec::with_capacity(staged.len());
        for name in &staged {
            let target = &name[prefix.len()..];
            if let Err(e) = self.storage.rename_file(name, target) {
                warn!("publishing {name} failed, rolling back: {e}");
                for done in &published {
                    if let Err(e) = self.storage.delete_file(done.as_str()) {
                        warn!("failed to remove {done}: {e}");
                    }
                }
                self.discard(staging_root);
                return Err(e);
            }
            published.push(target.to_string());
        }

        self.discard(staging_root);
        self.storage.sync()
    }

    /// Best-effort removal of `staging_root` and everything under it.
    fn discard(&self, staging_root: &str) {
        if let Err(e) = self.storage.delete_dir(staging_root) {
            warn!("failed to remove staging area {staging_root}: {e}");
        }
    }
}
