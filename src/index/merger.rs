//! Per-index merge: the [`IndexMerger`] capability, its factory and the
//! shared streaming posting merge.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt::Debug;

use log::debug;

use crate::config::{IndexConfig, IndexType};
use crate::error::{Result, SegmergeError};
use crate::index::posting::{Posting, PostingKey, PostingList};
use crate::index::posting_file::{PostingFileHeader, PostingFileReader, PostingFileWriter};
use crate::index::spatial::SpatialIndexMerger;
use crate::index::text::TextIndexMerger;
use crate::index::{index_file_name, segment_dir_name};
use crate::merger::SplitAssignment;
use crate::storage::Storage;
use crate::SegmentId;

/// Everything an index merger reads from and writes to.
pub struct IndexMergeContext<'a> {
    pub storage: &'a dyn Storage,
    pub assignment: &'a SplitAssignment,
    /// Old segments in plan order.
    pub source_segments: &'a [SegmentId],
    /// Directory of each output segment, by output index.
    pub output_dirs: &'a [String],
}

/// Outcome of merging one index.
#[derive(Debug, Clone, Default)]
pub struct IndexMergeStats {
    pub index_name: String,
    /// Posting lists written across all outputs.
    pub lists_written: u64,
    pub postings_written: u64,
    /// Postings of deleted documents that were dropped.
    pub postings_dropped: u64,
    pub files_written: Vec<String>,
}

/// Merges one index of all old segments into the output segments.
///
/// Mergers only read the split assignment, so mergers of different indexes
/// may run concurrently.
pub trait IndexMerger: Send + Sync + Debug {
    fn index_name(&self) -> &str;

    fn merge(&self, context: &IndexMergeContext<'_>) -> Result<IndexMergeStats>;
}

/// Build the merger for an index.
pub fn create_index_merger(config: &IndexConfig) -> Box<dyn IndexMerger> {
    match config.index_type {
        IndexType::Text => Box::new(TextIndexMerger::new(config.name.clone())),
        IndexType::Spatial { resolution } => {
            Box::new(SpatialIndexMerger::new(config.name.clone(), resolution))
        }
    }
}

/// Maps keys of an old file onto the key space of the merged file.
///
/// The mapping must be monotone: ascending input keys stay non-decreasing,
/// so a stream remains mergeable in key order.
pub trait KeyTransform: Send + Sync + Debug {
    /// Header of the merged files.
    fn output_header(&self) -> PostingFileHeader;

    /// Reject old files this transform cannot read.
    fn check_input(&self, file: &str, header: &PostingFileHeader) -> Result<()>;

    fn transform(&self, header: &PostingFileHeader, key: PostingKey) -> Result<PostingKey>;
}

/// Keys pass through unchanged.
#[derive(Debug, Clone, Copy)]
pub struct IdentityKeys {
    header: PostingFileHeader,
}

impl IdentityKeys {
    pub fn new(header: PostingFileHeader) -> Self {
        IdentityKeys { header }
    }
}

impl KeyTransform for IdentityKeys {
    fn output_header(&self) -> PostingFileHeader {
        self.header
    }

    fn check_input(&self, file: &str, header: &PostingFileHeader) -> Result<()> {
        if *header != self.header {
            return Err(SegmergeError::index(format!(
                "{file}: expected {:?}, found {header:?}",
                self.header
            )));
        }
        Ok(())
    }

    fn transform(&self, _header: &PostingFileHeader, key: PostingKey) -> Result<PostingKey> {
        Ok(key)
    }
}

struct SourceStream {
    segment: SegmentId,
    reader: PostingFileReader,
    header: PostingFileHeader,
    current: Option<PostingList>,
}

impl SourceStream {
    fn advance(&mut self, transform: &dyn KeyTransform) -> Result<()> {
        self.current = match self.reader.next_list()? {
            Some(mut list) => {
                list.key = transform.transform(&self.header, list.key)?;
                Some(list)
            }
            None => None,
        };
        Ok(())
    }
}

/// K-way merge of one index across all old segments.
///
/// Old lists are combined key by key through `transform`; each posting is
/// moved to its new `(output, doc)` via the assignment or dropped when the
/// document is deleted. Per output, postings are sorted, repeated doc ids
/// folded, and non-empty lists written in ascending key order. Only the
/// postings of the current key are held in memory.
pub fn merge_postings(
    context: &IndexMergeContext<'_>,
    index_name: &str,
    transform: &dyn KeyTransform,
) -> Result<IndexMergeStats> {
    let storage = context.storage;
    let assignment = context.assignment;

    let mut streams = Vec::with_capacity(context.source_segments.len());
    for &segment in context.source_segments {
        let name = index_file_name(&segment_dir_name(segment), index_name);
        let reader = PostingFileReader::open(storage, &name)?;
        let header = reader.header();
        transform.check_input(&name, &header)?;

        let mut stream = SourceStream {
            segment,
            reader,
            header,
            current: None,
        };
        stream.advance(transform)?;
        streams.push(stream);
    }

    let output_header = transform.output_header();
    let mut files = Vec::with_capacity(context.output_dirs.len());
    let mut writers = Vec::with_capacity(context.output_dirs.len());
    for dir in context.output_dirs {
        let name = index_file_name(dir, index_name);
        writers.push(PostingFileWriter::create(storage, &name, output_header)?);
        files.push(name);
    }

    // Ties on key resolve by stream position, i.e. plan order.
    let mut heap: BinaryHeap<Reverse<(PostingKey, usize)>> = streams
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.current.as_ref().map(|l| Reverse((l.key.clone(), i))))
        .collect();

    let mut stats = IndexMergeStats {
        index_name: index_name.to_string(),
        ..Default::default()
    };
    let mut buckets: Vec<Vec<Posting>> = vec![Vec::new(); writers.len()];

    while let Some(Reverse((key, first))) = heap.pop() {
        let mut pending = vec![first];
        while heap.peek().is_some_and(|Reverse((next, _))| *next == key) {
            if let Some(Reverse((_, i))) = heap.pop() {
                pending.push(i);
            }
        }

        while let Some(i) = pending.pop() {
            let stream = &mut streams[i];
            if let Some(list) = stream.current.take() {
                for posting in list.postings {
                    match assignment.placement(stream.segment, posting.doc_id) {
                        Some(placement) => {
                            let bucket =
                                buckets.get_mut(placement.segment_index).ok_or_else(|| {
                                    SegmergeError::merge(format!(
                                        "output {} has no directory",
                                        placement.segment_index
                                    ))
                                })?;
                            bucket.push(Posting::with_frequency(
                                placement.doc_id,
                                posting.frequency,
                            ));
                        }
                        None if assignment.covers(stream.segment, posting.doc_id) => {
                            stats.postings_dropped += 1
                        }
                        None => {
                            return Err(SegmergeError::corrupt(format!(
                                "{}: list {key} references doc {} beyond segment {}",
                                stream.reader.name(),
                                posting.doc_id,
                                stream.segment
                            )));
                        }
                    }
                }
            }

            stream.advance(transform)?;
            if let Some(list) = &stream.current {
                if list.key == key {
                    // A coarsened key can repeat within one stream.
                    pending.push(i);
                } else {
                    heap.push(Reverse((list.key.clone(), i)));
                }
            }
        }

        for (writer, bucket) in writers.iter_mut().zip(buckets.iter_mut()) {
            if bucket.is_empty() {
                continue;
            }
            let list = PostingList::from_unsorted(key.clone(), std::mem::take(bucket));
            stats.lists_written += 1;
            stats.postings_written += list.len() as u64;
            writer.write_list(&list)?;
        }
    }

    for writer in writers {
        writer.finish()?;
    }
    stats.files_written = files;

    debug!(
        "merged index '{index_name}': {} lists, {} postings written, {} dropped",
        stats.lists_written, stats.postings_written, stats.postings_dropped
    );
    Ok(stats)
}
