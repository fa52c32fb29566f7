//! Criterion benchmarks for split assignment and posting merge.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use segmerge::config::{FieldMode, IndexConfig, IndexSchema, SourceGroupConfig, SourceSchema};
use segmerge::index::{Posting, PostingFileHeader, PostingKey, PostingList, write_posting_file};
use segmerge::merger::{
    DefaultSplitStrategy, DeletionMap, KeyValueMap, MergeConfig, MergePlan, NoHints,
    SegmentMergeInfos, SegmentMerger, SplitAssignment, SplitContext, SplitSegmentStrategy,
};
use segmerge::storage::MemoryStorage;

/// Segments of `docs_per_segment` docs with every tenth doc deleted.
fn generate_segments(segments: u32, docs_per_segment: u32) -> (Vec<(u32, u32)>, DeletionMap) {
    let mut deletions = DeletionMap::new();
    for segment in 0..segments {
        for doc in (0..docs_per_segment).step_by(10) {
            deletions.delete(segment, doc);
        }
    }
    let layout = (0..segments).map(|s| (s, docs_per_segment)).collect();
    (layout, deletions)
}

fn bench_split_assignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_assignment");

    for docs in [10_000u32, 100_000] {
        let (layout, deletions) = generate_segments(8, docs / 8);
        let infos = SegmentMergeInfos::from_deletion_map(&layout, &deletions).unwrap();
        let params: KeyValueMap = [("segment_count".to_string(), "4".to_string())].into();

        group.throughput(Throughput::Elements(docs as u64));
        group.bench_with_input(BenchmarkId::from_parameter(docs), &docs, |b, _| {
            b.iter(|| {
                let mut strategy = DefaultSplitStrategy::new(SplitContext {
                    infos: infos.clone(),
                    hints: Arc::new(NoHints),
                });
                strategy.init(&params).unwrap();
                black_box(SplitAssignment::compute(&mut strategy, &infos, &deletions))
            })
        });
    }

    group.finish();
}

fn bench_text_merge(c: &mut Criterion) {
    let (layout, deletions) = generate_segments(4, 5_000);
    let storage = Arc::new(MemoryStorage::new());
    for &(segment, doc_count) in &layout {
        let lists: Vec<_> = (0..200u32)
            .map(|term| PostingList {
                key: PostingKey::Term(format!("term{term:04}")),
                postings: (term % 7..doc_count)
                    .step_by(7)
                    .map(Posting::new)
                    .collect(),
            })
            .collect();
        let name = format!("segment_{segment}/index/body.post");
        write_posting_file(storage.as_ref(), &name, PostingFileHeader::text(), &lists).unwrap();
    }

    let mut source = SourceSchema::new();
    source.add_group_config(SourceGroupConfig::new(FieldMode::AllField));
    let mut indexes = IndexSchema::new();
    indexes.add_index(IndexConfig::text("body")).unwrap();
    let infos = SegmentMergeInfos::from_deletion_map(&layout, &deletions).unwrap();
    let merger = SegmentMerger::new(MergeConfig::default(), storage.clone());

    let mut target = 1_000u32;
    c.bench_function("text_merge_20k_docs", |b| {
        b.iter(|| {
            target += 10;
            let plan = MergePlan::new(target).with_parameter("segment_count", 2);
            black_box(
                merger
                    .merge(
                        &source,
                        &indexes,
                        &plan,
                        &infos,
                        &deletions,
                        Arc::new(NoHints),
                    )
                    .unwrap(),
            )
        })
    });
}

criterion_group!(benches, bench_split_assignment, bench_text_merge);
criterion_main!(benches);
