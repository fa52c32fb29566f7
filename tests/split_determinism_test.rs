use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use segmerge::config::{FieldMode, IndexConfig, IndexSchema, SourceGroupConfig, SourceSchema};
use segmerge::index::{
    Posting, PostingFileHeader, PostingFileReader, PostingKey, PostingList, index_file_name,
    write_posting_file,
};
use segmerge::merger::{
    DefaultSplitStrategy, DeletionMap, DeletionMapReader, HintMap, KeyValueMap, MergeConfig,
    MergePlan, SegmentMergeInfos, SegmentMerger, SplitAssignment, SplitContext,
    SplitSegmentStrategy,
};
use segmerge::storage::{MemoryStorage, Storage};

struct Corpus {
    segments: Vec<(u32, u32)>,
    deletions: DeletionMap,
    hints: HintMap,
}

fn random_corpus(rng: &mut StdRng) -> Corpus {
    let segment_count = rng.random_range(2..6);
    let mut segments = Vec::new();
    let mut deletions = DeletionMap::new();
    let mut hints = HintMap::new();

    for segment_id in 0..segment_count {
        let doc_count = rng.random_range(1..40);
        for doc in 0..doc_count {
            if rng.random_bool(0.2) {
                deletions.delete(segment_id, doc);
            }
            if rng.random_bool(0.5) {
                hints.insert(segment_id, doc, rng.random_range(-1000..1000));
            }
        }
        segments.push((segment_id, doc_count));
    }

    Corpus {
        segments,
        deletions,
        hints,
    }
}

fn compute(corpus: &Corpus, split: u64) -> SplitAssignment {
    let infos = SegmentMergeInfos::from_deletion_map(&corpus.segments, &corpus.deletions).unwrap();
    let mut strategy = DefaultSplitStrategy::new(SplitContext {
        infos: infos.clone(),
        hints: Arc::new(corpus.hints.clone()),
    });
    let params: KeyValueMap = [("split_doc_count".to_string(), split.to_string())].into();
    strategy.init(&params).unwrap();
    SplitAssignment::compute(&mut strategy, &infos, &corpus.deletions)
}

#[test]
fn test_assignment_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..20 {
        let corpus = random_corpus(&mut rng);
        let split = rng.random_range(1..30);
        let first = compute(&corpus, split);
        let second = compute(&corpus, split);

        assert_eq!(first.segment_count(), second.segment_count());
        for &(segment, doc_count) in &corpus.segments {
            for doc in 0..doc_count {
                assert_eq!(first.placement(segment, doc), second.placement(segment, doc));
                assert_eq!(
                    first.placement(segment, doc).is_none(),
                    corpus.deletions.is_deleted(segment, doc)
                );
            }
        }
    }
}

#[test]
fn test_every_output_fills_up_to_split_size() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..20 {
        let corpus = random_corpus(&mut rng);
        let split = rng.random_range(1..30);
        let assignment = compute(&corpus, split);

        let outputs = assignment.segment_count();
        for output in 0..outputs - 1 {
            assert_eq!(assignment.doc_count(output) as u64, split);
        }
        assert!(assignment.doc_count(outputs - 1) as u64 <= split);
    }
}

#[test]
fn test_postings_ascending_for_all_plan_orders() {
    let mut rng = StdRng::seed_from_u64(2024);
    let vocabulary = ["ant", "bee", "cat", "dog", "eel", "fox"];

    for round in 0..10 {
        let corpus = random_corpus(&mut rng);
        let storage = Arc::new(MemoryStorage::new());

        let mut live_postings = 0u64;
        for &(segment, doc_count) in &corpus.segments {
            let mut lists = Vec::new();
            for term in vocabulary {
                let mut postings = Vec::new();
                for doc in 0..doc_count {
                    if rng.random_bool(0.3) {
                        postings.push(Posting::with_frequency(doc, rng.random_range(1..4)));
                    }
                }
                live_postings += postings
                    .iter()
                    .filter(|p| !corpus.deletions.is_deleted(segment, p.doc_id))
                    .count() as u64;
                if !postings.is_empty() {
                    lists.push(PostingList {
                        key: PostingKey::from(term),
                        postings,
                    });
                }
            }
            let name = index_file_name(&format!("segment_{segment}"), "body");
            write_posting_file(storage.as_ref(), &name, PostingFileHeader::text(), &lists)
                .unwrap();
        }

        let mut source = SourceSchema::new();
        source.add_group_config(SourceGroupConfig::new(FieldMode::AllField));
        let mut indexes = IndexSchema::new();
        indexes.add_index(IndexConfig::text("body")).unwrap();

        let mut order = corpus.segments.clone();
        order.shuffle(&mut rng);
        let infos = SegmentMergeInfos::from_deletion_map(&order, &corpus.deletions).unwrap();
        let plan = MergePlan::new(100 + round * 10)
            .with_parameter("split_doc_count", rng.random_range(5..50));

        let merger = SegmentMerger::new(MergeConfig::default(), storage.clone());
        let result = merger
            .merge(
                &source,
                &indexes,
                &plan,
                &infos,
                &corpus.deletions,
                Arc::new(corpus.hints.clone()),
            )
            .unwrap();

        let mut written = 0u64;
        for meta in &result.new_segments {
            let name = index_file_name(&format!("segment_{}", meta.segment_id), "body");
            let lists = PostingFileReader::open(storage.as_ref(), &name)
                .unwrap()
                .read_all()
                .unwrap();
            for list in &lists {
                assert!(list.is_strictly_ascending(), "{} not ascending", list.key);
                assert!(list.postings.iter().all(|p| p.doc_id < meta.doc_count));
                written += list.len() as u64;
            }
        }
        assert_eq!(written, live_postings);
        assert_eq!(result.stats.postings_written, live_postings);
        assert!(!storage.list_files().unwrap().iter().any(|f| f.starts_with("merge_")));
    }
}
