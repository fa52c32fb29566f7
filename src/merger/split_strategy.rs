//! Split strategies: where each surviving document of a merge lands.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{Result, SegmergeError};
use crate::merger::default_split_strategy::DefaultSplitStrategy;
use crate::merger::hint::HintProvider;
use crate::merger::plan::{KeyValueMap, SegmentMergeInfos};
use crate::{DocId, SegmentId};

/// Output segment index and hint chosen for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub segment_index: usize,
    pub hint: i64,
}

/// Assigns surviving documents to output segments.
///
/// Callers feed documents in a fixed order: old segments in plan order,
/// local ids ascending, deleted documents skipped. Implementations keep
/// running state across calls, so one instance serves exactly one merge
/// and is never shared between threads.
pub trait SplitSegmentStrategy: Send + Debug {
    /// Read parameters and derive the split target.
    fn init(&mut self, parameters: &KeyValueMap) -> Result<()>;

    /// Place the next surviving document.
    ///
    /// # Panics
    ///
    /// Panics if `segment` is not part of the merge or `doc` is outside
    /// that segment.
    fn process(&mut self, segment: SegmentId, doc: DocId) -> Placement;

    /// Planned number of output segments; valid after `init`.
    fn segment_count(&self) -> usize;

    fn name(&self) -> &'static str;
}

/// What a strategy is built from.
#[derive(Debug, Clone)]
pub struct SplitContext {
    pub infos: SegmentMergeInfos,
    pub hints: Arc<dyn HintProvider>,
}

type StrategyConstructor = fn(SplitContext) -> Box<dyn SplitSegmentStrategy>;

/// Strategy name to constructor.
const STRATEGIES: &[(&str, StrategyConstructor)] = &[(
    DefaultSplitStrategy::STRATEGY_NAME,
    DefaultSplitStrategy::create as StrategyConstructor,
)];

/// Resolves split strategy names.
pub struct SplitStrategyFactory;

impl SplitStrategyFactory {
    /// Build the strategy named `name`. Unknown names are configuration
    /// errors.
    pub fn create(name: &str, context: SplitContext) -> Result<Box<dyn SplitSegmentStrategy>> {
        STRATEGIES
            .iter()
            .find(|(strategy_name, _)| *strategy_name == name)
            .map(|(_, constructor)| constructor(context))
            .ok_or_else(|| {
                SegmergeError::config(format!(
                    "unknown split strategy '{name}', expected one of {:?}",
                    Self::strategy_names()
                ))
            })
    }

    pub fn strategy_names() -> Vec<&'static str> {
        STRATEGIES.iter().map(|(name, _)| *name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::hint::NoHints;

    fn context() -> SplitContext {
        SplitContext {
            infos: SegmentMergeInfos::new(),
            hints: Arc::new(NoHints),
        }
    }

    #[test]
    fn test_factory_resolves_default() {
        let strategy = SplitStrategyFactory::create("default", context()).unwrap();
        assert_eq!(strategy.name(), "default");
        assert_eq!(SplitStrategyFactory::strategy_names(), vec!["default"]);
    }

    #[test]
    fn test_factory_rejects_unknown_name() {
        let err = SplitStrategyFactory::create("by_time", context()).unwrap_err();
        assert!(matches!(err, SegmergeError::Config(_)));
        assert!(err.to_string().contains("by_time"));
    }
}
