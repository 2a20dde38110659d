//! Search strategies: proposers of candidate batches.

mod design;
mod exhaustive;
mod grid;
mod random;
mod rfe;
mod sequential;

pub use design::{DesignPoints, DesignPointsConfig};
pub use exhaustive::{ExhaustiveSearch, ExhaustiveSearchConfig};
pub use grid::{GridSearch, GridSearchConfig};
pub use random::{RandomSearch, RandomSearchConfig};
pub use rfe::{RecursiveElimination, RfeConfig};
pub use sequential::{SequentialConfig, SequentialDirection, SequentialSelection};

use std::collections::HashSet;
use std::sync::Arc;

use sv_types::{Candidate, SearchError, SearchSpace, SvResult};

use crate::archive::EvaluationRecord;
use crate::instance::SearchInstance;

/// Common trait for all search strategies.
pub trait SearchStrategy: Send {
    /// Human-readable strategy name.
    fn name(&self) -> &str;

    /// Next batch to evaluate; `None` once the strategy has nothing left to
    /// propose. Every proposed candidate satisfies the search space.
    fn propose(&mut self, instance: &SearchInstance) -> SvResult<Option<Vec<Candidate>>>;

    /// Whether proposals are guaranteed to run out, so the search ends
    /// without a terminator.
    fn is_bounded(&self) -> bool {
        false
    }

    /// Results of the batch last proposed, so adaptive strategies can learn.
    fn observe(&mut self, _records: &[Arc<EvaluationRecord>]) -> SvResult<()> {
        Ok(())
    }
}

fn default_batch_size() -> usize {
    1
}

fn check_batch_size(batch_size: usize) -> SvResult<()> {
    if batch_size == 0 {
        return Err(sv_types::config_error!("batch_size must be at least 1"));
    }
    Ok(())
}

fn require_features(space: &SearchSpace, strategy: &str) -> SvResult<()> {
    if !space.is_features() {
        return Err(SearchError::InvalidSpace {
            message: format!("{strategy} needs a feature-selection search space"),
        }
        .into());
    }
    Ok(())
}

fn require_single(instance: &SearchInstance, strategy: &str) -> SvResult<()> {
    if !instance.codomain().is_single() {
        return Err(SearchError::UnsupportedObjective {
            message: format!("{strategy} requires a single-criterion objective"),
        }
        .into());
    }
    Ok(())
}

/// Identity key for de-duplicating candidates (keeps `1` and `"1"` apart).
fn candidate_key(candidate: &Candidate) -> String {
    serde_json::to_string(candidate).unwrap_or_else(|_| candidate.to_string())
}

/// Drop repeated candidates, keeping first occurrences in order.
fn dedup(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(candidate_key(c)))
        .collect()
}

/// Best first-measure record of a batch (first wins ties).
fn best_of<'a>(
    instance_direction: sv_types::Direction,
    records: &'a [Arc<EvaluationRecord>],
) -> Option<(&'a Arc<EvaluationRecord>, f64)> {
    let mut best: Option<(&Arc<EvaluationRecord>, f64)> = None;
    for record in records {
        if let Some(score) = record.primary_score() {
            match best {
                Some((_, b)) if !instance_direction.better(score, b) => {}
                _ => best = Some((record, score)),
            }
        }
    }
    best
}
