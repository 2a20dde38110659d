//! The optimization loop.

use serde::{Deserialize, Serialize};

use sv_types::{config_error, SvResult};

use crate::archive::SearchResult;
use crate::instance::SearchInstance;
use crate::log::TerminationReason;
use crate::strategy::SearchStrategy;

/// Outcome of a completed optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimized {
    /// Best result, derived from the archive when the loop ended.
    pub result: Option<SearchResult>,
    pub reason: TerminationReason,
    pub n_evals: usize,
    pub n_batch: usize,
}

/// Drive `strategy` against `instance` until the terminator fires or the
/// strategy runs out of candidates.
///
/// The terminator is only consulted between batches, so a batch that has
/// started is always evaluated and archived in full. A terminator that can
/// never fire is only accepted together with a bounded strategy.
pub fn optimize(
    strategy: &mut dyn SearchStrategy,
    instance: &SearchInstance,
) -> SvResult<Optimized> {
    if !instance.terminator().can_fire() && !strategy.is_bounded() {
        return Err(config_error!(
            "terminator '{}' never fires and {} never runs out of candidates",
            instance.terminator().key(),
            strategy.name()
        ));
    }
    instance.log().detail(format!(
        "Starting {} on instance {} with terminator '{}'",
        strategy.name(),
        instance.id(),
        instance.terminator().key()
    ));

    let reason = loop {
        if instance.is_terminated() {
            break TerminationReason::BudgetReached;
        }
        let batch = match strategy.propose(instance)? {
            Some(batch) if !batch.is_empty() => batch,
            _ => break TerminationReason::SpaceExhausted,
        };
        let records = instance.evaluate_batch(batch)?;
        strategy.observe(&records)?;
    };

    let archive = instance.archive();
    instance.log().terminated(instance.id(), reason, archive.len());
    Ok(Optimized {
        result: archive.best(),
        reason,
        n_evals: archive.len(),
        n_batch: archive.n_batch(),
    })
}
