//! The search instance: evaluator of candidate batches and owner of the
//! archive and terminator.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use sv_types::{
    Candidate, Codomain, EvaluationError, SearchError, SearchSpace, SvError, SvResult,
};

use crate::archive::{Archive, EvaluationRecord, RecordDraft, SearchResult};
use crate::log::{SearchEvent, SearchLog};
use crate::objective::{EvalOutcome, Objective};
use crate::terminator::Terminator;

/// How a failed evaluation is scored in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep scores missing; such records never become the best.
    #[default]
    Missing,
    /// Substitute each measure's worst score.
    WorstCase,
}

/// Binds a search space, an objective, an archive and a terminator.
pub struct SearchInstance {
    id: Uuid,
    space: SearchSpace,
    objective: Arc<dyn Objective>,
    archive: Arc<Archive>,
    terminator: Terminator,
    failure_policy: FailurePolicy,
    log: SearchLog,
    // Serializes evaluate_batch calls on this instance.
    eval_lock: Mutex<()>,
}

impl std::fmt::Debug for SearchInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchInstance")
            .field("id", &self.id)
            .field("space", &self.space)
            .field("terminator", &self.terminator)
            .field("failure_policy", &self.failure_policy)
            .field("n_evals", &self.archive.len())
            .finish()
    }
}

impl SearchInstance {
    /// Validate the space and terminator, then create an empty archive.
    pub fn new(
        space: SearchSpace,
        objective: Arc<dyn Objective>,
        terminator: Terminator,
    ) -> SvResult<Self> {
        space.validate()?;
        let codomain = objective.codomain().clone();
        terminator.validate(&codomain)?;

        let archive = Arc::new(Archive::new(codomain, space.dim()));
        Ok(Self {
            id: Uuid::new_v4(),
            space,
            objective,
            archive,
            terminator,
            failure_policy: FailurePolicy::default(),
            log: SearchLog::default(),
            eval_lock: Mutex::new(()),
        })
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_log(mut self, log: SearchLog) -> Self {
        self.log = log;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn codomain(&self) -> &Codomain {
        self.archive.codomain()
    }

    pub fn archive(&self) -> &Arc<Archive> {
        &self.archive
    }

    pub fn terminator(&self) -> &Terminator {
        &self.terminator
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn log(&self) -> &SearchLog {
        &self.log
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator.should_stop(&self.archive)
    }

    /// Best-known result, derived from the archive.
    pub fn result(&self) -> Option<SearchResult> {
        self.archive.best()
    }

    /// Evaluate one batch and archive it atomically.
    ///
    /// Every candidate is checked against the search space before anything
    /// is evaluated; one invalid candidate rejects the whole batch.
    /// Per-candidate evaluation failures are archived according to the
    /// failure policy instead of failing the batch.
    pub fn evaluate_batch(&self, candidates: Vec<Candidate>) -> SvResult<Vec<Arc<EvaluationRecord>>> {
        let _guard = self.eval_lock.lock();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        if self.is_terminated() {
            return Err(SearchError::Terminated {
                n_evals: self.archive.len(),
            }
            .into());
        }
        for candidate in &candidates {
            self.space.check(candidate).map_err(SvError::from)?;
        }

        let xs: Vec<Candidate> = candidates.iter().map(|c| self.space.transform(c)).collect();
        let outcomes = self.objective.evaluate_many(&xs);
        if outcomes.len() != xs.len() {
            return Err(EvaluationError::BatchArity {
                expected: xs.len(),
                actual: outcomes.len(),
            }
            .into());
        }

        let drafts: Vec<RecordDraft> = candidates
            .into_iter()
            .zip(xs)
            .zip(outcomes)
            .map(|((candidate, x_domain), outcome)| self.draft(candidate, x_domain, outcome))
            .collect();

        let records = self.archive.append(drafts);
        let failed = records.iter().filter(|r| r.is_failed()).count();
        self.log.batch(SearchEvent::BatchEvaluated {
            instance_id: self.id,
            batch_nr: records.first().map_or(0, |r| r.batch_nr),
            proposed: records.len(),
            failed,
            batch_best: self.archive.best_primary(records.iter()),
            overall_best: self.archive.best_score(),
        });
        Ok(records)
    }

    fn draft(
        &self,
        candidate: Candidate,
        x_domain: Candidate,
        outcome: Result<EvalOutcome, EvaluationError>,
    ) -> RecordDraft {
        let expected = self.codomain().len();
        let outcome = outcome.and_then(|o| {
            if o.scores.len() == expected {
                Ok(o)
            } else {
                Err(EvaluationError::ScoreArity {
                    expected,
                    actual: o.scores.len(),
                })
            }
        });

        match outcome {
            Ok(o) => RecordDraft {
                candidate,
                x_domain,
                scores: o.scores.into_iter().map(Some).collect(),
                train_seconds: o.train_seconds,
                error: None,
                importance: o.importance,
                resample_ref: o.resample_ref,
            },
            Err(err) => {
                let message = err.to_string();
                self.log.failure(&candidate, &message);
                let scores = match self.failure_policy {
                    FailurePolicy::Missing => vec![None; expected],
                    FailurePolicy::WorstCase => self
                        .codomain()
                        .measures()
                        .iter()
                        .map(|m| Some(m.worst_score()))
                        .collect(),
                };
                RecordDraft {
                    candidate,
                    x_domain,
                    scores,
                    train_seconds: 0.0,
                    error: Some(message),
                    importance: None,
                    resample_ref: Uuid::new_v4(),
                }
            }
        }
    }
}
