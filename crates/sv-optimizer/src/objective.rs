//! Contract with the external evaluation collaborator.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

use sv_types::{Candidate, Codomain, EvaluationError};

/// What the collaborator reports for one successfully evaluated candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    /// One aggregated score per codomain measure, in codomain order.
    pub scores: Vec<f64>,
    /// Seconds spent fitting models for this candidate.
    pub train_seconds: f64,
    /// Per-feature importance, for strategies that eliminate features.
    pub importance: Option<BTreeMap<String, f64>>,
    /// Handle to the collaborator's full resampling result.
    pub resample_ref: Uuid,
}

impl EvalOutcome {
    pub fn new(scores: Vec<f64>) -> Self {
        Self {
            scores,
            train_seconds: 0.0,
            importance: None,
            resample_ref: Uuid::new_v4(),
        }
    }

    pub fn with_train_seconds(mut self, secs: f64) -> Self {
        self.train_seconds = secs;
        self
    }

    pub fn with_importance(mut self, importance: BTreeMap<String, f64>) -> Self {
        self.importance = Some(importance);
        self
    }
}

/// The black box being optimized.
///
/// `evaluate_many` is called once per batch and must return exactly one
/// result per candidate, in order. Individual candidates may fail without
/// failing the batch. Candidates arrive already transformed.
pub trait Objective: Send + Sync {
    fn codomain(&self) -> &Codomain;

    fn evaluate_many(&self, candidates: &[Candidate]) -> Vec<Result<EvalOutcome, EvaluationError>>;
}

type EvalFn = dyn Fn(&Candidate) -> Result<Vec<f64>, EvaluationError> + Send + Sync;

/// Objective backed by a per-candidate closure, evaluated in parallel
/// across the batch. Wall time per candidate is reported as training time.
pub struct FnObjective {
    codomain: Codomain,
    f: Box<EvalFn>,
}

impl FnObjective {
    pub fn new(
        codomain: Codomain,
        f: impl Fn(&Candidate) -> Result<Vec<f64>, EvaluationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            codomain,
            f: Box::new(f),
        }
    }
}

impl std::fmt::Debug for FnObjective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnObjective")
            .field("codomain", &self.codomain)
            .finish_non_exhaustive()
    }
}

impl Objective for FnObjective {
    fn codomain(&self) -> &Codomain {
        &self.codomain
    }

    fn evaluate_many(&self, candidates: &[Candidate]) -> Vec<Result<EvalOutcome, EvaluationError>> {
        candidates
            .par_iter()
            .map(|c| {
                let started = Instant::now();
                let scores = (self.f)(c)?;
                Ok(EvalOutcome::new(scores).with_train_seconds(started.elapsed().as_secs_f64()))
            })
            .collect()
    }
}
