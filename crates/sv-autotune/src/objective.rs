//! Resampling-backed objective: every candidate is scored by fitting the
//! learner on each training split and predicting its test split.

use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use sv_optimizer::{EvalOutcome, Objective};
use sv_types::{Candidate, Codomain, EvaluationError, SvResult};

use crate::learner::{Learner, Model, Scorer};
use crate::resampling::{Resampling, Split};
use crate::task::Task;

/// Per-split scores of one candidate, kept behind the record's
/// `resample_ref`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampleResult {
    pub learner_id: String,
    /// One row per split, one score per measure.
    pub split_scores: Vec<Vec<f64>>,
    pub train_seconds: f64,
}

impl ResampleResult {
    /// Mean over splits, per measure.
    pub fn aggregate(&self) -> Vec<f64> {
        let n = self.split_scores.len() as f64;
        let width = self.split_scores.first().map_or(0, Vec::len);
        (0..width)
            .map(|m| self.split_scores.iter().map(|s| s[m]).sum::<f64>() / n)
            .collect()
    }
}

/// Outcome of fitting on one split.
pub(crate) struct Fitted {
    pub model: Box<dyn Model>,
    pub scores: Vec<f64>,
    pub train_seconds: f64,
}

/// Train on `train`, predict `test`, score with every scorer.
pub(crate) fn fit_and_score(
    learner: &dyn Learner,
    task: &Task,
    split: &Split,
    scorers: &[Arc<dyn Scorer>],
) -> anyhow::Result<Fitted> {
    let started = Instant::now();
    let model = learner.train(task, &split.train)?;
    let train_seconds = started.elapsed().as_secs_f64();
    let predicted = model.predict(task, &split.test)?;
    if predicted.len() != split.test.len() {
        anyhow::bail!(
            "learner '{}' returned {} predictions for {} rows",
            learner.id(),
            predicted.len(),
            split.test.len()
        );
    }
    let truth = task.truth(&split.test);
    let scores = scorers.iter().map(|s| s.score(&truth, &predicted)).collect();
    Ok(Fitted {
        model,
        scores,
        train_seconds,
    })
}

pub(crate) fn codomain_of(scorers: &[Arc<dyn Scorer>]) -> SvResult<Codomain> {
    Codomain::new(scorers.iter().map(|s| s.measure()).collect())
}

/// What a candidate stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// Learner hyperparameters.
    Hyperparameters,
    /// Inclusion flags over the task's features.
    FeatureSubset,
}

/// Objective that resamples a learner on a fixed set of splits.
///
/// Splits are drawn once at construction so every candidate of a search
/// sees the same partitions.
pub struct ResampleObjective {
    task: Task,
    learner: Arc<dyn Learner>,
    kind: CandidateKind,
    splits: Vec<Split>,
    scorers: Vec<Arc<dyn Scorer>>,
    codomain: Codomain,
    results: Mutex<HashMap<Uuid, ResampleResult>>,
}

impl ResampleObjective {
    pub fn new(
        task: Task,
        rows: &[usize],
        learner: Arc<dyn Learner>,
        kind: CandidateKind,
        resampling: &dyn Resampling,
        scorers: Vec<Arc<dyn Scorer>>,
    ) -> SvResult<Self> {
        let codomain = codomain_of(&scorers)?;
        let splits = resampling.splits(rows)?;
        Ok(Self {
            task,
            learner,
            kind,
            splits,
            scorers,
            codomain,
            results: Mutex::new(HashMap::new()),
        })
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    /// Full per-split result behind a record's `resample_ref`.
    pub fn resample_result(&self, id: Uuid) -> Option<ResampleResult> {
        self.results.lock().get(&id).cloned()
    }

    fn evaluate_one(&self, candidate: &Candidate) -> anyhow::Result<EvalOutcome> {
        let (learner, task) = match self.kind {
            CandidateKind::Hyperparameters => {
                (self.learner.configure(candidate)?, self.task.clone())
            }
            CandidateKind::FeatureSubset => (
                Arc::clone(&self.learner),
                self.task.select(&candidate.selected_features())?,
            ),
        };

        let mut split_scores = Vec::with_capacity(self.splits.len());
        let mut train_seconds = 0.0;
        let mut importances: Vec<BTreeMap<String, f64>> = Vec::new();
        for split in &self.splits {
            let fitted = fit_and_score(learner.as_ref(), &task, split, &self.scorers)?;
            train_seconds += fitted.train_seconds;
            if let Some(importance) = fitted.model.importance() {
                importances.push(importance);
            }
            split_scores.push(fitted.scores);
        }

        let result = ResampleResult {
            learner_id: learner.id().to_string(),
            split_scores,
            train_seconds,
        };
        let mut outcome = EvalOutcome::new(result.aggregate()).with_train_seconds(train_seconds);
        if !importances.is_empty() && importances.len() == self.splits.len() {
            outcome = outcome.with_importance(mean_importance(&importances));
        }
        self.results.lock().insert(outcome.resample_ref, result);
        Ok(outcome)
    }
}

fn mean_importance(maps: &[BTreeMap<String, f64>]) -> BTreeMap<String, f64> {
    let mut sum: BTreeMap<String, f64> = BTreeMap::new();
    for map in maps {
        for (name, value) in map {
            *sum.entry(name.clone()).or_default() += value;
        }
    }
    let n = maps.len() as f64;
    sum.into_iter().map(|(k, v)| (k, v / n)).collect()
}

impl Objective for ResampleObjective {
    fn codomain(&self) -> &Codomain {
        &self.codomain
    }

    fn evaluate_many(&self, candidates: &[Candidate]) -> Vec<Result<EvalOutcome, EvaluationError>> {
        candidates
            .par_iter()
            .map(|c| {
                self.evaluate_one(c)
                    .map_err(|err| EvaluationError::failed(format!("{err:#}")))
            })
            .collect()
    }
}
