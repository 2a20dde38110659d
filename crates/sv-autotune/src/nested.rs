//! Outer resampling of any learner, wrappers included.

use rayon::prelude::*;
use std::sync::Arc;

use sv_types::{Codomain, SvResult};

use crate::autosearch::InnerSearch;
use crate::learner::{Learner, Model, Scorer};
use crate::objective::{codomain_of, fit_and_score};
use crate::resampling::Resampling;
use crate::task::Task;

/// One outer fold. A failed fold keeps its error and has no scores.
pub struct FoldResult {
    pub fold: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub scores: Vec<Option<f64>>,
    pub train_seconds: f64,
    pub error: Option<String>,
    pub model: Option<Box<dyn Model>>,
}

impl FoldResult {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Inner search of the fold's model, when the learner was a wrapper.
    pub fn inner_search(&self) -> Option<&InnerSearch> {
        self.model.as_ref().and_then(|m| m.inner_search())
    }
}

impl std::fmt::Debug for FoldResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FoldResult")
            .field("fold", &self.fold)
            .field("n_train", &self.n_train)
            .field("n_test", &self.n_test)
            .field("scores", &self.scores)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct ResampleOutcome {
    pub learner_id: String,
    pub resampling_id: String,
    pub codomain: Codomain,
    pub folds: Vec<FoldResult>,
}

impl ResampleOutcome {
    pub fn n_failed(&self) -> usize {
        self.folds.iter().filter(|f| f.is_failed()).count()
    }

    /// Mean of each measure over the folds that produced it.
    pub fn aggregate(&self) -> Vec<Option<f64>> {
        (0..self.codomain.len())
            .map(|m| {
                let scores: Vec<f64> = self
                    .folds
                    .iter()
                    .filter_map(|f| f.scores.get(m).copied().flatten())
                    .collect();
                (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64)
            })
            .collect()
    }
}

/// Resample `learner` on every row of `task`.
///
/// Folds run in parallel and are independent: a wrapper learner performs
/// one complete inner search per fold on that fold's training rows.
pub fn resample(
    task: &Task,
    learner: &dyn Learner,
    resampling: &dyn Resampling,
    scorers: &[Arc<dyn Scorer>],
) -> SvResult<ResampleOutcome> {
    let codomain = codomain_of(scorers)?;
    let splits = resampling.splits(&task.row_ids())?;
    tracing::info!(
        "Resampling '{}' on task '{}' with {} ({} folds)",
        learner.id(),
        task.id(),
        resampling.id(),
        splits.len()
    );

    let folds = splits
        .par_iter()
        .enumerate()
        .map(|(fold, split)| {
            let (n_train, n_test) = (split.train.len(), split.test.len());
            match fit_and_score(learner, task, split, scorers) {
                Ok(fitted) => FoldResult {
                    fold,
                    n_train,
                    n_test,
                    scores: fitted.scores.into_iter().map(Some).collect(),
                    train_seconds: fitted.train_seconds,
                    error: None,
                    model: Some(fitted.model),
                },
                Err(err) => {
                    tracing::warn!("Fold {} of '{}' failed: {:#}", fold, learner.id(), err);
                    FoldResult {
                        fold,
                        n_train,
                        n_test,
                        scores: vec![None; scorers.len()],
                        train_seconds: 0.0,
                        error: Some(format!("{err:#}")),
                        model: None,
                    }
                }
            }
        })
        .collect();

    Ok(ResampleOutcome {
        learner_id: learner.id().to_string(),
        resampling_id: resampling.id().to_string(),
        codomain,
        folds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autosearch::AutoSearch;
    use crate::learner::tests::{toy_task, BrokenLearner, ConstantLearner, RowRecorder};
    use crate::learner::Mse;
    use crate::resampling::{Holdout, KFold};
    use serde_json::json;
    use std::collections::HashSet;
    use sv_optimizer::{LogLevel, SearchConfig, SearchEvent, Terminator};
    use sv_types::SearchSpace;

    fn tuner(learner: Arc<dyn Learner>) -> AutoSearch {
        AutoSearch::tuner(
            learner,
            SearchSpace::new().add_int("c", 0, 19),
            Arc::new(Holdout::default()),
            vec![Arc::new(Mse)],
            SearchConfig::new("inner", Terminator::evals(4))
                .with_strategy("random_search", json!({"batch_size": 2}))
                .with_log_level(LogLevel::Off),
        )
        .unwrap()
    }

    #[test]
    fn plain_learner_scores_every_fold() {
        let task = toy_task();
        let outcome = resample(
            &task,
            &ConstantLearner { c: 9 },
            &KFold::new(4).with_seed(1),
            &[Arc::new(Mse)],
        )
        .unwrap();
        assert_eq!(outcome.folds.len(), 4);
        assert_eq!(outcome.n_failed(), 0);
        assert!(outcome.aggregate()[0].unwrap() > 0.0);
        assert!(outcome.folds.iter().all(|f| f.inner_search().is_none()));
    }

    #[test]
    fn each_outer_fold_runs_an_independent_inner_search() {
        let task = toy_task();
        let outer = KFold::new(2).with_seed(7);
        let recorder = RowRecorder::default();
        let seen = Arc::clone(&recorder.seen);
        let (tx, rx) = crossbeam_channel::unbounded();
        let wrapper = tuner(Arc::new(recorder)).with_events(tx);
        let outcome = resample(&task, &wrapper, &outer, &[Arc::new(Mse)]).unwrap();
        assert_eq!(outcome.n_failed(), 0);
        assert_eq!(outcome.learner_id, "recorder.tuned");

        let inner: Vec<&InnerSearch> = outcome.folds.iter().filter_map(|f| f.inner_search()).collect();
        assert_eq!(inner.len(), 2);
        assert_ne!(inner[0].instance_id, inner[1].instance_id);
        assert!(!Arc::ptr_eq(&inner[0].archive, &inner[1].archive));
        assert_eq!(inner[0].archive.len(), 4);
        assert_eq!(inner[1].archive.len(), 4);

        // Every fit, inner or final, stays inside exactly one outer training set.
        let outer_train: Vec<HashSet<usize>> = outer
            .splits(&task.row_ids())
            .unwrap()
            .into_iter()
            .map(|s| s.train.into_iter().collect())
            .collect();
        let mut fits_per_fold = vec![0; outer_train.len()];
        let mut final_fits = vec![0; outer_train.len()];
        for rows in seen.lock().iter() {
            let owners: Vec<usize> = outer_train
                .iter()
                .enumerate()
                .filter(|(_, train)| rows.iter().all(|r| train.contains(r)))
                .map(|(fold, _)| fold)
                .collect();
            assert_eq!(owners.len(), 1, "fit on {rows:?} leaks across outer folds");
            fits_per_fold[owners[0]] += 1;
            if rows.len() == outer_train[owners[0]].len() {
                final_fits[owners[0]] += 1;
            }
        }
        // Four inner holdout fits plus the final fit.
        assert_eq!(fits_per_fold, vec![5, 5]);
        assert_eq!(final_fits, vec![1, 1]);

        let terminated: HashSet<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                SearchEvent::Terminated { instance_id, .. } => Some(instance_id),
                _ => None,
            })
            .collect();
        assert_eq!(terminated.len(), 2);
    }

    #[test]
    fn failed_inner_search_fails_only_its_fold() {
        let task = toy_task();
        let outcome = resample(
            &task,
            &tuner(Arc::new(BrokenLearner)),
            &KFold::new(2).with_seed(7),
            &[Arc::new(Mse)],
        )
        .unwrap();
        assert_eq!(outcome.n_failed(), 2);
        for fold in &outcome.folds {
            assert_eq!(fold.scores, vec![None]);
            assert!(fold.error.as_deref().unwrap().contains("no successful evaluation"));
        }
        assert_eq!(outcome.aggregate(), vec![None]);
    }
}
