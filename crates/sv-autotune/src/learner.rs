//! Collaborator traits: learners, fitted models and scoring measures.

use std::collections::BTreeMap;
use std::sync::Arc;

use sv_types::{Candidate, Measure};

use crate::autosearch::InnerSearch;
use crate::task::Task;

/// Something that can be fitted on rows of a task.
pub trait Learner: Send + Sync {
    fn id(&self) -> &str;

    /// A copy of this learner with hyperparameters set from `params`.
    fn configure(&self, params: &Candidate) -> anyhow::Result<Arc<dyn Learner>>;

    fn train(&self, task: &Task, rows: &[usize]) -> anyhow::Result<Box<dyn Model>>;
}

/// A fitted model.
pub trait Model: Send + Sync {
    /// One prediction per row, in order.
    fn predict(&self, task: &Task, rows: &[usize]) -> anyhow::Result<Vec<f64>>;

    /// Per-feature importance, for models that report it.
    fn importance(&self) -> Option<BTreeMap<String, f64>> {
        None
    }

    /// The search that produced this model, for wrapped learners.
    fn inner_search(&self) -> Option<&InnerSearch> {
        None
    }
}

/// A performance measure computed from truth and predictions.
pub trait Scorer: Send + Sync {
    fn measure(&self) -> Measure;

    fn score(&self, truth: &[f64], predicted: &[f64]) -> f64;
}

/// Mean squared error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mse;

impl Scorer for Mse {
    fn measure(&self) -> Measure {
        Measure::minimize("regr.mse")
    }

    fn score(&self, truth: &[f64], predicted: &[f64]) -> f64 {
        mean(truth.iter().zip(predicted).map(|(t, p)| (t - p).powi(2)))
    }
}

/// Mean absolute error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mae;

impl Scorer for Mae {
    fn measure(&self) -> Measure {
        Measure::minimize("regr.mae")
    }

    fn score(&self, truth: &[f64], predicted: &[f64]) -> f64 {
        mean(truth.iter().zip(predicted).map(|(t, p)| (t - p).abs()))
    }
}

/// Share of rows whose rounded prediction differs from the label.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifError;

impl Scorer for ClassifError {
    fn measure(&self) -> Measure {
        Measure::minimize("classif.ce").with_worst(1.0)
    }

    fn score(&self, truth: &[f64], predicted: &[f64]) -> f64 {
        mean(
            truth
                .iter()
                .zip(predicted)
                .map(|(t, p)| if t.round() == p.round() { 0.0 } else { 1.0 }),
        )
    }
}

/// Share of rows whose rounded prediction matches the label.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl Scorer for Accuracy {
    fn measure(&self) -> Measure {
        Measure::maximize("classif.acc").with_worst(0.0)
    }

    fn score(&self, truth: &[f64], predicted: &[f64]) -> f64 {
        1.0 - ClassifError.score(truth, predicted)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::{anyhow, bail};

    /// Predicts the constant `c`, an integer hyperparameter (default 0).
    #[derive(Debug, Clone, Default)]
    pub(crate) struct ConstantLearner {
        pub c: i64,
    }

    struct Constant(f64);

    impl Model for Constant {
        fn predict(&self, _task: &Task, rows: &[usize]) -> anyhow::Result<Vec<f64>> {
            Ok(vec![self.0; rows.len()])
        }
    }

    impl Learner for ConstantLearner {
        fn id(&self) -> &str {
            "constant"
        }

        fn configure(&self, params: &Candidate) -> anyhow::Result<Arc<dyn Learner>> {
            let c = params
                .get("c")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| anyhow!("missing integer parameter 'c'"))?;
            Ok(Arc::new(ConstantLearner { c }))
        }

        fn train(&self, _task: &Task, rows: &[usize]) -> anyhow::Result<Box<dyn Model>> {
            if rows.is_empty() {
                bail!("no training rows");
            }
            Ok(Box::new(Constant(self.c as f64)))
        }
    }

    /// A [`ConstantLearner`] that logs the rows of every fit into `seen`.
    /// Configured copies share the log.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RowRecorder {
        pub c: i64,
        pub seen: Arc<parking_lot::Mutex<Vec<Vec<usize>>>>,
    }

    impl Learner for RowRecorder {
        fn id(&self) -> &str {
            "recorder"
        }

        fn configure(&self, params: &Candidate) -> anyhow::Result<Arc<dyn Learner>> {
            let c = params
                .get("c")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| anyhow!("missing integer parameter 'c'"))?;
            Ok(Arc::new(RowRecorder {
                c,
                seen: Arc::clone(&self.seen),
            }))
        }

        fn train(&self, _task: &Task, rows: &[usize]) -> anyhow::Result<Box<dyn Model>> {
            self.seen.lock().push(rows.to_vec());
            Ok(Box::new(Constant(self.c as f64)))
        }
    }

    /// Predicts the row mean of every feature in the task. Importance of a
    /// feature is higher the closer it tracks the target on training rows.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MeanOfFeatures;

    struct MeanModel {
        importance: BTreeMap<String, f64>,
    }

    impl Model for MeanModel {
        fn predict(&self, task: &Task, rows: &[usize]) -> anyhow::Result<Vec<f64>> {
            let columns: Vec<&[f64]> = task
                .feature_names()
                .iter()
                .filter_map(|n| task.column(n))
                .collect();
            if columns.is_empty() {
                bail!("task '{}' has no features", task.id());
            }
            Ok(rows
                .iter()
                .map(|&r| columns.iter().map(|c| c[r]).sum::<f64>() / columns.len() as f64)
                .collect())
        }

        fn importance(&self) -> Option<BTreeMap<String, f64>> {
            Some(self.importance.clone())
        }
    }

    impl Learner for MeanOfFeatures {
        fn id(&self) -> &str {
            "mean_of_features"
        }

        fn configure(&self, _params: &Candidate) -> anyhow::Result<Arc<dyn Learner>> {
            Ok(Arc::new(MeanOfFeatures))
        }

        fn train(&self, task: &Task, rows: &[usize]) -> anyhow::Result<Box<dyn Model>> {
            let truth = task.truth(rows);
            let importance = task
                .feature_names()
                .iter()
                .filter_map(|name| {
                    let col = task.column(name)?;
                    let predicted: Vec<f64> = rows.iter().map(|&r| col[r]).collect();
                    Some((name.clone(), 1.0 / (1.0 + Mae.score(&truth, &predicted))))
                })
                .collect();
            Ok(Box::new(MeanModel { importance }))
        }
    }

    /// Fails every fit.
    pub(crate) struct BrokenLearner;

    impl Learner for BrokenLearner {
        fn id(&self) -> &str {
            "broken"
        }

        fn configure(&self, _params: &Candidate) -> anyhow::Result<Arc<dyn Learner>> {
            Ok(Arc::new(BrokenLearner))
        }

        fn train(&self, _task: &Task, _rows: &[usize]) -> anyhow::Result<Box<dyn Model>> {
            bail!("singular design matrix")
        }
    }

    /// Twenty rows; the target equals feature `f`, other features are noise.
    pub(crate) fn toy_task() -> Task {
        let n = 20;
        let f: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let a: Vec<f64> = (0..n).map(|i| ((i * 7) % 5) as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| 30.0 - i as f64).collect();
        let g: Vec<f64> = (0..n).map(|i| (i % 3) as f64 * 4.0).collect();
        Task::from_columns(
            "toy",
            vec![
                ("a".to_string(), a),
                ("b".to_string(), b),
                ("f".to_string(), f.clone()),
                ("g".to_string(), g),
            ],
            f,
        )
        .unwrap()
    }

    #[test]
    fn scorers_agree_on_simple_vectors() {
        let truth = [1.0, 0.0, 1.0, 1.0];
        let predicted = [1.0, 1.0, 0.9, 0.2];
        assert_eq!(ClassifError.score(&truth, &predicted), 0.5);
        assert_eq!(Accuracy.score(&truth, &predicted), 0.5);
        assert!((Mae.score(&[1.0, 3.0], &[2.0, 1.0]) - 1.5).abs() < 1e-12);
        assert!((Mse.score(&[1.0, 3.0], &[2.0, 1.0]) - 2.5).abs() < 1e-12);
        assert!(Mse.score(&[], &[]).is_nan());
    }

    #[test]
    fn mean_model_is_exact_on_the_target_feature() {
        let task = toy_task();
        let only_f = task.select(&["f"]).unwrap();
        let rows = task.row_ids();
        let model = MeanOfFeatures.train(&only_f, &rows).unwrap();
        let predicted = model.predict(&only_f, &rows).unwrap();
        assert_eq!(Mse.score(&task.truth(&rows), &predicted), 0.0);
        assert_eq!(model.importance().unwrap()["f"], 1.0);
    }
}
