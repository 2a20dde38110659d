//! Train/test split generators.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use sv_types::{config_error, validation_error, SvResult};

/// One train/test partition, as task row indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partitions a set of rows into train/test splits.
pub trait Resampling: Send + Sync {
    fn id(&self) -> &str;

    fn splits(&self, rows: &[usize]) -> SvResult<Vec<Split>>;
}

fn shuffled(rows: &[usize], seed: Option<u64>) -> Vec<usize> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut rows = rows.to_vec();
    rows.shuffle(&mut rng);
    rows
}

fn default_ratio() -> f64 {
    2.0 / 3.0
}

/// A single random split with `ratio` of the rows used for training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holdout {
    #[serde(default = "default_ratio")]
    pub ratio: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for Holdout {
    fn default() -> Self {
        Self {
            ratio: default_ratio(),
            seed: None,
        }
    }
}

impl Holdout {
    pub fn new(ratio: f64) -> Self {
        Self { ratio, seed: None }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Resampling for Holdout {
    fn id(&self) -> &str {
        "holdout"
    }

    fn splits(&self, rows: &[usize]) -> SvResult<Vec<Split>> {
        if !(self.ratio > 0.0 && self.ratio < 1.0) {
            return Err(config_error!("holdout ratio must lie in (0, 1), got {}", self.ratio));
        }
        if rows.len() < 2 {
            return Err(validation_error!("holdout needs at least 2 rows, got {}", rows.len()));
        }
        let rows = shuffled(rows, self.seed);
        let n_train = ((rows.len() as f64 * self.ratio).round() as usize).clamp(1, rows.len() - 1);
        let (train, test) = rows.split_at(n_train);
        Ok(vec![Split {
            train: train.to_vec(),
            test: test.to_vec(),
        }])
    }
}

/// K-fold cross-validation. Leftover rows go to the leading folds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KFold {
    pub folds: usize,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_shuffle() -> bool {
    true
}

impl KFold {
    pub fn new(folds: usize) -> Self {
        Self {
            folds,
            shuffle: true,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn without_shuffle(mut self) -> Self {
        self.shuffle = false;
        self
    }
}

impl Resampling for KFold {
    fn id(&self) -> &str {
        "cv"
    }

    fn splits(&self, rows: &[usize]) -> SvResult<Vec<Split>> {
        if self.folds < 2 {
            return Err(config_error!("k-fold needs at least 2 folds, got {}", self.folds));
        }
        if rows.len() < self.folds {
            return Err(validation_error!(
                "{} rows cannot fill {} folds",
                rows.len(),
                self.folds
            ));
        }
        let rows = if self.shuffle {
            shuffled(rows, self.seed)
        } else {
            rows.to_vec()
        };

        let fold_size = rows.len() / self.folds;
        let remainder = rows.len() % self.folds;
        let mut splits = Vec::with_capacity(self.folds);
        let mut start = 0;
        for i in 0..self.folds {
            let end = start + fold_size + usize::from(i < remainder);
            splits.push(Split {
                train: rows[..start].iter().chain(&rows[end..]).copied().collect(),
                test: rows[start..end].to_vec(),
            });
            start = end;
        }
        Ok(splits)
    }
}
