use serde::{Deserialize, Serialize};
use std::sync::Arc;

use sv_types::{config_error, Candidate, Direction, SearchSpace, SvResult};

use super::{best_of, require_features, require_single, SearchStrategy};
use crate::archive::EvaluationRecord;
use crate::instance::SearchInstance;

/// Forward adds one feature per step, backward removes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequentialDirection {
    #[default]
    Sfs,
    Sbs,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SequentialConfig {
    #[serde(default)]
    pub strategy: SequentialDirection,
    /// A step is only committed if it improves the score by more than this.
    #[serde(default)]
    pub tolerance: f64,
    #[serde(default)]
    pub max_features: Option<usize>,
    #[serde(default)]
    pub min_features: Option<usize>,
}

/// Greedy sequential forward/backward selection.
///
/// Each step evaluates every single-feature addition (or removal) of the
/// current set as one batch, then commits the best one if it beats the
/// current score by more than the tolerance. Selection finishes as soon as
/// a step brings no such improvement or the size bounds are hit.
#[derive(Debug, Clone)]
pub struct SequentialSelection {
    config: SequentialConfig,
    features: Vec<String>,
    current: Vec<String>,
    current_score: Option<f64>,
    direction: Direction,
    started: bool,
    finished: bool,
}

impl SequentialSelection {
    pub fn new(space: &SearchSpace, config: SequentialConfig) -> SvResult<Self> {
        require_features(space, "sequential selection")?;
        if !config.tolerance.is_finite() || config.tolerance < 0.0 {
            return Err(config_error!("tolerance must be finite and non-negative"));
        }
        if config.min_features == Some(0) || config.max_features == Some(0) {
            return Err(config_error!("feature bounds must be at least 1"));
        }
        let features = space.ids();
        let current = match config.strategy {
            SequentialDirection::Sfs => Vec::new(),
            SequentialDirection::Sbs => features.clone(),
        };
        Ok(Self {
            config,
            features,
            current,
            current_score: None,
            direction: Direction::Minimize,
            started: false,
            finished: false,
        })
    }

    /// Features committed so far.
    pub fn selected(&self) -> &[String] {
        &self.current
    }

    fn neighbours(&self) -> Vec<Candidate> {
        match self.config.strategy {
            SequentialDirection::Sfs => {
                let max = self.config.max_features.unwrap_or(self.features.len());
                if self.current.len() >= max {
                    return Vec::new();
                }
                self.features
                    .iter()
                    .filter(|f| !self.current.contains(f))
                    .map(|f| {
                        let mut subset = self.current.clone();
                        subset.push(f.clone());
                        Candidate::from_features(&self.features, &subset)
                    })
                    .collect()
            }
            SequentialDirection::Sbs => {
                let min = self.config.min_features.unwrap_or(1);
                if self.current.len() <= min {
                    return Vec::new();
                }
                self.current
                    .iter()
                    .map(|drop| {
                        let subset: Vec<&String> =
                            self.current.iter().filter(|f| *f != drop).collect();
                        Candidate::from_features(&self.features, &subset)
                    })
                    .collect()
            }
        }
    }
}

impl SearchStrategy for SequentialSelection {
    fn name(&self) -> &str {
        "sequential"
    }

    fn is_bounded(&self) -> bool {
        true
    }

    fn propose(&mut self, instance: &SearchInstance) -> SvResult<Option<Vec<Candidate>>> {
        if self.finished {
            return Ok(None);
        }
        if !self.started {
            require_single(instance, "sequential selection")?;
            self.direction = instance.codomain().primary().direction;
            self.started = true;
            if self.config.strategy == SequentialDirection::Sbs {
                return Ok(Some(vec![Candidate::from_features(
                    &self.features,
                    &self.current,
                )]));
            }
        }

        let batch = self.neighbours();
        if batch.is_empty() {
            self.finished = true;
            return Ok(None);
        }
        instance.log().detail(format!(
            "sequential step from {} features: {} neighbours",
            self.current.len(),
            batch.len()
        ));
        Ok(Some(batch))
    }

    fn observe(&mut self, records: &[Arc<EvaluationRecord>]) -> SvResult<()> {
        let Some((best, score)) = best_of(self.direction, records) else {
            // Nothing in this step could be scored.
            self.finished = true;
            return Ok(());
        };
        let improves = match self.current_score {
            None => true,
            Some(current) => self.direction.improvement(current, score) > self.config.tolerance,
        };
        if improves {
            self.current = best.candidate.selected_features();
            self.current_score = Some(score);
        } else {
            self.finished = true;
        }
        Ok(())
    }
}
