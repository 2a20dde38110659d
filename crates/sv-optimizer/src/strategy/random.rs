use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use sv_types::{Candidate, ParamKind, ParamValue, SearchSpace, SvResult};

use super::{check_batch_size, default_batch_size, SearchStrategy};
use crate::instance::SearchInstance;

/// Redraws allowed per slot before a sample is given up on.
const MAX_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSearchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for RandomSearchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            seed: None,
        }
    }
}

/// Independent uniform sampling across the search space.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    batch_size: usize,
    rng: StdRng,
}

impl RandomSearch {
    pub fn new(config: RandomSearchConfig) -> SvResult<Self> {
        check_batch_size(config.batch_size)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            batch_size: config.batch_size,
            rng,
        })
    }

    /// One draw; parameters whose condition does not hold are left out.
    pub fn sample_one(&mut self, space: &SearchSpace) -> Candidate {
        let mut candidate = Candidate::new();
        for param in &space.parameters {
            let active = param
                .depends
                .as_ref()
                .map_or(true, |c| c.is_met(&candidate));
            if !active {
                continue;
            }
            let value = match &param.kind {
                ParamKind::Float { low, high } => {
                    ParamValue::Float(self.rng.random_range(*low..=*high))
                }
                ParamKind::Int { low, high } => ParamValue::Int(self.rng.random_range(*low..=*high)),
                ParamKind::Bool => ParamValue::Bool(self.rng.random_bool(0.5)),
                ParamKind::Categorical { levels } => {
                    let idx = self.rng.random_range(0..levels.len());
                    ParamValue::Categorical(levels[idx].clone())
                }
            };
            candidate = candidate.with(param.name.clone(), value);
        }
        candidate
    }
}

impl SearchStrategy for RandomSearch {
    fn name(&self) -> &str {
        "random_search"
    }

    fn propose(&mut self, instance: &SearchInstance) -> SvResult<Option<Vec<Candidate>>> {
        let space = instance.space();
        let mut batch = Vec::with_capacity(self.batch_size);
        for _ in 0..self.batch_size {
            let mut last_error = None;
            for _ in 0..MAX_ATTEMPTS {
                let candidate = self.sample_one(space);
                match space.check(&candidate) {
                    Ok(()) => {
                        batch.push(candidate);
                        last_error = None;
                        break;
                    }
                    Err(err) => last_error = Some((candidate, err)),
                }
            }
            if let Some((candidate, err)) = last_error {
                instance.log().rejected(&candidate, &err.to_string());
            }
        }
        Ok(Some(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::SearchLog;
    use crate::terminator::Terminator;
    use std::sync::Arc;
    use sv_types::{Codomain, Condition, EvaluationError, Measure};

    fn sample_space() -> SearchSpace {
        SearchSpace::new()
            .add_int("max_depth", 3, 10)
            .add_float("learning_rate", 0.01, 0.3)
            .add_categorical("kernel", ["linear", "polynomial"])
            .add_int("degree", 2, 4)
            .with_condition("degree", Condition::equals("kernel", "polynomial"))
    }

    #[test]
    fn samples_stay_in_bounds_and_honor_conditions() {
        let space = sample_space();
        let mut rs = RandomSearch::new(RandomSearchConfig {
            batch_size: 1,
            seed: Some(7),
        })
        .unwrap();
        for _ in 0..200 {
            let c = rs.sample_one(&space);
            assert!(space.check(&c).is_ok(), "invalid sample {c}");
            let poly = c.get("kernel") == Some(&ParamValue::Categorical("polynomial".into()));
            assert_eq!(c.contains("degree"), poly);
        }
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let space = sample_space();
        let config = RandomSearchConfig {
            batch_size: 1,
            seed: Some(42),
        };
        let mut a = RandomSearch::new(config.clone()).unwrap();
        let mut b = RandomSearch::new(config).unwrap();
        for _ in 0..10 {
            assert_eq!(a.sample_one(&space), b.sample_one(&space));
        }
    }

    #[test]
    fn feature_samples_are_never_empty() {
        let space = SearchSpace::features(&["a"]);
        let objective = Arc::new(crate::objective::FnObjective::new(
            Codomain::single(Measure::minimize("ce")),
            |_| Ok::<_, EvaluationError>(vec![0.0]),
        ));
        let instance = SearchInstance::new(space, objective, Terminator::evals(10))
            .unwrap()
            .with_log(SearchLog::silent());
        let mut rs = RandomSearch::new(RandomSearchConfig {
            batch_size: 20,
            seed: Some(1),
        })
        .unwrap();
        let batch = rs.propose(&instance).unwrap().unwrap();
        assert_eq!(batch.len(), 20);
        assert!(batch.iter().all(|c| c.selected_features() == vec!["a".to_string()]));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(RandomSearch::new(RandomSearchConfig {
            batch_size: 0,
            seed: None
        })
        .is_err());
    }
}
