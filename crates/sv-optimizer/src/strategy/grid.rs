use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use sv_types::{config_error, Candidate, ParamValue, SearchSpace, SvResult, MAX_ENUMERATION};

use super::{check_batch_size, dedup, default_batch_size, SearchStrategy};
use crate::instance::SearchInstance;

fn default_resolution() -> usize {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSearchConfig {
    /// Points per dimension.
    #[serde(default = "default_resolution")]
    pub resolution: usize,
    /// Per-parameter overrides of `resolution`.
    #[serde(default)]
    pub param_resolutions: BTreeMap<String, usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            param_resolutions: BTreeMap::new(),
            batch_size: default_batch_size(),
        }
    }
}

/// Cross-product grid over every dimension, enumerated once.
#[derive(Debug, Clone)]
pub struct GridSearch {
    batch_size: usize,
    cursor: usize,
    combos: Vec<Candidate>,
}

impl GridSearch {
    pub fn new(space: &SearchSpace, config: GridSearchConfig) -> SvResult<Self> {
        check_batch_size(config.batch_size)?;
        if config.resolution == 0 || config.param_resolutions.values().any(|r| *r == 0) {
            return Err(config_error!("grid resolution must be at least 1"));
        }
        let combos = Self::build_grid(space, &config)?;
        Ok(Self {
            batch_size: config.batch_size,
            cursor: 0,
            combos,
        })
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    fn build_grid(space: &SearchSpace, config: &GridSearchConfig) -> SvResult<Vec<Candidate>> {
        let mut axes: Vec<(&str, Vec<ParamValue>)> = Vec::with_capacity(space.dim());
        for param in &space.parameters {
            let resolution = config
                .param_resolutions
                .get(&param.name)
                .copied()
                .unwrap_or(config.resolution);
            axes.push((param.name.as_str(), SearchSpace::grid_values(param, resolution)?));
        }

        let size = axes
            .iter()
            .try_fold(1usize, |acc, (_, values)| acc.checked_mul(values.len()));
        if size.map_or(true, |n| n > MAX_ENUMERATION) {
            return Err(config_error!(
                "grid over {} parameters has more than {MAX_ENUMERATION} points",
                axes.len()
            ));
        }

        // Every value of each axis against every point built so far.
        let mut result: Vec<Candidate> = vec![Candidate::new()];
        for (name, values) in &axes {
            let mut next = Vec::with_capacity(result.len() * values.len());
            for existing in &result {
                for value in values {
                    next.push(existing.clone().with(*name, value.clone()));
                }
            }
            result = next;
        }

        // Inactive dependents collapse onto the same point.
        let pruned = result.iter().map(|c| space.prune_inactive(c)).collect();
        Ok(dedup(pruned)
            .into_iter()
            .filter(|c| space.check(c).is_ok())
            .collect())
    }
}

impl SearchStrategy for GridSearch {
    fn name(&self) -> &str {
        "grid_search"
    }

    fn is_bounded(&self) -> bool {
        true
    }

    fn propose(&mut self, _instance: &SearchInstance) -> SvResult<Option<Vec<Candidate>>> {
        if self.cursor >= self.combos.len() {
            return Ok(None);
        }
        let end = (self.cursor + self.batch_size).min(self.combos.len());
        let batch = self.combos[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(Some(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::tests::{identity_objective, int_space};
    use crate::log::SearchLog;
    use crate::terminator::Terminator;
    use sv_types::Condition;

    fn instance() -> SearchInstance {
        SearchInstance::new(int_space(), identity_objective(None), Terminator::evals(100))
            .unwrap()
            .with_log(SearchLog::silent())
    }

    #[test]
    fn per_parameter_resolution_overrides_default() {
        let space = SearchSpace::new()
            .add_int("max_depth", 1, 3)
            .add_float("learning_rate", 0.01, 0.3);
        let grid = GridSearch::new(
            &space,
            GridSearchConfig {
                resolution: 2,
                param_resolutions: BTreeMap::from([("max_depth".to_string(), 3)]),
                batch_size: 1,
            },
        )
        .unwrap();
        assert_eq!(grid.len(), 6);
    }

    #[test]
    fn batches_drain_the_grid_then_stop() {
        let space = SearchSpace::new().add_int("x", 1, 5);
        let mut gs = GridSearch::new(
            &space,
            GridSearchConfig {
                batch_size: 3,
                ..GridSearchConfig::default()
            },
        )
        .unwrap();
        let instance = instance();
        assert_eq!(gs.propose(&instance).unwrap().unwrap().len(), 3);
        assert_eq!(gs.propose(&instance).unwrap().unwrap().len(), 2);
        assert!(gs.propose(&instance).unwrap().is_none());
    }

    #[test]
    fn dependent_parameters_collapse() {
        let space = SearchSpace::new()
            .add_categorical("kernel", ["linear", "polynomial"])
            .add_int("degree", 1, 3)
            .with_condition("degree", Condition::equals("kernel", "polynomial"));
        let gs = GridSearch::new(&space, GridSearchConfig::default()).unwrap();
        // linear once, polynomial x 3 degrees.
        assert_eq!(gs.len(), 4);
        assert!(gs.combos.iter().all(|c| space.check(c).is_ok()));
    }

    #[test]
    fn full_integer_range_keeps_its_endpoints() {
        let space = SearchSpace::new().add_int("seed", i64::MIN, i64::MAX);
        let grid = crate::registry::strategy("grid_search", serde_json::json!({"resolution": 3}), &space)
            .unwrap();
        assert_eq!(grid.name(), "grid_search");

        let gs = GridSearch::new(&space, GridSearchConfig { resolution: 3, ..Default::default() })
            .unwrap();
        let seeds: Vec<_> = gs.combos.iter().map(|c| c.get("seed").cloned()).collect();
        assert_eq!(seeds.first(), Some(&Some(ParamValue::Int(i64::MIN))));
        assert_eq!(seeds.last(), Some(&Some(ParamValue::Int(i64::MAX))));
    }

    #[test]
    fn oversized_grid_is_a_config_error() {
        let space = SearchSpace::new()
            .add_float("learning_rate", 0.01, 0.3)
            .add_float("subsample", 0.5, 1.0);
        let err = GridSearch::new(
            &space,
            GridSearchConfig {
                resolution: 2048,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, sv_types::SvError::Config(_)));
    }
}
