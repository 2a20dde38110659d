use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use sv_types::{config_error, Candidate, ParamValue, SearchSpace, SvResult};

use super::{candidate_key, check_batch_size, default_batch_size, SearchStrategy};
use crate::instance::SearchInstance;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExhaustiveSearchConfig {
    /// Largest feature subset to enumerate (all features when unset).
    #[serde(default)]
    pub max_features: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ExhaustiveSearchConfig {
    fn default() -> Self {
        Self {
            max_features: None,
            batch_size: default_batch_size(),
        }
    }
}

/// Lazy, deterministic enumeration of a discrete space.
#[derive(Debug, Clone)]
enum Enumeration {
    /// Feature subsets by size, then lexicographically by feature index.
    Subsets {
        features: Vec<String>,
        max_size: usize,
        next: Option<Vec<usize>>,
    },
    /// Every point of the cross-product, first dimension most significant.
    Points {
        axes: Vec<(String, Vec<ParamValue>)>,
        next: Option<Vec<usize>>,
        seen: HashSet<String>,
    },
}

/// Visits every candidate of a discrete space exactly once.
#[derive(Debug, Clone)]
pub struct ExhaustiveSearch {
    batch_size: usize,
    enumeration: Enumeration,
}

impl ExhaustiveSearch {
    pub fn new(space: &SearchSpace, config: ExhaustiveSearchConfig) -> SvResult<Self> {
        check_batch_size(config.batch_size)?;

        let enumeration = if space.is_features() {
            let features = space.ids();
            let max_size = config.max_features.unwrap_or(features.len()).min(features.len());
            if max_size == 0 {
                return Err(config_error!("max_features must be at least 1"));
            }
            Enumeration::Subsets {
                next: (!features.is_empty()).then(|| vec![0]),
                features,
                max_size,
            }
        } else {
            let mut axes = Vec::with_capacity(space.dim());
            for param in &space.parameters {
                let values = SearchSpace::discrete_values(param)?.ok_or_else(|| {
                    config_error!(
                        "exhaustive search needs a discrete space, '{}' is continuous",
                        param.name
                    )
                })?;
                axes.push((param.name.clone(), values));
            }
            Enumeration::Points {
                next: Some(vec![0; axes.len()]),
                axes,
                seen: HashSet::new(),
            }
        };

        Ok(Self {
            batch_size: config.batch_size,
            enumeration,
        })
    }

    fn next_candidate(&mut self, space: &SearchSpace) -> Option<Candidate> {
        match &mut self.enumeration {
            Enumeration::Subsets {
                features,
                max_size,
                next,
            } => {
                let current = next.take()?;
                let selected: Vec<&String> = current.iter().map(|i| &features[*i]).collect();
                *next = advance_combination(&current, features.len(), *max_size);
                Some(Candidate::from_features(features, &selected))
            }
            Enumeration::Points { axes, next, seen } => loop {
                let current = next.take()?;
                *next = advance_counter(&current, axes);
                let point: Candidate = axes
                    .iter()
                    .zip(&current)
                    .map(|((name, values), i)| (name.clone(), values[*i].clone()))
                    .collect();
                let point = space.prune_inactive(&point);
                if space.check(&point).is_ok() && seen.insert(candidate_key(&point)) {
                    return Some(point);
                }
            },
        }
    }
}

/// Next k-combination of `0..n`, moving to size k+1 once size k is done.
fn advance_combination(current: &[usize], n: usize, max_size: usize) -> Option<Vec<usize>> {
    let k = current.len();
    let mut next = current.to_vec();
    for i in (0..k).rev() {
        if next[i] < n - k + i {
            next[i] += 1;
            for j in i + 1..k {
                next[j] = next[j - 1] + 1;
            }
            return Some(next);
        }
    }
    (k < max_size).then(|| (0..k + 1).collect())
}

/// Mixed-radix increment over the axis sizes.
fn advance_counter(current: &[usize], axes: &[(String, Vec<ParamValue>)]) -> Option<Vec<usize>> {
    let mut next = current.to_vec();
    for i in (0..next.len()).rev() {
        next[i] += 1;
        if next[i] < axes[i].1.len() {
            return Some(next);
        }
        next[i] = 0;
    }
    None
}

impl SearchStrategy for ExhaustiveSearch {
    fn name(&self) -> &str {
        "exhaustive_search"
    }

    fn is_bounded(&self) -> bool {
        true
    }

    fn propose(&mut self, instance: &SearchInstance) -> SvResult<Option<Vec<Candidate>>> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.next_candidate(instance.space()) {
                Some(c) => batch.push(c),
                None => break,
            }
        }
        Ok((!batch.is_empty()).then_some(batch))
    }
}
