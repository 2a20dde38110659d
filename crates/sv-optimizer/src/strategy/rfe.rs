use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use sv_types::{config_error, Candidate, EvaluationError, SearchSpace, SvResult};

use super::{require_features, require_single, SearchStrategy};
use crate::archive::EvaluationRecord;
use crate::instance::SearchInstance;

fn default_fraction() -> f64 {
    0.5
}

fn default_n_features() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfeConfig {
    /// Share of the current features removed per round.
    #[serde(default = "default_fraction")]
    pub feature_fraction: f64,
    /// Smallest subset that is still evaluated.
    #[serde(default = "default_n_features")]
    pub n_features: usize,
    /// Re-rank features from every fitted subset instead of reusing the
    /// ranking of the full set.
    #[serde(default)]
    pub recursive: bool,
}

impl Default for RfeConfig {
    fn default() -> Self {
        Self {
            feature_fraction: default_fraction(),
            n_features: default_n_features(),
            recursive: false,
        }
    }
}

/// Recursive feature elimination driven by collaborator-reported
/// importance. Evaluates one subset per batch, largest first.
#[derive(Debug, Clone)]
pub struct RecursiveElimination {
    config: RfeConfig,
    features: Vec<String>,
    current: Vec<String>,
    /// Full-set importance, kept for the non-recursive variant.
    ranking: Option<BTreeMap<String, f64>>,
    started: bool,
    finished: bool,
}

impl RecursiveElimination {
    pub fn new(space: &SearchSpace, config: RfeConfig) -> SvResult<Self> {
        require_features(space, "recursive feature elimination")?;
        if !(config.feature_fraction > 0.0 && config.feature_fraction < 1.0) {
            return Err(config_error!(
                "feature_fraction must lie in (0, 1), got {}",
                config.feature_fraction
            ));
        }
        let features = space.ids();
        if config.n_features == 0 || config.n_features > features.len() {
            return Err(config_error!(
                "n_features must lie in [1, {}], got {}",
                features.len(),
                config.n_features
            ));
        }
        Ok(Self {
            config,
            current: features.clone(),
            features,
            ranking: None,
            started: false,
            finished: false,
        })
    }

    /// Size of the subset that follows one of size `len`.
    fn next_size(&self, len: usize) -> usize {
        let shrunk = (len as f64 * (1.0 - self.config.feature_fraction)).floor() as usize;
        shrunk.max(self.config.n_features).min(len.saturating_sub(1))
    }

    /// Keep the `keep` most important current features; ties keep the
    /// earlier feature.
    fn eliminate(&mut self, importance: &BTreeMap<String, f64>, keep: usize) {
        let mut ranked: Vec<(usize, &String, f64)> = self
            .current
            .iter()
            .enumerate()
            .map(|(i, f)| (i, f, importance.get(f).copied().unwrap_or(0.0)))
            .collect();
        ranked.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));
        let mut kept: Vec<(usize, String)> = ranked
            .into_iter()
            .take(keep)
            .map(|(i, f, _)| (i, f.clone()))
            .collect();
        kept.sort_by_key(|(i, _)| *i);
        self.current = kept.into_iter().map(|(_, f)| f).collect();
    }
}

impl SearchStrategy for RecursiveElimination {
    fn name(&self) -> &str {
        "rfe"
    }

    fn is_bounded(&self) -> bool {
        true
    }

    fn propose(&mut self, instance: &SearchInstance) -> SvResult<Option<Vec<Candidate>>> {
        if !self.started {
            require_single(instance, "recursive feature elimination")?;
            self.started = true;
        }
        if self.finished {
            return Ok(None);
        }
        Ok(Some(vec![Candidate::from_features(
            &self.features,
            &self.current,
        )]))
    }

    fn observe(&mut self, records: &[Arc<EvaluationRecord>]) -> SvResult<()> {
        let Some(record) = records.first() else {
            self.finished = true;
            return Ok(());
        };
        if self.current.len() <= self.config.n_features || record.is_failed() {
            // A failed fit yields no importance to eliminate by.
            self.finished = true;
            return Ok(());
        }

        let fresh = record
            .importance
            .clone()
            .ok_or(EvaluationError::MissingImportance {
                features: self.current.len(),
            })?;
        let importance = if self.config.recursive {
            fresh
        } else {
            self.ranking.get_or_insert(fresh).clone()
        };

        let keep = self.next_size(self.current.len());
        self.eliminate(&importance, keep);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::SearchLog;
    use crate::objective::{EvalOutcome, Objective};
    use crate::optimize::optimize;
    use crate::terminator::Terminator;
    use sv_types::{Codomain, Measure, SvError};

    /// Importance of feature `fN` is N; error falls as important features
    /// dominate the subset.
    struct Ranked {
        codomain: Codomain,
        report_importance: bool,
    }

    impl Objective for Ranked {
        fn codomain(&self) -> &Codomain {
            &self.codomain
        }

        fn evaluate_many(
            &self,
            candidates: &[Candidate],
        ) -> Vec<Result<EvalOutcome, EvaluationError>> {
            candidates
                .iter()
                .map(|c| {
                    let selected = c.selected_features();
                    let importance: BTreeMap<String, f64> = selected
                        .iter()
                        .map(|f| (f.clone(), f[1..].parse::<f64>().unwrap_or(0.0)))
                        .collect();
                    let mean = importance.values().sum::<f64>() / importance.len() as f64;
                    let outcome = EvalOutcome::new(vec![1.0 / mean]);
                    Ok(if self.report_importance {
                        outcome.with_importance(importance)
                    } else {
                        outcome
                    })
                })
                .collect()
        }
    }

    fn instance(report_importance: bool) -> SearchInstance {
        let names: Vec<String> = (1..=8).map(|i| format!("f{i}")).collect();
        SearchInstance::new(
            SearchSpace::features(&names),
            Arc::new(Ranked {
                codomain: Codomain::single(Measure::minimize("ce")),
                report_importance,
            }),
            Terminator::evals(100),
        )
        .unwrap()
        .with_log(SearchLog::silent())
    }

    #[test]
    fn halves_until_minimum_size() {
        let instance = instance(true);
        let mut rfe = RecursiveElimination::new(instance.space(), RfeConfig::default()).unwrap();
        let outcome = optimize(&mut rfe, &instance).unwrap();

        let sizes: Vec<usize> = instance
            .archive()
            .data()
            .iter()
            .map(|r| r.candidate.selected_features().len())
            .collect();
        assert_eq!(sizes, vec![8, 4, 2, 1]);
        assert_eq!(
            outcome.result.unwrap().first().candidate.selected_features(),
            vec!["f8".to_string()]
        );
    }

    #[test]
    fn stops_at_configured_size() {
        let instance = instance(true);
        let mut rfe = RecursiveElimination::new(
            instance.space(),
            RfeConfig {
                n_features: 3,
                recursive: true,
                ..Default::default()
            },
        )
        .unwrap();
        optimize(&mut rfe, &instance).unwrap();
        let last = instance.archive().data().last().cloned().unwrap();
        assert_eq!(
            last.candidate.selected_features(),
            vec!["f6".to_string(), "f7".to_string(), "f8".to_string()]
        );
    }

    #[test]
    fn missing_importance_is_an_error() {
        let instance = instance(false);
        let mut rfe = RecursiveElimination::new(instance.space(), RfeConfig::default()).unwrap();
        let err = optimize(&mut rfe, &instance).unwrap_err();
        assert!(matches!(
            err,
            SvError::Evaluation(EvaluationError::MissingImportance { features: 8 })
        ));
    }

    #[test]
    fn rejects_bad_fraction() {
        let space = SearchSpace::features(&["a", "b"]);
        let config = RfeConfig {
            feature_fraction: 1.0,
            ..Default::default()
        };
        assert!(RecursiveElimination::new(&space, config).is_err());
    }
}
