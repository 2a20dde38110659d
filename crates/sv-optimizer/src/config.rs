//! Declarative search configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use sv_types::{SearchSpace, SvResult};

use crate::instance::{FailurePolicy, SearchInstance};
use crate::log::{LogLevel, SearchLog};
use crate::objective::Objective;
use crate::optimize::{optimize, Optimized};
use crate::registry;
use crate::strategy::SearchStrategy;
use crate::terminator::Terminator;

/// A strategy referenced by registry key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub key: String,
    #[serde(default)]
    pub params: Value,
}

impl StrategySpec {
    pub fn new(key: impl Into<String>, params: Value) -> Self {
        Self {
            key: key.into(),
            params,
        }
    }
}

impl Default for StrategySpec {
    fn default() -> Self {
        Self::new("random_search", Value::Null)
    }
}

/// Everything needed to run one search, apart from the space and the
/// objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub name: String,
    #[serde(default)]
    pub strategy: StrategySpec,
    pub terminator: Terminator,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub log_level: LogLevel,
}

impl SearchConfig {
    pub fn new(name: impl Into<String>, terminator: Terminator) -> Self {
        Self {
            name: name.into(),
            strategy: StrategySpec::default(),
            terminator,
            failure_policy: FailurePolicy::default(),
            log_level: LogLevel::default(),
        }
    }

    pub fn with_strategy(mut self, key: impl Into<String>, params: Value) -> Self {
        self.strategy = StrategySpec::new(key, params);
        self
    }

    pub fn with_terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn from_json_str(json: &str) -> SvResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> SvResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> SvResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build a fresh strategy for `space`.
    pub fn build_strategy(&self, space: &SearchSpace) -> SvResult<Box<dyn SearchStrategy>> {
        registry::strategy(&self.strategy.key, self.strategy.params.clone(), space)
    }

    /// Build a fresh instance with an empty archive.
    pub fn instance(
        &self,
        space: SearchSpace,
        objective: Arc<dyn Objective>,
    ) -> SvResult<SearchInstance> {
        Ok(
            SearchInstance::new(space, objective, self.terminator.clone())?
                .with_failure_policy(self.failure_policy)
                .with_log(SearchLog::new(self.log_level)),
        )
    }
}

/// Run a complete search described by `config`.
pub fn tune(
    config: &SearchConfig,
    space: SearchSpace,
    objective: Arc<dyn Objective>,
) -> SvResult<(SearchInstance, Optimized)> {
    let instance = config.instance(space, objective)?;
    let mut strategy = config.build_strategy(instance.space())?;
    tracing::info!(
        "Running search '{}' with {} on {} parameters",
        config.name,
        strategy.name(),
        instance.space().dim()
    );
    let outcome = optimize(strategy.as_mut(), &instance)?;
    Ok((instance, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::tests::{identity_objective, int_space};
    use crate::log::TerminationReason;
    use serde_json::json;
    use std::io::Write;
    use sv_types::{ParamValue, SearchError, SvError};

    const CONFIG: &str = r#"{
        "name": "smoke",
        "strategy": {"key": "grid_search", "params": {"batch_size": 2}},
        "terminator": {"type": "evals", "n_evals": 4},
        "failure_policy": "worst_case",
        "log_level": "off"
    }"#;

    #[test]
    fn parses_json_with_defaults() {
        let config = SearchConfig::from_json_str(CONFIG).unwrap();
        assert_eq!(config.strategy.key, "grid_search");
        assert_eq!(config.failure_policy, FailurePolicy::WorstCase);

        let minimal =
            SearchConfig::from_json_str(r#"{"name": "m", "terminator": {"type": "none"}}"#)
                .unwrap();
        assert_eq!(minimal.strategy, StrategySpec::default());
        assert_eq!(minimal.log_level, LogLevel::Info);
    }

    #[test]
    fn loads_from_file_and_round_trips() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = SearchConfig::from_path(file.path()).unwrap();
        let again = SearchConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn tune_runs_grid_to_budget() {
        let config = SearchConfig::from_json_str(CONFIG).unwrap();
        let (instance, outcome) = tune(&config, int_space(), identity_objective(None)).unwrap();
        assert_eq!(outcome.reason, TerminationReason::BudgetReached);
        assert_eq!(outcome.n_evals, 4);
        assert_eq!(instance.failure_policy(), FailurePolicy::WorstCase);
        assert_eq!(
            outcome.result.unwrap().first().candidate.get("x"),
            Some(&ParamValue::Int(1))
        );
    }

    #[test]
    fn endless_random_search_is_refused() {
        let mut config =
            SearchConfig::from_json_str(r#"{"name": "m", "terminator": {"type": "none"}}"#)
                .unwrap();
        config.log_level = LogLevel::Off;
        let err = tune(&config, int_space(), identity_objective(None)).unwrap_err();
        assert!(matches!(err, SvError::Config(_)));

        let grid = config.with_strategy("grid_search", json!({}));
        let (_, outcome) = tune(&grid, int_space(), identity_objective(None)).unwrap();
        assert_eq!(outcome.reason, TerminationReason::SpaceExhausted);
        assert_eq!(outcome.n_evals, 5);
    }

    #[test]
    fn unknown_strategy_key_fails_before_evaluating() {
        let config = SearchConfig::new("bad", Terminator::evals(3))
            .with_strategy("annealing", json!({}))
            .with_log_level(LogLevel::Off);
        let err = tune(&config, int_space(), identity_objective(None)).unwrap_err();
        assert!(matches!(
            err,
            SvError::Search(SearchError::UnknownKey { .. })
        ));
    }
}
