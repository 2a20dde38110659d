//! Learners that search before they fit.
//!
//! [`AutoSearch`] wraps a learner together with a search configuration and
//! an inner resampling. Training it runs a complete search on the training
//! rows only, then fits the wrapped learner once more on all training rows
//! with the winning hyperparameters or feature subset. Every call to
//! `train` builds its own instance, archive and strategy, so wrappers can be
//! trained concurrently and repeatedly without sharing search state.

use anyhow::{anyhow, bail};
use crossbeam_channel::Sender;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use sv_optimizer::{
    optimize, registry, Archive, BestPoint, Objective, Optimized, SearchConfig, SearchEvent,
    SearchLog,
};
use sv_types::{config_error, Candidate, SearchSpace, SvResult};

use crate::learner::{Learner, Model, Scorer};
use crate::objective::{codomain_of, CandidateKind, ResampleObjective, ResampleResult};
use crate::resampling::Resampling;
use crate::task::Task;

/// Hyperparameter tuning or feature selection around a learner.
#[derive(Clone)]
pub struct AutoSearch {
    id: String,
    learner: Arc<dyn Learner>,
    /// `None` selects features; the space is then built from the task.
    space: Option<SearchSpace>,
    resampling: Arc<dyn Resampling>,
    scorers: Vec<Arc<dyn Scorer>>,
    config: SearchConfig,
    events: Option<Sender<SearchEvent>>,
}

impl std::fmt::Debug for AutoSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSearch")
            .field("id", &self.id)
            .field("learner", &self.learner.id())
            .field("resampling", &self.resampling.id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AutoSearch {
    /// Tune the hyperparameters in `space`.
    pub fn tuner(
        learner: Arc<dyn Learner>,
        space: SearchSpace,
        resampling: Arc<dyn Resampling>,
        scorers: Vec<Arc<dyn Scorer>>,
        config: SearchConfig,
    ) -> SvResult<Self> {
        space.validate()?;
        if space.is_features() {
            return Err(config_error!(
                "tuner received a feature space; use a feature selector instead"
            ));
        }
        config.build_strategy(&space)?;
        Self::build(learner, Some(space), resampling, scorers, config, "tuned")
    }

    /// Select a subset of the task's features.
    pub fn fselector(
        learner: Arc<dyn Learner>,
        resampling: Arc<dyn Resampling>,
        scorers: Vec<Arc<dyn Scorer>>,
        config: SearchConfig,
    ) -> SvResult<Self> {
        if !registry::strategy_keys().contains(&config.strategy.key.as_str()) {
            return Err(sv_types::SearchError::UnknownKey {
                registry: "strategy".to_string(),
                key: config.strategy.key.clone(),
            }
            .into());
        }
        Self::build(learner, None, resampling, scorers, config, "fselect")
    }

    fn build(
        learner: Arc<dyn Learner>,
        space: Option<SearchSpace>,
        resampling: Arc<dyn Resampling>,
        scorers: Vec<Arc<dyn Scorer>>,
        config: SearchConfig,
        suffix: &str,
    ) -> SvResult<Self> {
        let codomain = codomain_of(&scorers)?;
        config.terminator.validate(&codomain)?;
        Ok(Self {
            id: format!("{}.{}", learner.id(), suffix),
            learner,
            space,
            resampling,
            scorers,
            config,
            events: None,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Forward the events of every inner search to `tx`.
    pub fn with_events(mut self, tx: Sender<SearchEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn is_feature_selector(&self) -> bool {
        self.space.is_none()
    }
}

impl Learner for AutoSearch {
    fn id(&self) -> &str {
        &self.id
    }

    fn configure(&self, params: &Candidate) -> anyhow::Result<Arc<dyn Learner>> {
        if !params.is_empty() {
            bail!("'{}' has no tunable parameters, got {}", self.id, params);
        }
        Ok(Arc::new(self.clone()))
    }

    fn train(&self, task: &Task, rows: &[usize]) -> anyhow::Result<Box<dyn Model>> {
        let (space, kind) = match &self.space {
            Some(space) => (space.clone(), CandidateKind::Hyperparameters),
            None => (
                SearchSpace::features(task.feature_names()),
                CandidateKind::FeatureSubset,
            ),
        };

        let objective = Arc::new(ResampleObjective::new(
            task.clone(),
            rows,
            Arc::clone(&self.learner),
            kind,
            self.resampling.as_ref(),
            self.scorers.clone(),
        )?);
        let shared: Arc<dyn Objective> = objective.clone();

        let mut log = SearchLog::new(self.config.log_level);
        if let Some(tx) = &self.events {
            log = log.with_events(tx.clone());
        }
        let instance = self.config.instance(space, shared)?.with_log(log);
        let mut strategy = self.config.build_strategy(instance.space())?;
        let outcome = optimize(strategy.as_mut(), &instance)?;

        let best = outcome
            .result
            .as_ref()
            .map(|r| r.first().clone())
            .ok_or_else(|| anyhow!("inner search of '{}' produced no successful evaluation", self.id))?;

        let (model, features) = match kind {
            CandidateKind::Hyperparameters => {
                let tuned = self.learner.configure(&best.x_domain)?;
                (tuned.train(task, rows)?, None)
            }
            CandidateKind::FeatureSubset => {
                let features = best.candidate.selected_features();
                let subset = task.select(&features)?;
                (self.learner.train(&subset, rows)?, Some(features))
            }
        };
        tracing::debug!(
            "'{}' fitted final model on {} rows with {}",
            self.id,
            rows.len(),
            best.candidate
        );

        Ok(Box::new(TunedModel {
            model,
            features,
            search: InnerSearch {
                instance_id: instance.id(),
                outcome,
                archive: Arc::clone(instance.archive()),
                best,
                objective,
            },
        }))
    }
}

/// What an inner search left behind.
pub struct InnerSearch {
    pub instance_id: Uuid,
    pub outcome: Optimized,
    pub archive: Arc<Archive>,
    /// The point the final model was fitted with.
    pub best: BestPoint,
    objective: Arc<ResampleObjective>,
}

impl InnerSearch {
    pub fn resample_result(&self, resample_ref: Uuid) -> Option<ResampleResult> {
        self.objective.resample_result(resample_ref)
    }
}

impl std::fmt::Debug for InnerSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InnerSearch")
            .field("instance_id", &self.instance_id)
            .field("outcome", &self.outcome)
            .field("n_evals", &self.archive.len())
            .field("best", &self.best)
            .finish()
    }
}

/// Final model plus the search that chose its configuration.
pub struct TunedModel {
    model: Box<dyn Model>,
    features: Option<Vec<String>>,
    search: InnerSearch,
}

impl TunedModel {
    /// Selected features, for feature-selection wrappers.
    pub fn features(&self) -> Option<&[String]> {
        self.features.as_deref()
    }
}

impl Model for TunedModel {
    fn predict(&self, task: &Task, rows: &[usize]) -> anyhow::Result<Vec<f64>> {
        match &self.features {
            Some(features) => self.model.predict(&task.select(features)?, rows),
            None => self.model.predict(task, rows),
        }
    }

    fn importance(&self) -> Option<BTreeMap<String, f64>> {
        self.model.importance()
    }

    fn inner_search(&self) -> Option<&InnerSearch> {
        Some(&self.search)
    }
}
