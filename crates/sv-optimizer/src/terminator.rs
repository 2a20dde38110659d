//! Stopping rules consulted between batches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sv_types::{config_error, Codomain, SearchError, SvResult};

use crate::archive::Archive;

/// Stop after a fixed number of evaluations (`n_evals + k * dim`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalsConfig {
    pub n_evals: usize,
    #[serde(default)]
    pub k: usize,
}

/// Stop once `secs` seconds have passed since the search started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTimeConfig {
    pub secs: f64,
}

/// Stop once the wall clock reaches `deadline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockTimeConfig {
    pub deadline: DateTime<Utc>,
}

/// Stop once the summed model-training time reaches `secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTimeConfig {
    pub secs: f64,
}

/// Stop once the best score is at least as good as `level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfReachedConfig {
    pub level: f64,
}

/// Stop when the last `iters` records improved the best score by no more
/// than `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagnationConfig {
    pub iters: usize,
    #[serde(default)]
    pub threshold: f64,
}

/// Stop when the last `n` batches improved the best score by no more than
/// `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagnationBatchConfig {
    pub n: usize,
    #[serde(default)]
    pub threshold: f64,
}

/// Combine several terminators: stop when any (or all) of them fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboConfig {
    pub terminators: Vec<Terminator>,
    #[serde(default = "default_any")]
    pub any: bool,
}

fn default_any() -> bool {
    true
}

/// Stopping rule. A pure function of the archive and its configuration
/// (plus the wall clock for the time-based variants).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Terminator {
    Evals(EvalsConfig),
    RunTime(RunTimeConfig),
    ClockTime(ClockTimeConfig),
    ModelTime(ModelTimeConfig),
    PerfReached(PerfReachedConfig),
    Stagnation(StagnationConfig),
    StagnationBatch(StagnationBatchConfig),
    Combo(ComboConfig),
    None,
}

impl Terminator {
    pub fn evals(n_evals: usize) -> Self {
        Terminator::Evals(EvalsConfig { n_evals, k: 0 })
    }

    pub fn run_time(secs: f64) -> Self {
        Terminator::RunTime(RunTimeConfig { secs })
    }

    pub fn clock_time(deadline: DateTime<Utc>) -> Self {
        Terminator::ClockTime(ClockTimeConfig { deadline })
    }

    pub fn model_time(secs: f64) -> Self {
        Terminator::ModelTime(ModelTimeConfig { secs })
    }

    pub fn perf_reached(level: f64) -> Self {
        Terminator::PerfReached(PerfReachedConfig { level })
    }

    pub fn stagnation(iters: usize, threshold: f64) -> Self {
        Terminator::Stagnation(StagnationConfig { iters, threshold })
    }

    pub fn stagnation_batch(n: usize, threshold: f64) -> Self {
        Terminator::StagnationBatch(StagnationBatchConfig { n, threshold })
    }

    pub fn any_of(terminators: Vec<Terminator>) -> Self {
        Terminator::Combo(ComboConfig {
            terminators,
            any: true,
        })
    }

    pub fn all_of(terminators: Vec<Terminator>) -> Self {
        Terminator::Combo(ComboConfig {
            terminators,
            any: false,
        })
    }

    /// Registry key of this variant.
    pub fn key(&self) -> &'static str {
        match self {
            Terminator::Evals(_) => "evals",
            Terminator::RunTime(_) => "run_time",
            Terminator::ClockTime(_) => "clock_time",
            Terminator::ModelTime(_) => "model_time",
            Terminator::PerfReached(_) => "perf_reached",
            Terminator::Stagnation(_) => "stagnation",
            Terminator::StagnationBatch(_) => "stagnation_batch",
            Terminator::Combo(_) => "combo",
            Terminator::None => "none",
        }
    }

    /// Reject configurations that could never run sensibly.
    pub fn validate(&self, codomain: &Codomain) -> SvResult<()> {
        let single_only = |key: &str| -> SvResult<()> {
            if codomain.is_single() {
                Ok(())
            } else {
                Err(SearchError::UnsupportedObjective {
                    message: format!("terminator '{key}' requires a single-criterion objective"),
                }
                .into())
            }
        };

        match self {
            Terminator::Evals(c) => {
                if c.n_evals == 0 && c.k == 0 {
                    return Err(config_error!("evals terminator needs a positive budget"));
                }
            }
            Terminator::RunTime(RunTimeConfig { secs })
            | Terminator::ModelTime(ModelTimeConfig { secs }) => {
                if !secs.is_finite() || *secs < 0.0 {
                    return Err(config_error!(
                        "{} terminator needs a finite, non-negative number of seconds, got {secs}",
                        self.key()
                    ));
                }
            }
            Terminator::ClockTime(_) | Terminator::None => {}
            Terminator::PerfReached(c) => {
                single_only(self.key())?;
                if c.level.is_nan() {
                    return Err(config_error!("perf_reached level must be a number"));
                }
            }
            Terminator::Stagnation(StagnationConfig { iters: n, threshold })
            | Terminator::StagnationBatch(StagnationBatchConfig { n, threshold }) => {
                single_only(self.key())?;
                if *n == 0 {
                    return Err(config_error!("{} window must be at least 1", self.key()));
                }
                if !threshold.is_finite() || *threshold < 0.0 {
                    return Err(config_error!(
                        "{} threshold must be finite and non-negative, got {threshold}",
                        self.key()
                    ));
                }
            }
            Terminator::Combo(c) => {
                if c.terminators.is_empty() {
                    return Err(config_error!("combo terminator needs at least one member"));
                }
                for t in &c.terminators {
                    t.validate(codomain)?;
                }
            }
        }
        Ok(())
    }

    /// Whether this terminator can fire at all. `None`, or an all-of combo
    /// containing it, never does.
    pub fn can_fire(&self) -> bool {
        match self {
            Terminator::None => false,
            Terminator::Combo(c) if c.any => c.terminators.iter().any(Terminator::can_fire),
            Terminator::Combo(c) => c.terminators.iter().all(Terminator::can_fire),
            _ => true,
        }
    }

    /// Whether the search should stop. An empty archive never stops.
    pub fn should_stop(&self, archive: &Archive) -> bool {
        if archive.is_empty() {
            return false;
        }
        match self {
            Terminator::Evals(c) => {
                archive.len() >= c.n_evals.saturating_add(c.k.saturating_mul(archive.dim()))
            }
            Terminator::RunTime(c) => elapsed_secs(archive.started_at()) >= c.secs,
            Terminator::ClockTime(c) => Utc::now() >= c.deadline,
            Terminator::ModelTime(c) => archive.total_train_seconds() >= c.secs,
            Terminator::PerfReached(c) => {
                let direction = archive.codomain().primary().direction;
                archive
                    .best_score()
                    .is_some_and(|best| !direction.better(c.level, best))
            }
            Terminator::Stagnation(c) => {
                let records = archive.data();
                if records.len() <= c.iters {
                    return false;
                }
                let (before, recent) = records.split_at(records.len() - c.iters);
                stagnated(archive, before, recent, c.threshold)
            }
            Terminator::StagnationBatch(c) => {
                let n_batch = archive.n_batch();
                if n_batch <= c.n {
                    return false;
                }
                let records = archive.data();
                let split = records
                    .iter()
                    .position(|r| r.batch_nr > n_batch - c.n)
                    .unwrap_or(records.len());
                let (before, recent) = records.split_at(split);
                stagnated(archive, before, recent, c.threshold)
            }
            Terminator::Combo(c) => {
                if c.any {
                    c.terminators.iter().any(|t| t.should_stop(archive))
                } else {
                    c.terminators.iter().all(|t| t.should_stop(archive))
                }
            }
            Terminator::None => false,
        }
    }
}

fn elapsed_secs(since: DateTime<Utc>) -> f64 {
    (Utc::now() - since).num_milliseconds() as f64 / 1000.0
}

/// `recent` did not beat the best of `before` by more than `threshold`.
fn stagnated(
    archive: &Archive,
    before: &[std::sync::Arc<crate::archive::EvaluationRecord>],
    recent: &[std::sync::Arc<crate::archive::EvaluationRecord>],
    threshold: f64,
) -> bool {
    let direction = archive.codomain().primary().direction;
    match (archive.best_primary(before), archive.best_primary(recent)) {
        (Some(old), Some(new)) => {
            // NaN (e.g. inf - inf) counts as no improvement.
            let gain = direction.improvement(old, new);
            !(gain > threshold)
        }
        (Some(_), None) => true,
        // Nothing usable before the window: anything found is progress.
        (None, Some(_)) => false,
        // Every record so far failed: too little history to judge.
        (None, None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::draft;
    use chrono::Duration;
    use sv_types::Measure;

    fn archive_min() -> Archive {
        Archive::new(Codomain::single(Measure::minimize("ce")), 2)
    }

    fn all_variants() -> Vec<Terminator> {
        vec![
            Terminator::evals(1),
            Terminator::run_time(0.0),
            Terminator::clock_time(Utc::now() - Duration::hours(1)),
            Terminator::model_time(0.0),
            Terminator::perf_reached(f64::INFINITY),
            Terminator::stagnation(1, 0.0),
            Terminator::stagnation_batch(1, 0.0),
            Terminator::any_of(vec![Terminator::evals(1)]),
            Terminator::None,
        ]
    }

    #[test]
    fn empty_archive_never_stops() {
        let archive = archive_min();
        for t in all_variants() {
            assert!(t.validate(archive.codomain()).is_ok(), "{}", t.key());
            assert!(!t.should_stop(&archive), "{} stopped on empty archive", t.key());
        }
    }

    #[test]
    fn evals_is_exact_and_monotone() {
        let archive = archive_min();
        let t = Terminator::evals(3);
        let mut fired_at = None;
        for x in 0..6 {
            archive.append(vec![draft(x, vec![Some(1.0)])]);
            let stop = t.should_stop(&archive);
            if stop && fired_at.is_none() {
                fired_at = Some(archive.len());
            }
            if fired_at.is_some() {
                assert!(stop, "evals terminator must stay fired");
            }
        }
        assert_eq!(fired_at, Some(3));
    }

    #[test]
    fn evals_scales_with_dimension() {
        let archive = archive_min();
        let t = Terminator::Evals(EvalsConfig { n_evals: 1, k: 2 });
        archive.append((0..4).map(|x| draft(x, vec![Some(1.0)])).collect());
        assert!(!t.should_stop(&archive));
        archive.append(vec![draft(9, vec![Some(1.0)])]);
        assert!(t.should_stop(&archive));
    }

    #[test]
    fn time_based_variants() {
        let archive = archive_min();
        archive.append(vec![draft(1, vec![Some(1.0)]), draft(2, vec![Some(1.0)])]);
        assert!(Terminator::run_time(0.0).should_stop(&archive));
        assert!(!Terminator::run_time(3600.0).should_stop(&archive));
        assert!(!Terminator::clock_time(Utc::now() + Duration::hours(1)).should_stop(&archive));
        assert!(Terminator::clock_time(Utc::now() - Duration::seconds(1)).should_stop(&archive));
        // Two records at 0.5s each.
        assert!(Terminator::model_time(1.0).should_stop(&archive));
        assert!(!Terminator::model_time(1.5).should_stop(&archive));
    }

    #[test]
    fn perf_reached_respects_direction() {
        let archive = archive_min();
        archive.append(vec![draft(1, vec![Some(0.3)])]);
        assert!(!Terminator::perf_reached(0.2).should_stop(&archive));
        assert!(Terminator::perf_reached(0.3).should_stop(&archive));

        let max = Archive::new(Codomain::single(Measure::maximize("acc")), 1);
        max.append(vec![draft(1, vec![Some(0.8)])]);
        assert!(Terminator::perf_reached(0.75).should_stop(&max));
        assert!(!Terminator::perf_reached(0.85).should_stop(&max));
    }

    #[test]
    fn stagnation_over_records() {
        let archive = archive_min();
        let t = Terminator::stagnation(2, 0.01);
        archive.append(vec![draft(1, vec![Some(0.5)]), draft(2, vec![Some(0.4)])]);
        // Not enough history yet.
        assert!(!t.should_stop(&archive));
        archive.append(vec![draft(3, vec![Some(0.3)])]);
        assert!(!t.should_stop(&archive));
        archive.append(vec![draft(4, vec![Some(0.395)]), draft(5, vec![Some(0.45)])]);
        assert!(t.should_stop(&archive));
    }

    #[test]
    fn stagnation_over_batches() {
        let archive = archive_min();
        let t = Terminator::stagnation_batch(1, 0.0);
        archive.append(vec![draft(1, vec![Some(0.5)]), draft(2, vec![Some(0.6)])]);
        assert!(!t.should_stop(&archive));
        archive.append(vec![draft(3, vec![Some(0.4)]), draft(4, vec![Some(0.9)])]);
        assert!(!t.should_stop(&archive));
        archive.append(vec![draft(5, vec![Some(0.4)]), draft(6, vec![Some(0.7)])]);
        assert!(t.should_stop(&archive));
    }

    #[test]
    fn evals_budget_saturates_instead_of_overflowing() {
        let archive = archive_min();
        archive.append(vec![draft(1, vec![Some(0.5)])]);
        let huge = Terminator::Evals(EvalsConfig {
            n_evals: usize::MAX,
            k: usize::MAX,
        });
        assert!(huge.validate(archive.codomain()).is_ok());
        assert!(!huge.should_stop(&archive));
    }

    #[test]
    fn stagnation_keeps_going_when_everything_failed() {
        let archive = archive_min();
        for x in 1..=3 {
            archive.append(vec![draft(x, vec![None])]);
        }
        assert!(!Terminator::stagnation(1, 0.0).should_stop(&archive));
        assert!(!Terminator::stagnation_batch(1, 0.0).should_stop(&archive));
    }

    #[test]
    fn none_and_all_of_none_can_never_fire() {
        assert!(!Terminator::None.can_fire());
        assert!(!Terminator::all_of(vec![Terminator::evals(3), Terminator::None]).can_fire());
        assert!(Terminator::any_of(vec![Terminator::evals(3), Terminator::None]).can_fire());
        assert!(Terminator::run_time(1.0).can_fire());
    }

    #[test]
    fn combo_any_and_all() {
        let archive = archive_min();
        archive.append(vec![draft(1, vec![Some(0.5)])]);
        let fired = Terminator::evals(1);
        let idle = Terminator::evals(10);
        assert!(Terminator::any_of(vec![fired.clone(), idle.clone()]).should_stop(&archive));
        assert!(!Terminator::all_of(vec![fired, idle]).should_stop(&archive));
    }

    #[test]
    fn misconfiguration_fails_fast() {
        let single = Codomain::single(Measure::minimize("ce"));
        assert!(Terminator::evals(0).validate(&single).is_err());
        assert!(Terminator::run_time(-1.0).validate(&single).is_err());
        assert!(Terminator::model_time(f64::NAN).validate(&single).is_err());
        assert!(Terminator::stagnation(0, 0.0).validate(&single).is_err());
        assert!(Terminator::stagnation_batch(1, -0.1).validate(&single).is_err());
        assert!(Terminator::any_of(vec![]).validate(&single).is_err());

        let multi = Codomain::new(vec![Measure::minimize("ce"), Measure::minimize("time")]).unwrap();
        assert!(Terminator::perf_reached(0.1).validate(&multi).is_err());
        assert!(Terminator::stagnation(3, 0.0).validate(&multi).is_err());
        assert!(Terminator::evals(3).validate(&multi).is_ok());
    }

    #[test]
    fn tagged_json_round_trip() {
        let t = Terminator::any_of(vec![Terminator::evals(20), Terminator::run_time(60.0)]);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["type"], "combo");
        assert_eq!(json["terminators"][0]["n_evals"], 20);
        let back: Terminator = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }
}
