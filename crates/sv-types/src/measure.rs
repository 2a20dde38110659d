//! Performance measures and the objective codomain.

use serde::{Deserialize, Serialize};

use crate::errors::{SearchError, SvResult};

/// Whether we are maximizing or minimizing a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Maximize,
    Minimize,
}

impl Default for Direction {
    fn default() -> Self {
        Self::Minimize
    }
}

impl Direction {
    /// `true` if `a` is strictly better than `b`.
    pub fn better(self, a: f64, b: f64) -> bool {
        match self {
            Direction::Minimize => a < b,
            Direction::Maximize => a > b,
        }
    }

    /// How much `new` improves on `old` (positive = better).
    pub fn improvement(self, old: f64, new: f64) -> f64 {
        match self {
            Direction::Minimize => old - new,
            Direction::Maximize => new - old,
        }
    }

    /// Sign that turns a score into a "lower is better" value.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Minimize => 1.0,
            Direction::Maximize => -1.0,
        }
    }
}

/// One performance measure reported by the evaluation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub id: String,
    #[serde(default)]
    pub direction: Direction,
    /// Score substituted for failed evaluations under the worst-case policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worst: Option<f64>,
}

impl Measure {
    pub fn minimize(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            direction: Direction::Minimize,
            worst: None,
        }
    }

    pub fn maximize(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            direction: Direction::Maximize,
            worst: None,
        }
    }

    pub fn with_worst(mut self, worst: f64) -> Self {
        self.worst = Some(worst);
        self
    }

    /// The configured worst score, or the infinite end of the scale.
    pub fn worst_score(&self) -> f64 {
        self.worst.unwrap_or(match self.direction {
            Direction::Minimize => f64::INFINITY,
            Direction::Maximize => f64::NEG_INFINITY,
        })
    }
}

/// Ordered list of measures the search optimizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Codomain {
    measures: Vec<Measure>,
}

impl Codomain {
    pub fn new(measures: Vec<Measure>) -> SvResult<Self> {
        if measures.is_empty() {
            return Err(SearchError::UnsupportedObjective {
                message: "at least one measure is required".into(),
            }
            .into());
        }
        for (i, m) in measures.iter().enumerate() {
            if measures[..i].iter().any(|o| o.id == m.id) {
                return Err(SearchError::UnsupportedObjective {
                    message: format!("duplicate measure '{}'", m.id),
                }
                .into());
            }
        }
        Ok(Self { measures })
    }

    pub fn single(measure: Measure) -> Self {
        Self {
            measures: vec![measure],
        }
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn len(&self) -> usize {
        self.measures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.measures.len() == 1
    }

    /// Direction of the first measure (the only one for single-criterion).
    pub fn primary(&self) -> &Measure {
        &self.measures[0]
    }

    /// `a` Pareto-dominates `b`: no worse everywhere, strictly better once.
    pub fn dominates(&self, a: &[f64], b: &[f64]) -> bool {
        let mut strictly = false;
        for ((m, x), y) in self.measures.iter().zip(a).zip(b) {
            if m.direction.better(*y, *x) {
                return false;
            }
            if m.direction.better(*x, *y) {
                strictly = true;
            }
        }
        strictly
    }
}
