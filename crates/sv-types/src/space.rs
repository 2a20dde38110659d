//! Search space definitions: bounds, levels, dependencies and the
//! pre-evaluation transformation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::candidate::{Candidate, ParamValue};
use crate::config_error;
use crate::errors::{SearchError, SvResult};

/// Upper bound on the points one dimension or one grid may enumerate.
pub const MAX_ENUMERATION: usize = 1 << 20;

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    /// Parameter (or feature) name.
    pub name: String,
    /// The kind of range.
    pub kind: ParamKind,
    /// Only sampled and validated while this condition holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends: Option<Condition>,
}

/// Describes the admissible values of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    /// Continuous range [low, high].
    Float { low: f64, high: f64 },
    /// Integer range [low, high] inclusive.
    Int { low: i64, high: i64 },
    /// `true` / `false`.
    Bool,
    /// One of a fixed set of levels.
    Categorical { levels: Vec<String> },
}

impl ParamKind {
    pub fn is_discrete(&self) -> bool {
        !matches!(self, ParamKind::Float { .. })
    }
}

/// Dependency: the dimension is active iff parameter `on` is active and
/// takes one of `any_of`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub on: String,
    pub any_of: Vec<ParamValue>,
}

impl Condition {
    pub fn equals(on: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        Self {
            on: on.into(),
            any_of: vec![value.into()],
        }
    }

    pub fn is_met(&self, candidate: &Candidate) -> bool {
        candidate
            .get(&self.on)
            .is_some_and(|v| self.any_of.contains(v))
    }
}

/// Whether candidates are hyperparameter vectors or feature masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceKind {
    #[default]
    Params,
    Features,
}

/// User-supplied value transformation applied just before a candidate is
/// handed to the evaluation collaborator.
#[derive(Clone)]
pub struct Transform(Arc<dyn Fn(&Candidate) -> Candidate + Send + Sync>);

impl Transform {
    pub fn new(f: impl Fn(&Candidate) -> Candidate + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, candidate: &Candidate) -> Candidate {
        (self.0)(candidate)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform(<fn>)")
    }
}

/// The full search space: an ordered list of parameter definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParamDef>,
    #[serde(default)]
    pub kind: SpaceKind,
    #[serde(skip)]
    transform: Option<Transform>,
    /// Conditions attached to names that were never declared.
    #[serde(skip)]
    orphan_conditions: Vec<String>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feature-selection space: one boolean inclusion flag per feature.
    pub fn features<S: AsRef<str>>(names: &[S]) -> Self {
        let mut space = Self {
            kind: SpaceKind::Features,
            ..Self::default()
        };
        for name in names {
            space = space.add(name.as_ref(), ParamKind::Bool);
        }
        space
    }

    fn add(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.parameters.push(ParamDef {
            name: name.into(),
            kind,
            depends: None,
        });
        self
    }

    pub fn add_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(name, ParamKind::Float { low, high })
    }

    pub fn add_int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(name, ParamKind::Int { low, high })
    }

    pub fn add_bool(self, name: impl Into<String>) -> Self {
        self.add(name, ParamKind::Bool)
    }

    pub fn add_categorical<S: Into<String>>(
        self,
        name: impl Into<String>,
        levels: impl IntoIterator<Item = S>,
    ) -> Self {
        let levels = levels.into_iter().map(Into::into).collect();
        self.add(name, ParamKind::Categorical { levels })
    }

    /// Attach a dependency to the parameter `name`.
    pub fn with_condition(mut self, name: &str, condition: Condition) -> Self {
        match self.parameters.iter_mut().find(|p| p.name == name) {
            Some(def) => def.depends = Some(condition),
            None => self.orphan_conditions.push(name.to_string()),
        }
        self
    }

    pub fn with_transform(
        mut self,
        f: impl Fn(&Candidate) -> Candidate + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Transform::new(f));
        self
    }

    pub fn dim(&self) -> usize {
        self.parameters.len()
    }

    pub fn ids(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    pub fn param(&self, name: &str) -> Option<&ParamDef> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn is_features(&self) -> bool {
        self.kind == SpaceKind::Features
    }

    pub fn is_discrete(&self) -> bool {
        self.parameters.iter().all(|p| p.kind.is_discrete())
    }

    pub fn has_dependencies(&self) -> bool {
        self.parameters.iter().any(|p| p.depends.is_some())
    }

    /// Apply the configured transformation (identity when none is set).
    pub fn transform(&self, candidate: &Candidate) -> Candidate {
        match &self.transform {
            Some(t) => t.apply(candidate),
            None => candidate.clone(),
        }
    }

    /// Structural checks on the definition itself.
    pub fn validate(&self) -> SvResult<()> {
        let invalid = |message: String| SearchError::InvalidSpace { message };

        if self.parameters.is_empty() {
            return Err(invalid("search space has no parameters".into()).into());
        }
        if let Some(name) = self.orphan_conditions.first() {
            return Err(invalid(format!("condition on undeclared parameter '{name}'")).into());
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for def in &self.parameters {
            if !seen.insert(def.name.as_str()) {
                return Err(invalid(format!("duplicate parameter '{}'", def.name)).into());
            }
            match &def.kind {
                ParamKind::Float { low, high } => {
                    if !low.is_finite() || !high.is_finite() || low > high {
                        return Err(invalid(format!(
                            "'{}' has invalid bounds [{low}, {high}]",
                            def.name
                        ))
                        .into());
                    }
                }
                ParamKind::Int { low, high } => {
                    if low > high {
                        return Err(invalid(format!(
                            "'{}' has invalid bounds [{low}, {high}]",
                            def.name
                        ))
                        .into());
                    }
                }
                ParamKind::Categorical { levels } => {
                    if levels.is_empty() {
                        return Err(invalid(format!("'{}' has no levels", def.name)).into());
                    }
                }
                ParamKind::Bool => {}
            }
            if let Some(cond) = &def.depends {
                // Parents must come first so samplers can resolve conditions in order.
                if cond.on == def.name || !seen.contains(cond.on.as_str()) {
                    return Err(invalid(format!(
                        "'{}' depends on '{}', which is not declared before it",
                        def.name, cond.on
                    ))
                    .into());
                }
            }
        }

        if self.is_features() && self.has_dependencies() {
            return Err(invalid("feature spaces cannot carry dependencies".into()).into());
        }
        Ok(())
    }

    /// Check a candidate against bounds, levels and dependencies.
    pub fn check(&self, candidate: &Candidate) -> Result<(), SearchError> {
        for name in candidate.names() {
            if self.param(name).is_none() {
                return Err(SearchError::UnknownParameter { name: name.clone() });
            }
        }

        for def in &self.parameters {
            let active = def.depends.as_ref().map_or(true, |c| c.is_met(candidate));
            match (active, candidate.get(&def.name)) {
                (true, Some(value)) => check_value(def, value)?,
                (true, None) => {
                    return Err(SearchError::InvalidCandidate {
                        message: format!("missing value for '{}'", def.name),
                    })
                }
                (false, Some(_)) => {
                    return Err(SearchError::InvalidCandidate {
                        message: format!("'{}' is set but its condition does not hold", def.name),
                    })
                }
                (false, None) => {}
            }
        }

        if self.is_features() && candidate.selected_features().is_empty() {
            return Err(SearchError::InvalidCandidate {
                message: "feature subset is empty".into(),
            });
        }
        Ok(())
    }

    /// Drop values whose condition does not hold, in declaration order.
    pub fn prune_inactive(&self, candidate: &Candidate) -> Candidate {
        let mut kept = Candidate::new();
        for def in &self.parameters {
            let active = def.depends.as_ref().map_or(true, |c| c.is_met(&kept));
            if let (true, Some(v)) = (active, candidate.get(&def.name)) {
                kept = kept.with(def.name.clone(), v.clone());
            }
        }
        kept
    }

    /// Every admissible value of a discrete dimension (`None` for floats).
    /// Integer ranges wider than [`MAX_ENUMERATION`] are a configuration
    /// error.
    pub fn discrete_values(def: &ParamDef) -> SvResult<Option<Vec<ParamValue>>> {
        let values = match &def.kind {
            ParamKind::Float { .. } => return Ok(None),
            ParamKind::Int { low, high } => {
                let count = i128::from(*high) - i128::from(*low) + 1;
                if count > MAX_ENUMERATION as i128 {
                    return Err(config_error!(
                        "'{}' spans {count} integers, more than the {MAX_ENUMERATION} that can be enumerated",
                        def.name
                    ));
                }
                (*low..=*high).map(ParamValue::Int).collect()
            }
            ParamKind::Bool => vec![ParamValue::Bool(false), ParamValue::Bool(true)],
            ParamKind::Categorical { levels } => levels
                .iter()
                .map(|l| ParamValue::Categorical(l.clone()))
                .collect(),
        };
        Ok(Some(values))
    }

    /// `resolution` evenly spaced points along a dimension. Discrete
    /// dimensions with fewer admissible values yield all of them.
    pub fn grid_values(def: &ParamDef, resolution: usize) -> SvResult<Vec<ParamValue>> {
        if resolution > MAX_ENUMERATION {
            return Err(config_error!(
                "resolution {resolution} for '{}' exceeds {MAX_ENUMERATION}",
                def.name
            ));
        }
        let steps = resolution.max(1);
        let t = |i: usize| {
            if steps == 1 {
                0.0
            } else {
                i as f64 / (steps - 1) as f64
            }
        };
        let values = match &def.kind {
            ParamKind::Float { low, high } => (0..steps)
                .map(|i| ParamValue::Float(low + t(i) * (high - low)))
                .collect(),
            ParamKind::Int { low, high } => {
                // Widened so the span of the full i64 range cannot overflow.
                let (low, high) = (i128::from(*low), i128::from(*high));
                let span = high - low;
                let mut values: Vec<i64> = (0..steps)
                    .map(|i| {
                        let offset = (t(i) * span as f64).round() as i128;
                        (low + offset).clamp(low, high) as i64
                    })
                    .collect();
                values.dedup();
                values.into_iter().map(ParamValue::Int).collect()
            }
            ParamKind::Bool | ParamKind::Categorical { .. } => {
                Self::discrete_values(def)?.unwrap_or_default()
            }
        };
        Ok(values)
    }
}

fn check_value(def: &ParamDef, value: &ParamValue) -> Result<(), SearchError> {
    let out_of_range = |detail: String| SearchError::InvalidCandidate {
        message: format!("'{}' {detail}", def.name),
    };
    match (&def.kind, value) {
        (ParamKind::Float { low, high }, ParamValue::Float(v)) => {
            if !v.is_finite() || v < low || v > high {
                return Err(out_of_range(format!("= {v} outside [{low}, {high}]")));
            }
        }
        (ParamKind::Int { low, high }, ParamValue::Int(v)) => {
            if v < low || v > high {
                return Err(out_of_range(format!("= {v} outside [{low}, {high}]")));
            }
        }
        (ParamKind::Bool, ParamValue::Bool(_)) => {}
        (ParamKind::Categorical { levels }, ParamValue::Categorical(v)) => {
            if !levels.contains(v) {
                return Err(out_of_range(format!("= '{v}' is not one of {levels:?}")));
            }
        }
        (_, other) => {
            return Err(out_of_range(format!(
                "has a {} value that does not match its kind",
                other.type_name()
            )))
        }
    }
    Ok(())
}
