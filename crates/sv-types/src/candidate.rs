//! Parameter values and candidate configurations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A concrete parameter value produced by a search strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Categorical(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Categorical(v) => Some(v),
            _ => None,
        }
    }

    /// Short type label used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Categorical(_) => "categorical",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Categorical(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Categorical(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Categorical(v)
    }
}

/// One proposed configuration: a hyperparameter vector or, for feature
/// selection, a feature-name to inclusion-flag mapping.
///
/// Values are only readable once built; strategies construct a new
/// candidate rather than editing one in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Candidate {
    values: BTreeMap<String, ParamValue>,
}

impl Candidate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion used while a candidate is being assembled.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Feature-selection candidate: every name in `all` is present, flagged
    /// `true` iff it is in `selected`.
    pub fn from_features<S: AsRef<str>>(all: &[String], selected: &[S]) -> Self {
        let values = all
            .iter()
            .map(|name| {
                let on = selected.iter().any(|s| s.as_ref() == name);
                (name.clone(), ParamValue::Bool(on))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Names flagged `true`, in name order.
    pub fn selected_features(&self) -> Vec<String> {
        self.values
            .iter()
            .filter(|(_, v)| matches!(v, ParamValue::Bool(true)))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn into_inner(self) -> BTreeMap<String, ParamValue> {
        self.values
    }
}

impl FromIterator<(String, ParamValue)> for Candidate {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl From<BTreeMap<String, ParamValue>> for Candidate {
    fn from(values: BTreeMap<String, ParamValue>) -> Self {
        Self { values }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_display() {
        let c = Candidate::new().with("cp", 0.01).with("minsplit", 5i64);
        assert_eq!(c.len(), 2);
        assert_eq!(c.to_string(), "{cp=0.01, minsplit=5}");
        assert_eq!(c.get("minsplit").and_then(ParamValue::as_i64), Some(5));
    }

    #[test]
    fn feature_candidate_flags_every_feature() {
        let all = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let c = Candidate::from_features(&all, &["c", "a"]);
        assert_eq!(c.len(), 3);
        assert_eq!(c.get("b"), Some(&ParamValue::Bool(false)));
        assert_eq!(c.selected_features(), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn untagged_json_shape() {
        let c = Candidate::new()
            .with("kernel", "radial")
            .with("shrinking", true)
            .with("cost", 1.5);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"cost": 1.5, "kernel": "radial", "shrinking": true})
        );
        let back: Candidate = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }
}
