//! In-memory learning task: named numeric feature columns plus a target.

use std::sync::Arc;

use sv_types::{validation_error, SvResult};

/// Column-major table of features and one target column. Cloning and
/// feature subsetting share the column buffers.
#[derive(Debug, Clone)]
pub struct Task {
    id: String,
    names: Vec<String>,
    columns: Vec<Arc<Vec<f64>>>,
    target: Arc<Vec<f64>>,
}

impl Task {
    pub fn from_columns(
        id: impl Into<String>,
        columns: Vec<(String, Vec<f64>)>,
        target: Vec<f64>,
    ) -> SvResult<Self> {
        let id = id.into();
        if target.is_empty() {
            return Err(validation_error!("task '{}' has no rows", id));
        }
        let mut names = Vec::with_capacity(columns.len());
        let mut data = Vec::with_capacity(columns.len());
        for (name, values) in columns {
            if values.len() != target.len() {
                return Err(validation_error!(
                    "column '{}' has {} rows, target has {}",
                    name,
                    values.len(),
                    target.len()
                ));
            }
            if names.contains(&name) {
                return Err(validation_error!("duplicate column '{}'", name));
            }
            names.push(name);
            data.push(Arc::new(values));
        }
        Ok(Self {
            id,
            names,
            columns: data,
            target: Arc::new(target),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.target.len()
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    /// Row indices `0..n_rows`.
    pub fn row_ids(&self) -> Vec<usize> {
        (0..self.n_rows()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// Target values at `rows`.
    pub fn truth(&self, rows: &[usize]) -> Vec<f64> {
        rows.iter().map(|&r| self.target[r]).collect()
    }

    /// A task restricted to `features`, in the task's own column order.
    pub fn select<S: AsRef<str>>(&self, features: &[S]) -> SvResult<Task> {
        for f in features {
            if self.column(f.as_ref()).is_none() {
                return Err(validation_error!(
                    "task '{}' has no feature '{}'",
                    self.id,
                    f.as_ref()
                ));
            }
        }
        let keep = |name: &String| features.iter().any(|f| f.as_ref() == name);
        let (names, columns) = self
            .names
            .iter()
            .zip(&self.columns)
            .filter(|(name, _)| keep(name))
            .map(|(name, col)| (name.clone(), Arc::clone(col)))
            .unzip();
        Ok(Task {
            id: self.id.clone(),
            names,
            columns,
            target: Arc::clone(&self.target),
        })
    }
}
