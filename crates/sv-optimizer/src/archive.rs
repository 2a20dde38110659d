//! Append-only archive of evaluated candidates.
//!
//! The [`Archive`] is the single source of truth for a search: terminators
//! read it, strategies read it, and the best result is always recomputed
//! from it rather than cached next to it.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use sv_types::{Candidate, Codomain};

/// One evaluated candidate. Created once by [`Archive::append`] and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: Uuid,
    /// Values as proposed, in search-space terms.
    pub candidate: Candidate,
    /// Values after the search-space transformation, as evaluated.
    pub x_domain: Candidate,
    /// One score per codomain measure; `None` when evaluation failed and the
    /// failure policy keeps scores missing.
    pub scores: Vec<Option<f64>>,
    /// 1-based batch number.
    pub batch_nr: usize,
    pub train_seconds: f64,
    pub error: Option<String>,
    pub importance: Option<BTreeMap<String, f64>>,
    /// Reference to the collaborator's full resampling result.
    pub resample_ref: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// All scores, if every one of them is present and not NaN.
    pub fn complete_scores(&self) -> Option<Vec<f64>> {
        self.scores
            .iter()
            .map(|s| s.filter(|v| !v.is_nan()))
            .collect()
    }

    /// First-measure score, if usable.
    pub fn primary_score(&self) -> Option<f64> {
        self.scores.first().copied().flatten().filter(|v| !v.is_nan())
    }
}

/// A record before the archive stamps it with id, batch and time.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub candidate: Candidate,
    pub x_domain: Candidate,
    pub scores: Vec<Option<f64>>,
    pub train_seconds: f64,
    pub error: Option<String>,
    pub importance: Option<BTreeMap<String, f64>>,
    pub resample_ref: Uuid,
}

/// An optimal point derived from the archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPoint {
    pub record_id: Uuid,
    pub candidate: Candidate,
    pub x_domain: Candidate,
    pub scores: Vec<f64>,
    pub batch_nr: usize,
}

impl BestPoint {
    fn from_record(record: &EvaluationRecord, scores: Vec<f64>) -> Self {
        Self {
            record_id: record.id,
            candidate: record.candidate.clone(),
            x_domain: record.x_domain.clone(),
            scores,
            batch_nr: record.batch_nr,
        }
    }
}

/// Best-known result: a single optimum or the Pareto front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "points", rename_all = "snake_case")]
pub enum SearchResult {
    Single(BestPoint),
    Pareto(Vec<BestPoint>),
}

impl SearchResult {
    pub fn points(&self) -> &[BestPoint] {
        match self {
            SearchResult::Single(p) => std::slice::from_ref(p),
            SearchResult::Pareto(ps) => ps,
        }
    }

    /// The single optimum, or the first Pareto point in archive order.
    pub fn first(&self) -> &BestPoint {
        match self {
            SearchResult::Single(p) => p,
            SearchResult::Pareto(ps) => &ps[0],
        }
    }

    pub fn is_pareto(&self) -> bool {
        matches!(self, SearchResult::Pareto(_))
    }
}

/// Ordered, append-only log of evaluation records.
#[derive(Debug)]
pub struct Archive {
    codomain: Codomain,
    dim: usize,
    started_at: DateTime<Utc>,
    records: RwLock<Vec<Arc<EvaluationRecord>>>,
}

impl Archive {
    pub fn new(codomain: Codomain, dim: usize) -> Self {
        Self {
            codomain,
            dim,
            started_at: Utc::now(),
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn codomain(&self) -> &Codomain {
        &self.codomain
    }

    /// Dimension of the search space the archive was created for.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Append one batch. All records get the same, next batch number and
    /// become visible to readers together.
    pub fn append(&self, drafts: Vec<RecordDraft>) -> Vec<Arc<EvaluationRecord>> {
        if drafts.is_empty() {
            return Vec::new();
        }
        let mut records = self.records.write();
        let batch_nr = records.last().map_or(1, |r| r.batch_nr + 1);
        let timestamp = Utc::now();

        let added: Vec<Arc<EvaluationRecord>> = drafts
            .into_iter()
            .map(|d| {
                Arc::new(EvaluationRecord {
                    id: Uuid::new_v4(),
                    candidate: d.candidate,
                    x_domain: d.x_domain,
                    scores: d.scores,
                    batch_nr,
                    train_seconds: d.train_seconds,
                    error: d.error,
                    importance: d.importance,
                    resample_ref: d.resample_ref,
                    timestamp,
                })
            })
            .collect();
        records.extend(added.iter().cloned());
        added
    }

    /// Read-only snapshot in insertion order.
    pub fn data(&self) -> Vec<Arc<EvaluationRecord>> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn n_batch(&self) -> usize {
        self.records.read().last().map_or(0, |r| r.batch_nr)
    }

    /// Records of batch `batch_nr`.
    pub fn batch(&self, batch_nr: usize) -> Vec<Arc<EvaluationRecord>> {
        self.records
            .read()
            .iter()
            .filter(|r| r.batch_nr == batch_nr)
            .cloned()
            .collect()
    }

    pub fn n_failed(&self) -> usize {
        self.records.read().iter().filter(|r| r.is_failed()).count()
    }

    pub fn total_train_seconds(&self) -> f64 {
        self.records.read().iter().map(|r| r.train_seconds).sum()
    }

    /// Whether `candidate` has already been evaluated.
    pub fn contains(&self, candidate: &Candidate) -> bool {
        self.records
            .read()
            .iter()
            .any(|r| &r.candidate == candidate)
    }

    /// Best first-measure score among `records` (first wins ties).
    pub fn best_primary<'a>(
        &self,
        records: impl IntoIterator<Item = &'a Arc<EvaluationRecord>>,
    ) -> Option<f64> {
        let direction = self.codomain.primary().direction;
        records
            .into_iter()
            .filter_map(|r| r.primary_score())
            .fold(None, |best, s| match best {
                Some(b) if !direction.better(s, b) => Some(b),
                _ => Some(s),
            })
    }

    /// Best first-measure score over the whole archive.
    pub fn best_score(&self) -> Option<f64> {
        let records = self.records.read();
        self.best_primary(records.iter())
    }

    /// Single optimum or Pareto front; `None` until a record with complete
    /// scores exists.
    pub fn best(&self) -> Option<SearchResult> {
        let records = self.records.read();
        let scored: Vec<(&Arc<EvaluationRecord>, Vec<f64>)> = records
            .iter()
            .filter_map(|r| r.complete_scores().map(|s| (r, s)))
            .collect();

        if self.codomain.is_single() {
            let direction = self.codomain.primary().direction;
            let mut best: Option<&(&Arc<EvaluationRecord>, Vec<f64>)> = None;
            for entry in &scored {
                let improves = match best {
                    None => true,
                    Some(current) => direction.better(entry.1[0], current.1[0]),
                };
                if improves {
                    best = Some(entry);
                }
            }
            return best.map(|(r, s)| SearchResult::Single(BestPoint::from_record(r, s.clone())));
        }

        let front: Vec<BestPoint> = scored
            .iter()
            .filter(|(_, a)| {
                !scored
                    .iter()
                    .any(|(_, b)| self.codomain.dominates(b, a))
            })
            .map(|(r, s)| BestPoint::from_record(r, s.clone()))
            .collect();

        if front.is_empty() {
            None
        } else {
            Some(SearchResult::Pareto(front))
        }
    }

    /// Snapshot as pretty JSON, one object per record.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let records = self.records.read();
        let rows: Vec<&EvaluationRecord> = records.iter().map(|r| r.as_ref()).collect();
        serde_json::to_string_pretty(&rows)
    }
}
