//! Per-instance log handle and search events.
//!
//! Each [`SearchInstance`](crate::SearchInstance) carries its own
//! [`SearchLog`]: a verbosity threshold for the `tracing` lines the search
//! emits, plus an optional channel that receives structured
//! [`SearchEvent`]s.

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Level};
use uuid::Uuid;

/// Why the optimization loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The terminator fired.
    BudgetReached,
    /// The strategy had nothing left to propose.
    SpaceExhausted,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::BudgetReached => write!(f, "budget reached"),
            TerminationReason::SpaceExhausted => write!(f, "search space exhausted"),
        }
    }
}

/// Structured progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SearchEvent {
    BatchEvaluated {
        instance_id: Uuid,
        batch_nr: usize,
        proposed: usize,
        failed: usize,
        batch_best: Option<f64>,
        overall_best: Option<f64>,
    },
    Terminated {
        instance_id: Uuid,
        reason: TerminationReason,
        n_evals: usize,
    },
}

/// Log verbosity of a search instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Off,
    Info,
    Debug,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    fn allows(self, level: Level) -> bool {
        match self {
            LogLevel::Off => false,
            LogLevel::Info => level <= Level::INFO,
            LogLevel::Debug => level <= Level::DEBUG,
        }
    }
}

/// Logger handle injected into a search instance.
#[derive(Debug, Clone, Default)]
pub struct SearchLog {
    level: LogLevel,
    events: Option<Sender<SearchEvent>>,
}

impl SearchLog {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            events: None,
        }
    }

    pub fn silent() -> Self {
        Self::new(LogLevel::Off)
    }

    pub fn with_events(mut self, tx: Sender<SearchEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.level.allows(level)
    }

    pub(crate) fn batch(&self, event: SearchEvent) {
        if let SearchEvent::BatchEvaluated {
            instance_id,
            batch_nr,
            proposed,
            failed,
            batch_best,
            overall_best,
        } = &event
        {
            if self.enabled(Level::INFO) {
                info!(
                    instance = %instance_id,
                    batch = batch_nr,
                    proposed,
                    failed,
                    batch_best = ?batch_best,
                    best = ?overall_best,
                    "Evaluated batch {batch_nr}: {proposed} candidates"
                );
            }
        }
        self.emit(event);
    }

    pub(crate) fn terminated(&self, instance_id: Uuid, reason: TerminationReason, n_evals: usize) {
        if self.enabled(Level::INFO) {
            info!(
                instance = %instance_id,
                %reason,
                n_evals,
                "Search finished ({reason}) after {n_evals} evaluations"
            );
        }
        self.emit(SearchEvent::Terminated {
            instance_id,
            reason,
            n_evals,
        });
    }

    pub(crate) fn failure(&self, candidate: &sv_types::Candidate, error: &str) {
        if self.enabled(Level::WARN) {
            warn!(%candidate, "Evaluation failed: {error}");
        }
    }

    pub(crate) fn rejected(&self, candidate: &sv_types::Candidate, reason: &str) {
        if self.enabled(Level::WARN) {
            warn!(%candidate, "Skipping candidate: {reason}");
        }
    }

    pub(crate) fn detail(&self, message: impl AsRef<str>) {
        if self.enabled(Level::DEBUG) {
            debug!("{}", message.as_ref());
        }
    }

    fn emit(&self, event: SearchEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening any more.
            let _ = tx.send(event);
        }
    }
}
