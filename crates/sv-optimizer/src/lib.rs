//! # sv-optimizer
//!
//! Black-box search for Sieve.
//!
//! A [`SearchInstance`] binds a search space, an objective and a
//! [`Terminator`] to an append-only [`Archive`]. Search strategies propose
//! batches of candidates, the instance evaluates and archives them, and
//! [`optimize`] loops until the budget is spent or the strategy runs dry.
//! Strategies and terminators can also be built by name through the
//! [`registry`] or from a JSON [`SearchConfig`].

pub mod archive;
pub mod config;
pub mod export;
pub mod instance;
pub mod log;
pub mod objective;
pub mod optimize;
pub mod registry;
pub mod strategy;
pub mod terminator;

pub use archive::{Archive, BestPoint, EvaluationRecord, RecordDraft, SearchResult};
pub use config::{tune, SearchConfig, StrategySpec};
pub use export::{archive_schema, to_record_batch, write_parquet};
pub use instance::{FailurePolicy, SearchInstance};
pub use log::{LogLevel, SearchEvent, SearchLog, TerminationReason};
pub use objective::{EvalOutcome, FnObjective, Objective};
pub use optimize::{optimize, Optimized};
pub use strategy::{
    DesignPoints, DesignPointsConfig, ExhaustiveSearch, ExhaustiveSearchConfig, GridSearch,
    GridSearchConfig, RandomSearch, RandomSearchConfig, RecursiveElimination, RfeConfig,
    SearchStrategy, SequentialConfig, SequentialDirection, SequentialSelection,
};
pub use terminator::{
    ClockTimeConfig, ComboConfig, EvalsConfig, ModelTimeConfig, PerfReachedConfig,
    RunTimeConfig, StagnationBatchConfig, StagnationConfig, Terminator,
};
