//! # sv-autotune
//!
//! Learner wrappers built on Sieve's search engine.
//!
//! [`AutoSearch`] turns a learner plus a search configuration into another
//! learner: training it tunes hyperparameters or selects features on the
//! training rows before the final fit. [`resample`] evaluates any learner,
//! wrappers included, under an outer resampling, which gives nested
//! evaluation with one independent inner search per fold.

mod autosearch;
mod learner;
mod nested;
mod objective;
mod resampling;
mod task;

pub use autosearch::{AutoSearch, InnerSearch, TunedModel};
pub use learner::{Accuracy, ClassifError, Learner, Mae, Model, Mse, Scorer};
pub use nested::{resample, FoldResult, ResampleOutcome};
pub use objective::{CandidateKind, ResampleObjective, ResampleResult};
pub use resampling::{Holdout, KFold, Resampling, Split};
pub use task::Task;
