//! # sv-types
//!
//! Core types shared by the Sieve crates: parameter values, candidates,
//! search spaces, measures and the error hierarchy.

pub mod candidate;
pub mod errors;
pub mod measure;
pub mod space;

pub use candidate::*;
pub use errors::*;
pub use measure::*;
pub use space::*;
