//! # gbo-types
//!
//! Core types shared across the GlowBack Bayesian optimization crates:
//! search bounds, observations, run history, the objective contract and the
//! error taxonomy.

pub mod bounds;
pub mod errors;
pub mod history;
pub mod objective;
pub mod observation;

pub use bounds::{Bounds, Dimension, DimensionKind};
pub use errors::{GboError, GboResult, ObjectiveError};
pub use history::{EntryPhase, HistoryEntry, OptimizationHistory};
pub use objective::{Evaluation, FnObjective, Objective, ObjectiveDirection};
pub use observation::{Observation, ObservationSet};
