//! # gbo-objectives
//!
//! Objective adapters for GlowBack Bayesian optimization: closed-form
//! benchmark functions and a penalized portfolio Sharpe-ratio fitness.

mod portfolio;
mod test_functions;

pub use portfolio::{PortfolioConfig, PortfolioMetrics, SharpeObjective, WeightEncoding};
pub use test_functions::{Branin, OscillatingQuadratic};
