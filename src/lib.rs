//! Guess-and-Determine solver
//!
//! Given a set of relations between variables, a set of initially known
//! variables and a set of targets, this library finds a smallest set of
//! variables to guess so that repeated deduction through the relations makes
//! every target known within a bounded number of rounds. The search is
//! expressed as a time-expanded constraint model and handed to either an
//! in-process SAT solver or a MiniZinc backend.

pub mod config;
pub mod error;
pub mod gd;
pub mod relations;
pub mod sat;
pub mod utils;

pub use config::Settings;
pub use error::{GdError, GdResult};
pub use gd::{GdOutcome, GdProblem, GdSolution};

use anyhow::Result;

/// Main entry point for solving guess-and-determine problems
pub fn solve_gd(settings: Settings) -> Result<GdOutcome> {
    let mut problem = GdProblem::new(settings)?;
    problem.solve()
}
