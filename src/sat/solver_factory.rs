//! Factory for creating solver instances based on configuration

use super::constraints::ConstraintModel;
use super::minizinc_solver::MiniZincSolver;
use super::solver::{CadicalSolver, SolverOptions, SolverOutcome};
use crate::config::{BackendCapabilities, SolverBackend};
use crate::error::GdResult;
use std::path::Path;
use tracing::debug;

/// Unified solver interface that can use different backends
pub enum UnifiedSolver {
    Cadical(CadicalSolver),
    MiniZinc(MiniZincSolver),
}

impl UnifiedSolver {
    /// Create a new solver instance based on the specified backend
    pub fn new(backend: SolverBackend, minizinc_executable: &str) -> Self {
        if backend.is_in_process() {
            UnifiedSolver::Cadical(CadicalSolver::new())
        } else {
            UnifiedSolver::MiniZinc(MiniZincSolver::new(backend, minizinc_executable))
        }
    }

    pub fn backend(&self) -> SolverBackend {
        match self {
            UnifiedSolver::Cadical(_) => SolverBackend::Cadical,
            UnifiedSolver::MiniZinc(solver) => solver.backend(),
        }
    }

    /// Set solver configuration options, dropping hints the backend cannot take
    pub fn configure(&mut self, options: &SolverOptions) {
        let options = restrict_options(options, self.backend().capabilities(), self.backend());
        match self {
            UnifiedSolver::Cadical(solver) => solver.configure(&options),
            UnifiedSolver::MiniZinc(solver) => solver.configure(&options),
        }
    }

    /// Whether the backend reads the rendered model file
    pub fn needs_model_file(&self) -> bool {
        matches!(self, UnifiedSolver::MiniZinc(_))
    }

    /// Solve the model; external backends read it from `model_path`
    pub fn solve(&mut self, model: &ConstraintModel, model_path: &Path) -> GdResult<SolverOutcome> {
        match self {
            UnifiedSolver::Cadical(solver) => solver.solve(model),
            UnifiedSolver::MiniZinc(solver) => solver.solve(model, model_path),
        }
    }
}

/// Keep only the options a backend advertises support for
pub fn restrict_options(
    options: &SolverOptions,
    capabilities: BackendCapabilities,
    backend: SolverBackend,
) -> SolverOptions {
    let mut restricted = options.clone();
    if !capabilities.supports_parallelism {
        if let Some(threads) = restricted.threads.take() {
            debug!("Backend {} ignores the parallelism hint ({} threads)", backend, threads);
        }
    }
    if !capabilities.supports_seed {
        if let Some(seed) = restricted.random_seed.take() {
            debug!("Backend {} ignores the random seed ({})", backend, seed);
        }
    }
    restricted
}
