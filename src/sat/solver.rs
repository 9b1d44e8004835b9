//! In-process solving with CaDiCaL

use super::constraints::{Cnf, ConstraintModel, Objective};
use super::variables::BoolVar;
use crate::error::GdResult;
use cadical::{Solver, Timeout};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Configuration options handed to a solver backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverOptions {
    /// Wall-clock limit; the solver reports an inconclusive result after it
    pub time_limit: Option<Duration>,
    /// Parallelism hint, forwarded only to backends that accept one
    pub threads: Option<usize>,
    /// Random seed, forwarded only to backends that accept one
    pub random_seed: Option<u64>,
}

/// Verdict of a solver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveStatus {
    /// Proven optimal assignment
    Optimal,
    /// Feasible assignment without an optimality proof
    Satisfied,
    /// Every solution was enumerated
    AllSolutions,
    /// No guess set exists for this budget and round count
    Unsatisfiable,
    /// Timeout or unknown status; not a proof of infeasibility
    Inconclusive(String),
    /// Backend failure, message forwarded verbatim
    Error(String),
}

impl SolveStatus {
    /// Whether an assignment is available
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SolveStatus::Optimal | SolveStatus::Satisfied | SolveStatus::AllSolutions
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Satisfied => "satisfied",
            SolveStatus::AllSolutions => "all solutions",
            SolveStatus::Unsatisfiable => "unsatisfiable",
            SolveStatus::Inconclusive(_) => "inconclusive",
            SolveStatus::Error(_) => "error",
        }
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Inconclusive(reason) | SolveStatus::Error(reason) => {
                write!(f, "{} ({})", self.label(), reason)
            }
            _ => f.write_str(self.label()),
        }
    }
}

/// Result of a solver call
#[derive(Debug, Clone)]
pub struct SolverOutcome {
    pub status: SolveStatus,
    /// Value of every declared boolean, present on success
    pub assignment: Option<HashMap<BoolVar, bool>>,
    /// Number of true objective variables in the reported assignment
    pub objective: Option<usize>,
    pub solve_time: Duration,
}

impl SolverOutcome {
    pub fn without_assignment(status: SolveStatus, solve_time: Duration) -> Self {
        Self {
            status,
            assignment: None,
            objective: None,
            solve_time,
        }
    }
}

/// CaDiCaL backend working on the structured model.
///
/// Minimization tightens an at-most bound on the objective after every
/// model until the solver proves no cheaper assignment exists.
pub struct CadicalSolver {
    options: SolverOptions,
}

impl CadicalSolver {
    /// Create a new solver instance
    pub fn new() -> Self {
        Self {
            options: SolverOptions::default(),
        }
    }

    /// Set solver configuration options; CaDiCaL only honours the time limit
    pub fn configure(&mut self, options: &SolverOptions) {
        self.options = options.clone();
    }

    pub fn solve(&mut self, model: &ConstraintModel) -> GdResult<SolverOutcome> {
        let start_time = Instant::now();
        let deadline = self.options.time_limit.map(|limit| start_time + limit);

        let mut cnf = model.to_cnf()?;
        let objective = model.objective_literals()?;
        let minimizing = matches!(model.objective(), Objective::Minimize(_));

        debug!(
            "CaDiCaL input: {} variables, {} clauses",
            cnf.num_vars,
            cnf.clauses.len()
        );

        let mut solver: Solver = Solver::new();
        for clause in &cnf.clauses {
            solver.add_clause(clause.literals.iter().copied());
        }

        let mut best: Option<(HashMap<BoolVar, bool>, usize)> = None;

        loop {
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(Self::timed_out(best, start_time.elapsed()));
                }
                solver.set_callbacks(Some(Timeout::new(remaining.as_secs_f32())));
            }

            match solver.solve() {
                Some(true) => {
                    let assignment = Self::extract_assignment(&solver, model);
                    let cost = objective
                        .iter()
                        .filter(|&&lit| solver.value(lit).unwrap_or(false))
                        .count();
                    debug!("CaDiCaL found an assignment with {} guesses", cost);

                    if !minimizing {
                        return Ok(SolverOutcome {
                            status: SolveStatus::Satisfied,
                            assignment: Some(assignment),
                            objective: Some(cost),
                            solve_time: start_time.elapsed(),
                        });
                    }
                    if cost == 0 {
                        return Ok(SolverOutcome {
                            status: SolveStatus::Optimal,
                            assignment: Some(assignment),
                            objective: Some(0),
                            solve_time: start_time.elapsed(),
                        });
                    }

                    // Require a strictly cheaper assignment next time
                    let mut tighter = Cnf {
                        clauses: Vec::new(),
                        num_vars: cnf.num_vars,
                    };
                    tighter.add_at_most(&objective, cost - 1);
                    cnf.num_vars = tighter.num_vars;
                    for clause in &tighter.clauses {
                        solver.add_clause(clause.literals.iter().copied());
                    }
                    best = Some((assignment, cost));
                }
                Some(false) => {
                    let solve_time = start_time.elapsed();
                    return Ok(match best {
                        Some((assignment, cost)) => SolverOutcome {
                            status: SolveStatus::Optimal,
                            assignment: Some(assignment),
                            objective: Some(cost),
                            solve_time,
                        },
                        None => SolverOutcome::without_assignment(
                            SolveStatus::Unsatisfiable,
                            solve_time,
                        ),
                    });
                }
                None => return Ok(Self::timed_out(best, start_time.elapsed())),
            }
        }
    }

    fn timed_out(best: Option<(HashMap<BoolVar, bool>, usize)>, solve_time: Duration) -> SolverOutcome {
        match best {
            Some((assignment, cost)) => SolverOutcome {
                status: SolveStatus::Satisfied,
                assignment: Some(assignment),
                objective: Some(cost),
                solve_time,
            },
            None => SolverOutcome::without_assignment(
                SolveStatus::Inconclusive("time limit reached".to_string()),
                solve_time,
            ),
        }
    }

    /// Unassigned variables are reported as false
    fn extract_assignment(solver: &Solver, model: &ConstraintModel) -> HashMap<BoolVar, bool> {
        model
            .registry()
            .iter()
            .map(|(var, id)| (*var, solver.value(id).unwrap_or(false)))
            .collect()
    }
}

impl Default for CadicalSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SolverOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solver Outcome:")?;
        writeln!(f, "  Status: {}", self.status)?;
        if let Some(objective) = self.objective {
            writeln!(f, "  Guesses: {}", objective)?;
        }
        if let Some(assignment) = &self.assignment {
            writeln!(f, "  Booleans assigned: {}", assignment.len())?;
        }
        writeln!(f, "  Solve time: {:.3}s", self.solve_time.as_secs_f64())?;
        Ok(())
    }
}
