//! Boolean encoding and solver backends for guess-and-determine problems

pub mod constraints;
pub mod encoder;
pub mod minizinc_solver;
pub mod solver;
pub mod solver_factory;
pub mod variables;

pub use constraints::{Clause, Cnf, Constraint, ConstraintModel, Formula, Objective};
pub use encoder::{
    BudgetAdjustment, EncodedModel, EncodingEstimate, EncodingParams, EncodingStatistics,
    TimeExpansionEncoder,
};
pub use minizinc_solver::{select_solver_id, MiniZincSolver};
pub use solver::{CadicalSolver, SolveStatus, SolverOptions, SolverOutcome};
pub use solver_factory::UnifiedSolver;
pub use variables::{BoolVar, VariableRegistry};
