//! Guess-and-determine problem solving: run context, decoding and results

pub mod context;
pub mod decoder;
pub mod graph;
pub mod problem;
pub mod solution;

pub use context::{ModelArtifact, RunContext};
pub use decoder::{DecodedSolution, RoundStates, SolutionDecoder};
pub use graph::{DeterminationEdge, DeterminationGraph, Vertex};
pub use problem::{GdOutcome, GdProblem, ProblemAnalysis};
pub use solution::{DeterminedVariable, GdSolution, SolutionSummary};
