//! Configuration management for the guess-and-determine solver

pub mod settings;

pub use settings::{
    BackendCapabilities, CliOverrides, OutputConfig, OutputFormat, ProblemConfig, Settings,
    SolverBackend, SolverConfig,
};
