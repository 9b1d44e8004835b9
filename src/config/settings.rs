//! Configuration settings for the guess-and-determine solver

use crate::sat::SolverOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub problem: ProblemConfig,
    pub solver: SolverConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemConfig {
    /// Relation file describing variables, relations and known/target sets
    pub relation_file: PathBuf,
    /// Maximum number of guessed variables; `None` means unconstrained
    pub max_guess: Option<usize>,
    /// Number of propagation rounds
    pub max_steps: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    pub backend: SolverBackend,
    /// Minimize the number of guesses instead of accepting any feasible set
    pub optimize: bool,
    pub timeout_seconds: Option<u64>,
    pub threads: Option<usize>,
    pub random_seed: Option<u64>,
    #[serde(default = "default_minizinc_executable")]
    pub minizinc_executable: String,
}

/// Supported solver backends.
///
/// `Cadical` runs in-process on the structured model; every other tag is a
/// MiniZinc solver id driven through the `minizinc` executable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SolverBackend {
    Cadical,
    Gecode,
    #[serde(alias = "cp")]
    CpSat,
    #[serde(alias = "coinbc")]
    Cbc,
    Highs,
    #[serde(alias = "mip")]
    Scip,
    Gurobi,
    Xpress,
}

/// Optional features a backend can accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    pub supports_seed: bool,
    pub supports_parallelism: bool,
}

impl SolverBackend {
    pub const ALL: [SolverBackend; 8] = [
        SolverBackend::Cadical,
        SolverBackend::Gecode,
        SolverBackend::CpSat,
        SolverBackend::Cbc,
        SolverBackend::Highs,
        SolverBackend::Scip,
        SolverBackend::Gurobi,
        SolverBackend::Xpress,
    ];

    /// Canonical tag, also the solver id handed to MiniZinc
    pub fn tag(self) -> &'static str {
        match self {
            SolverBackend::Cadical => "cadical",
            SolverBackend::Gecode => "gecode",
            SolverBackend::CpSat => "cp-sat",
            SolverBackend::Cbc => "cbc",
            SolverBackend::Highs => "highs",
            SolverBackend::Scip => "scip",
            SolverBackend::Gurobi => "gurobi",
            SolverBackend::Xpress => "xpress",
        }
    }

    pub fn capabilities(self) -> BackendCapabilities {
        let (supports_seed, supports_parallelism) = match self {
            SolverBackend::Cadical => (false, false),
            SolverBackend::Gecode => (true, true),
            SolverBackend::CpSat => (true, true),
            SolverBackend::Cbc => (false, true),
            SolverBackend::Highs => (false, true),
            SolverBackend::Scip => (true, true),
            SolverBackend::Gurobi => (true, true),
            SolverBackend::Xpress => (false, true),
        };
        BackendCapabilities {
            supports_seed,
            supports_parallelism,
        }
    }

    /// Whether the backend runs inside this process
    pub fn is_in_process(self) -> bool {
        matches!(self, SolverBackend::Cadical)
    }
}

impl FromStr for SolverBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cadical" => Ok(SolverBackend::Cadical),
            "gecode" => Ok(SolverBackend::Gecode),
            "cp-sat" | "cp" | "or-tools" | "com.google.ortools.sat" => Ok(SolverBackend::CpSat),
            "cbc" | "coinbc" | "coin-bc" => Ok(SolverBackend::Cbc),
            "highs" => Ok(SolverBackend::Highs),
            "scip" | "mip" => Ok(SolverBackend::Scip),
            "gurobi" => Ok(SolverBackend::Gurobi),
            "xpress" => Ok(SolverBackend::Xpress),
            other => Err(format!(
                "unsupported solver backend '{}' (supported: {})",
                other,
                SolverBackend::ALL.iter().map(|b| b.tag()).collect::<Vec<_>>().join(", ")
            )),
        }
    }
}

impl std::fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub output_directory: PathBuf,
    /// Keep the rendered model file after solving
    pub keep_artifacts: bool,
    /// Where model files are written; the system temp dir when absent
    pub artifact_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Text,
    Json,
}

fn default_minizinc_executable() -> String {
    "minizinc".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            problem: ProblemConfig {
                relation_file: PathBuf::from("input/relations/xor_chain.txt"),
                max_guess: None,
                max_steps: 5,
            },
            solver: SolverConfig {
                backend: SolverBackend::Cadical,
                optimize: true,
                timeout_seconds: None,
                threads: None,
                random_seed: None,
                minizinc_executable: default_minizinc_executable(),
            },
            output: OutputConfig {
                format: OutputFormat::Text,
                output_directory: PathBuf::from("output/solutions"),
                keep_artifacts: false,
                artifact_directory: None,
            },
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings)
    }

    /// Save settings to a YAML file
    pub fn to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize settings")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if !self.problem.relation_file.exists() {
            anyhow::bail!(
                "Relation file does not exist: {}",
                self.problem.relation_file.display()
            );
        }

        if self.solver.timeout_seconds == Some(0) {
            anyhow::bail!("Solver timeout must be positive when set");
        }

        if self.solver.threads == Some(0) {
            anyhow::bail!("Thread count must be positive when set");
        }

        if self.solver.minizinc_executable.trim().is_empty() {
            anyhow::bail!("MiniZinc executable name cannot be empty");
        }

        Ok(())
    }

    /// Merge settings with command line overrides
    pub fn merge_with_cli(&mut self, cli_overrides: &CliOverrides) {
        if let Some(ref relation_file) = cli_overrides.relation_file {
            self.problem.relation_file = relation_file.clone();
        }
        if let Some(max_guess) = cli_overrides.max_guess {
            self.problem.max_guess = Some(max_guess);
        }
        if let Some(max_steps) = cli_overrides.max_steps {
            self.problem.max_steps = max_steps;
        }
        if let Some(backend) = cli_overrides.backend {
            self.solver.backend = backend;
        }
        if let Some(timeout) = cli_overrides.timeout_seconds {
            self.solver.timeout_seconds = Some(timeout);
        }
        if let Some(threads) = cli_overrides.threads {
            self.solver.threads = Some(threads);
        }
        if let Some(seed) = cli_overrides.random_seed {
            self.solver.random_seed = Some(seed);
        }
        if cli_overrides.no_optimize {
            self.solver.optimize = false;
        }
        if let Some(ref output_dir) = cli_overrides.output_dir {
            self.output.output_directory = output_dir.clone();
        }
        if cli_overrides.keep_artifacts {
            self.output.keep_artifacts = true;
        }
    }

    /// Solver options derived from the solver section
    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            time_limit: self.solver.timeout_seconds.map(Duration::from_secs),
            threads: self.solver.threads,
            random_seed: self.solver.random_seed,
        }
    }
}

/// Command line overrides for settings
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub relation_file: Option<PathBuf>,
    pub max_guess: Option<usize>,
    pub max_steps: Option<usize>,
    pub backend: Option<SolverBackend>,
    pub timeout_seconds: Option<u64>,
    pub threads: Option<usize>,
    pub random_seed: Option<u64>,
    pub no_optimize: bool,
    pub output_dir: Option<PathBuf>,
    pub keep_artifacts: bool,
}
