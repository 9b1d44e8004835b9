//! External solver backends driven through the MiniZinc executable

use super::constraints::{ConstraintModel, Objective};
use super::solver::{SolveStatus, SolverOptions, SolverOutcome};
use super::variables::BoolVar;
use crate::config::SolverBackend;
use crate::error::{GdError, GdResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One line of `--json-stream` output
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StreamMessage {
    Solution {
        output: SolutionOutput,
    },
    Status {
        status: String,
    },
    Error {
        #[serde(default)]
        what: String,
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct SolutionOutput {
    #[serde(default)]
    json: Option<serde_json::Map<String, Value>>,
}

/// Id newer OR-Tools installs register with MiniZinc; older ones only know `cp-sat`
const ORTOOLS_SOLVER_ID: &str = "com.google.ortools.sat";

/// Pick the `--solver` id for `backend` given the output of `minizinc --solvers`
pub fn select_solver_id(backend: SolverBackend, solvers_listing: &str) -> &'static str {
    if backend == SolverBackend::CpSat
        && solvers_listing.to_lowercase().contains(ORTOOLS_SOLVER_ID)
    {
        ORTOOLS_SOLVER_ID
    } else {
        backend.tag()
    }
}

/// Runs `minizinc --solver <tag>` on a rendered model file
pub struct MiniZincSolver {
    backend: SolverBackend,
    executable: String,
    options: SolverOptions,
}

impl MiniZincSolver {
    pub fn new(backend: SolverBackend, executable: impl Into<String>) -> Self {
        Self {
            backend,
            executable: executable.into(),
            options: SolverOptions::default(),
        }
    }

    /// Options must already be restricted to what the backend supports
    pub fn configure(&mut self, options: &SolverOptions) {
        self.options = options.clone();
    }

    pub fn command_args(&self, model_path: &Path) -> Vec<String> {
        self.command_args_for(self.backend.tag(), model_path)
    }

    fn command_args_for(&self, solver_id: &str, model_path: &Path) -> Vec<String> {
        let mut args = vec![
            "--solver".to_string(),
            solver_id.to_string(),
            "--json-stream".to_string(),
            "--output-mode".to_string(),
            "json".to_string(),
        ];
        if let Some(limit) = self.options.time_limit {
            args.push("--time-limit".to_string());
            args.push(limit.as_millis().to_string());
        }
        if let Some(threads) = self.options.threads {
            args.push("-p".to_string());
            args.push(threads.to_string());
        }
        if let Some(seed) = self.options.random_seed {
            args.push("-r".to_string());
            args.push(seed.to_string());
        }
        args.push(model_path.display().to_string());
        args
    }

    /// Only CP-SAT has more than one id; the installed solver list decides
    fn resolve_solver_id(&self) -> &'static str {
        let fallback = self.backend.tag();
        if self.backend != SolverBackend::CpSat {
            return fallback;
        }

        match Command::new(&self.executable).arg("--solvers").output() {
            Ok(output) if output.status.success() => {
                select_solver_id(self.backend, &String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                debug!(
                    "`{} --solvers` exited with {}, using '{}'",
                    self.executable, output.status, fallback
                );
                fallback
            }
            Err(e) => {
                debug!(
                    "Could not list solvers with `{}`: {}, using '{}'",
                    self.executable, e, fallback
                );
                fallback
            }
        }
    }

    /// Solve the model already rendered to `model_path`
    pub fn solve(&self, model: &ConstraintModel, model_path: &Path) -> GdResult<SolverOutcome> {
        let args = self.command_args_for(self.resolve_solver_id(), model_path);
        info!("Running {} {}", self.executable, args.join(" "));

        let start_time = Instant::now();
        let output = Command::new(&self.executable)
            .args(&args)
            .output()
            .map_err(|e| {
                GdError::Solver(format!("failed to run `{}`: {}", self.executable, e))
            })?;
        let solve_time = start_time.elapsed();

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut outcome = Self::parse_output(&stdout, model, solve_time);

        if !output.status.success() && !matches!(outcome.status, SolveStatus::Error(_)) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            outcome = SolverOutcome::without_assignment(
                SolveStatus::Error(format!(
                    "{} exited with {}: {}",
                    self.executable,
                    output.status,
                    stderr.trim()
                )),
                solve_time,
            );
        }

        Ok(outcome)
    }

    /// Interpret a JSON stream; the last reported solution wins
    pub fn parse_output(stdout: &str, model: &ConstraintModel, solve_time: Duration) -> SolverOutcome {
        let mut solution: Option<HashMap<BoolVar, bool>> = None;
        let mut status: Option<SolveStatus> = None;

        for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let message: StreamMessage = match serde_json::from_str(line) {
                Ok(message) => message,
                Err(e) => {
                    debug!("Skipping non-JSON solver output '{}': {}", line, e);
                    continue;
                }
            };

            match message {
                StreamMessage::Solution { output } => {
                    let values = output.json.unwrap_or_default();
                    solution = Some(Self::decode_values(&values, model));
                }
                StreamMessage::Status { status: text } => {
                    status = Some(Self::map_status(&text));
                }
                StreamMessage::Error { what, message } => {
                    let detail = if what.is_empty() {
                        message
                    } else {
                        format!("{}: {}", what, message)
                    };
                    status = Some(SolveStatus::Error(detail));
                }
                StreamMessage::Other => {}
            }
        }

        let status = match (status, &solution) {
            (Some(SolveStatus::Error(msg)), _) => SolveStatus::Error(msg),
            (Some(SolveStatus::Inconclusive(_)) | None, Some(_)) => SolveStatus::Satisfied,
            (Some(status), Some(_)) => status,
            (Some(status), None) if status.is_success() => {
                SolveStatus::Error(format!("solver reported {} without an assignment", status))
            }
            (Some(status), None) => status,
            (None, None) => SolveStatus::Inconclusive("no solution or status reported".to_string()),
        };

        if !status.is_success() {
            return SolverOutcome::without_assignment(status, solve_time);
        }

        let objective = match (model.objective(), &solution) {
            (Objective::Minimize(vars), Some(assignment)) => Some(
                vars.iter()
                    .filter(|&var| assignment.get(var).copied().unwrap_or(false))
                    .count(),
            ),
            _ => None,
        };

        SolverOutcome {
            status,
            assignment: solution,
            objective,
            solve_time,
        }
    }

    fn map_status(text: &str) -> SolveStatus {
        match text {
            "OPTIMAL_SOLUTION" => SolveStatus::Optimal,
            "ALL_SOLUTIONS" => SolveStatus::AllSolutions,
            "SATISFIED" => SolveStatus::Satisfied,
            "UNSATISFIABLE" | "UNSAT_OR_UNBOUNDED" => SolveStatus::Unsatisfiable,
            "ERROR" => SolveStatus::Error("solver reported an error".to_string()),
            other => SolveStatus::Inconclusive(format!("solver status {}", other)),
        }
    }

    /// Identifiers outside the registry (`_objective`, ...) are ignored
    fn decode_values(
        values: &serde_json::Map<String, Value>,
        model: &ConstraintModel,
    ) -> HashMap<BoolVar, bool> {
        values
            .iter()
            .filter_map(|(name, value)| {
                let var = model.registry().lookup(name)?;
                let value = match value {
                    Value::Bool(b) => *b,
                    Value::Number(n) => n.as_i64()? != 0,
                    _ => return None,
                };
                Some((var, value))
            })
            .collect()
    }

    pub fn backend(&self) -> SolverBackend {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::constraints::Constraint;

    fn model() -> ConstraintModel {
        let mut model = ConstraintModel::new(2, 0);
        let a = BoolVar::known(0, 0);
        let b = BoolVar::known(1, 0);
        model.declare(a).unwrap();
        model.declare(b).unwrap();
        model
            .add(Constraint::AtMost {
                vars: vec![a, b],
                bound: 1,
            })
            .unwrap();
        model.set_objective(Objective::Minimize(vec![a, b])).unwrap();
        model
    }

    #[test]
    fn test_command_args() {
        let mut solver = MiniZincSolver::new(SolverBackend::Gecode, "minizinc");
        let path = Path::new("/tmp/model.mzn");
        assert_eq!(
            solver.command_args(path),
            vec!["--solver", "gecode", "--json-stream", "--output-mode", "json", "/tmp/model.mzn"]
        );

        solver.configure(&SolverOptions {
            time_limit: Some(Duration::from_secs(2)),
            threads: Some(4),
            random_seed: Some(9),
        });
        let args = solver.command_args(path);
        assert_eq!(&args[5..], ["--time-limit", "2000", "-p", "4", "-r", "9", "/tmp/model.mzn"]);
        assert_eq!(solver.backend(), SolverBackend::Gecode);
    }

    #[test]
    fn test_cp_sat_solver_id_follows_installed_solvers() {
        let listing = "MiniZinc driver.\nAvailable solver configurations:\n  Gecode 6.3.0 (org.gecode.gecode, default solver, cp)\n  OR Tools CP-SAT 9.8.3296 (com.google.ortools.sat, cp-sat, cp, lcg, int)\n";
        assert_eq!(select_solver_id(SolverBackend::CpSat, listing), "com.google.ortools.sat");

        let legacy = "Available solver configurations:\n  OR-Tools 9.0 (cp-sat)\n";
        assert_eq!(select_solver_id(SolverBackend::CpSat, legacy), "cp-sat");
        assert_eq!(select_solver_id(SolverBackend::Gecode, listing), "gecode");

        let solver = MiniZincSolver::new(SolverBackend::CpSat, "definitely-not-a-minizinc-binary");
        assert_eq!(solver.resolve_solver_id(), "cp-sat");
        assert_eq!(solver.command_args(Path::new("m.mzn"))[1], "cp-sat");
    }

    #[test]
    fn test_parse_optimal_stream() {
        let stdout = r#"{"type": "solution", "output": {"json": {"k0_0": true, "k1_0": false, "_objective": 1}}, "sections": ["json"]}
{"type": "solution", "output": {"json": {"k0_0": false, "k1_0": false, "_objective": 0}}, "sections": ["json"]}
{"type": "status", "status": "OPTIMAL_SOLUTION"}
"#;
        let outcome = MiniZincSolver::parse_output(stdout, &model(), Duration::ZERO);
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.objective, Some(0));
        let assignment = outcome.assignment.unwrap();
        assert_eq!(assignment.len(), 2);
        assert!(!assignment[&BoolVar::known(0, 0)]);
    }

    #[test]
    fn test_parse_solution_without_status_is_satisfied() {
        let stdout = "Warning: something\n{\"type\": \"solution\", \"output\": {\"json\": {\"k0_0\": 1, \"k1_0\": 0}}}\n";
        let outcome = MiniZincSolver::parse_output(stdout, &model(), Duration::ZERO);
        assert_eq!(outcome.status, SolveStatus::Satisfied);
        assert_eq!(outcome.objective, Some(1));
    }

    #[test]
    fn test_parse_negative_statuses() {
        let unsat = r#"{"type": "status", "status": "UNSATISFIABLE"}"#;
        let outcome = MiniZincSolver::parse_output(unsat, &model(), Duration::ZERO);
        assert_eq!(outcome.status, SolveStatus::Unsatisfiable);
        assert!(outcome.assignment.is_none());

        let unknown = r#"{"type": "status", "status": "UNKNOWN"}"#;
        let outcome = MiniZincSolver::parse_output(unknown, &model(), Duration::ZERO);
        assert!(matches!(outcome.status, SolveStatus::Inconclusive(_)));

        let empty = MiniZincSolver::parse_output("", &model(), Duration::ZERO);
        assert!(matches!(empty.status, SolveStatus::Inconclusive(_)));

        let error = r#"{"type": "error", "what": "type error", "message": "undefined identifier"}"#;
        let outcome = MiniZincSolver::parse_output(error, &model(), Duration::ZERO);
        assert_eq!(
            outcome.status,
            SolveStatus::Error("type error: undefined identifier".to_string())
        );
    }

    #[test]
    fn test_missing_executable_is_solver_error() {
        let solver = MiniZincSolver::new(SolverBackend::Highs, "definitely-not-a-minizinc-binary");
        let err = solver.solve(&model(), Path::new("missing.mzn")).unwrap_err();
        assert!(matches!(err, GdError::Solver(_)));
    }
}
