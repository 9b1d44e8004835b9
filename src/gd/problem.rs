//! Guess-and-determine problem definition and solve pipeline

use super::context::RunContext;
use super::decoder::{RoundStates, SolutionDecoder};
use super::solution::{DeterminedVariable, GdSolution};
use crate::config::Settings;
use crate::error::{GdError, GdResult};
use crate::relations::{load_relation_file, DeductionRules, IndexedModel, RelationModel};
use crate::sat::{
    EncodedModel, EncodingEstimate, EncodingParams, EncodingStatistics, SolveStatus,
    TimeExpansionEncoder, UnifiedSolver,
};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Result of one solve call
#[derive(Debug, Clone)]
pub enum GdOutcome {
    Solved(GdSolution),
    /// No guess set exists within these budgets; raise either one and retry
    Unsatisfiable { guess_budget: usize, max_steps: usize },
    /// Timeout or unknown verdict; says nothing about feasibility
    Inconclusive { reason: String },
}

impl GdOutcome {
    pub fn solution(&self) -> Option<&GdSolution> {
        match self {
            GdOutcome::Solved(solution) => Some(solution),
            _ => None,
        }
    }
}

/// Represents a guess-and-determine problem
pub struct GdProblem {
    settings: Settings,
    relations: RelationModel,
    indexed: IndexedModel,
    rules: DeductionRules,
    context: RunContext,
}

impl GdProblem {
    /// Create a new problem from settings, loading the relation file
    pub fn new(settings: Settings) -> Result<Self> {
        let relations = load_relation_file(&settings.problem.relation_file)
            .context("Failed to load relation file")?;
        Self::with_relations(settings, relations)
    }

    /// Create a problem with an explicit relation model (useful for testing)
    pub fn with_relations(settings: Settings, relations: RelationModel) -> Result<Self> {
        let indexed = relations
            .index()
            .with_context(|| format!("Invalid relation model '{}'", relations.problem_name))?;
        let rules = DeductionRules::build(&indexed);
        let context = RunContext::new(
            settings.output.artifact_directory.clone(),
            settings.output.keep_artifacts,
        );

        Ok(Self {
            settings,
            relations,
            indexed,
            rules,
            context,
        })
    }

    /// Replace the run context
    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }

    pub fn params(&self) -> EncodingParams {
        EncodingParams {
            max_guess: self.settings.problem.max_guess,
            max_steps: self.settings.problem.max_steps,
            optimize: self.settings.solver.optimize,
        }
    }

    /// Build the time-expanded constraint model
    pub fn encode(&self) -> GdResult<EncodedModel> {
        TimeExpansionEncoder::new(&self.indexed, &self.rules, self.params()).encode()
    }

    /// Render the model text handed to external solvers
    pub fn render_model(&self) -> Result<String> {
        let encoded = self.encode().context("Failed to encode problem")?;
        Ok(encoded.render())
    }

    /// Size of the encoded model for the configured budgets
    pub fn encoding_statistics(&self) -> Result<EncodingStatistics> {
        let encoder = TimeExpansionEncoder::new(&self.indexed, &self.rules, self.params());
        let encoded = encoder.encode().context("Failed to encode problem")?;
        Ok(encoder.statistics(&encoded))
    }

    /// Encode, solve and decode
    pub fn solve(&mut self) -> Result<GdOutcome> {
        let encoded = self.encode().context("Failed to encode problem")?;
        let backend = self.settings.solver.backend;

        info!(
            "Generated model for {}: {} booleans, {} constraints",
            self.indexed.problem_name(),
            encoded.model.registry().len(),
            encoded.model.constraints().len()
        );

        let mut solver = UnifiedSolver::new(backend, &self.settings.solver.minizinc_executable);
        solver.configure(&self.settings.solver_options());

        let artifact = if solver.needs_model_file() || self.context.keep_artifacts {
            Some(
                self.context
                    .write_model(&encoded.render(), encoded.guess_budget, encoded.max_steps)
                    .context("Failed to write model file")?,
            )
        } else {
            None
        };
        let model_path = match &artifact {
            Some(artifact) => artifact.path().to_path_buf(),
            None => self
                .context
                .artifact_path(encoded.guess_budget, encoded.max_steps),
        };

        info!(
            "Solving with {} (max_guess = {}, max_steps = {})",
            backend, encoded.guess_budget, encoded.max_steps
        );
        let outcome = match solver.solve(&encoded.model, &model_path) {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(artifact) = artifact {
                    artifact.retain();
                }
                return Err(e).context("Solver invocation failed");
            }
        };
        info!(
            "Solver finished: {} in {:.3}s",
            outcome.status,
            outcome.solve_time.as_secs_f64()
        );

        if let SolveStatus::Error(message) = &outcome.status {
            if let Some(artifact) = artifact {
                artifact.retain();
            }
            return Err(GdError::Solver(message.clone()).into());
        }
        if let Some(artifact) = artifact {
            artifact.finish().context("Failed to remove model file")?;
        }

        match outcome.status {
            SolveStatus::Unsatisfiable => {
                info!(
                    "No guess set within {} guesses and {} rounds; increase either budget",
                    encoded.guess_budget, encoded.max_steps
                );
                Ok(GdOutcome::Unsatisfiable {
                    guess_budget: encoded.guess_budget,
                    max_steps: encoded.max_steps,
                })
            }
            SolveStatus::Inconclusive(reason) => {
                warn!("Solver was inconclusive: {}", reason);
                Ok(GdOutcome::Inconclusive { reason })
            }
            status => {
                let assignment = outcome.assignment.ok_or_else(|| {
                    GdError::Encoding(format!("solver reported {} without an assignment", status))
                })?;
                let states = RoundStates::from_assignment(
                    &assignment,
                    self.indexed.num_variables(),
                    encoded.max_steps,
                )?;
                let decoded = SolutionDecoder::new(&self.indexed, &self.rules)
                    .decode(&states, encoded.guess_budget)?;

                let determined = decoded
                    .first_known
                    .iter()
                    .map(|&(v, round)| DeterminedVariable {
                        variable: self.indexed.name(v).to_string(),
                        round,
                    })
                    .collect();

                Ok(GdOutcome::Solved(GdSolution::new(
                    self.indexed.problem_name().to_string(),
                    status.label().to_string(),
                    encoded.guess_budget,
                    encoded.max_steps,
                    self.indexed.names(&decoded.guessed),
                    self.indexed.names(self.indexed.known()),
                    self.indexed.names(self.indexed.targets()),
                    decoded.graph,
                    determined,
                    outcome.solve_time,
                    self.context.run_id.clone(),
                    backend.to_string(),
                )))
            }
        }
    }

    /// Instance statistics and the predicted model size
    pub fn analyze(&self) -> ProblemAnalysis {
        ProblemAnalysis {
            problem_name: self.indexed.problem_name().to_string(),
            variables: self.indexed.num_variables(),
            symmetric_relations: self.relations.symmetric_count(),
            implication_relations: self.relations.implication_count(),
            known: self.indexed.known().len(),
            targets: self.indexed.targets().len(),
            not_guessed: self.indexed.not_guessed().len(),
            free: self.indexed.free_variables().len(),
            alternatives: self.rules.total_alternatives(),
            estimate: EncodingEstimate::new(&self.rules, self.settings.problem.max_steps),
        }
    }

    /// Get the problem settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn indexed(&self) -> &IndexedModel {
        &self.indexed
    }

    pub fn rules(&self) -> &DeductionRules {
        &self.rules
    }
}

/// Statistics about a problem instance
#[derive(Debug, Clone)]
pub struct ProblemAnalysis {
    pub problem_name: String,
    pub variables: usize,
    pub symmetric_relations: usize,
    pub implication_relations: usize,
    pub known: usize,
    pub targets: usize,
    pub not_guessed: usize,
    pub free: usize,
    pub alternatives: usize,
    pub estimate: EncodingEstimate,
}

impl std::fmt::Display for ProblemAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Problem Analysis for {}:", self.problem_name)?;
        writeln!(f, "  Variables: {}", self.variables)?;
        writeln!(f, "  Symmetric relations: {}", self.symmetric_relations)?;
        writeln!(f, "  Implication relations: {}", self.implication_relations)?;
        writeln!(f, "  Known: {}", self.known)?;
        writeln!(f, "  Targets: {}", self.targets)?;
        writeln!(f, "  Not guessed: {}", self.not_guessed)?;
        writeln!(f, "  Free at round 0: {}", self.free)?;
        writeln!(f, "  Deduction alternatives: {}", self.alternatives)?;
        write!(f, "{}", self.estimate)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverBackend;
    use crate::relations::parse_relation_text;
    use crate::sat::CadicalSolver;
    use tempfile::tempdir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn settings(max_guess: Option<usize>, max_steps: usize, optimize: bool) -> Settings {
        let mut settings = Settings::default();
        settings.problem.max_guess = max_guess;
        settings.problem.max_steps = max_steps;
        settings.solver.optimize = optimize;
        settings
    }

    fn triangle(not_guessed: &[&str]) -> RelationModel {
        RelationModel::from_parts(
            "triangle",
            names(&["a", "b", "c"]),
            names(&["a"]),
            names(&["b"]),
            names(not_guessed),
            vec![names(&["a", "b", "c"])],
            vec![],
        )
    }

    fn chain() -> RelationModel {
        parse_relation_text(
            "connection relations\na, b\nb, c\nc, d\nknown\na\ntarget\nd\nend\n",
            "chain",
        )
        .unwrap()
    }

    fn solve(relations: RelationModel, settings: Settings) -> GdOutcome {
        GdProblem::with_relations(settings, relations)
            .unwrap()
            .solve()
            .unwrap()
    }

    #[test]
    fn test_two_of_three_needs_a_guess() {
        let outcome = solve(triangle(&[]), settings(Some(0), 1, true));
        assert!(matches!(
            outcome,
            GdOutcome::Unsatisfiable {
                guess_budget: 0,
                max_steps: 1
            }
        ));
    }

    #[test]
    fn test_guessing_c_determines_b() {
        let outcome = solve(triangle(&["b"]), settings(Some(1), 1, true));
        let solution = outcome.solution().unwrap();

        assert_eq!(solution.status, "optimal");
        assert_eq!(solution.guessed, vec!["c"]);
        assert_eq!(solution.round_of("b"), Some(1));
        assert!(solution.format_path().contains("round 1: b <= {a, c} via relation 0"));
    }

    #[test]
    fn test_optimal_guess_count_without_exclusions() {
        let outcome = solve(triangle(&[]), settings(None, 1, true));
        let solution = outcome.solution().unwrap();
        assert_eq!(solution.guess_count(), 1);
        assert_eq!(solution.guess_budget, 2);
    }

    #[test]
    fn test_implication_directionality() {
        let forward = RelationModel::from_parts(
            "forward",
            names(&["x", "y", "z"]),
            names(&["x", "y"]),
            names(&["z"]),
            names(&["z"]),
            vec![],
            vec![names(&["x", "y", "z"])],
        );
        let outcome = solve(forward, settings(Some(0), 1, true));
        let solution = outcome.solution().unwrap();
        assert_eq!(solution.guess_count(), 0);
        assert_eq!(solution.round_of("z"), Some(1));

        let backward = RelationModel::from_parts(
            "backward",
            names(&["x", "y", "z"]),
            names(&["z"]),
            names(&["x"]),
            names(&["x", "y"]),
            vec![],
            vec![names(&["x", "y", "z"])],
        );
        let outcome = solve(backward, settings(None, 3, true));
        assert!(matches!(outcome, GdOutcome::Unsatisfiable { .. }));
    }

    #[test]
    fn test_round_budget_is_a_resource_limit() {
        let solved = solve(chain(), settings(Some(0), 3, true));
        assert_eq!(solved.solution().unwrap().round_of("d"), Some(3));

        let short = solve(chain(), settings(Some(0), 2, true));
        assert!(matches!(short, GdOutcome::Unsatisfiable { max_steps: 2, .. }));

        let restored = solve(chain(), settings(Some(0), 3, true));
        assert!(restored.solution().is_some());
    }

    #[test]
    fn test_satisfy_mode() {
        let outcome = solve(triangle(&["b"]), settings(Some(1), 2, false));
        let solution = outcome.solution().unwrap();
        assert_eq!(solution.status, "satisfied");
        assert!(solution.guess_count() <= 1);
    }

    #[test]
    fn test_exhausted_time_limit_is_inconclusive() {
        let mut settings = settings(Some(1), 2, true);
        settings.solver.timeout_seconds = Some(0);

        let outcome = solve(triangle(&["b"]), settings);
        match &outcome {
            GdOutcome::Inconclusive { reason } => assert!(reason.contains("time limit")),
            other => panic!("expected an inconclusive outcome, got {:?}", other),
        }
        assert!(outcome.solution().is_none());
    }

    #[test]
    fn test_assignments_are_monotone_and_within_budget() {
        let relations = parse_relation_text(
            "algebraic relations\ns1 + s0 + k1\ns2 + s1 + k2\ns3 + s2 + k3\nknown\ns0, s3\ntarget\nk1, k2, k3\nend\n",
            "xor",
        )
        .unwrap();

        for (max_guess, optimize) in [(Some(2), true), (Some(3), false), (None, false)] {
            let problem =
                GdProblem::with_relations(settings(max_guess, 3, optimize), relations.clone())
                    .unwrap();
            let encoded = problem.encode().unwrap();
            let outcome = CadicalSolver::new().solve(&encoded.model).unwrap();
            assert!(outcome.status.is_success());

            let states = RoundStates::from_assignment(
                &outcome.assignment.unwrap(),
                problem.indexed().num_variables(),
                3,
            )
            .unwrap();
            for v in 0..problem.indexed().num_variables() {
                for t in 0..3 {
                    assert!(!states.is_known(v, t) || states.is_known(v, t + 1));
                }
            }

            let guesses = (0..problem.indexed().num_variables())
                .filter(|&v| states.is_known(v, 0) && !problem.indexed().is_known(v))
                .count();
            assert!(guesses <= encoded.guess_budget);

            let decoded = SolutionDecoder::new(problem.indexed(), problem.rules())
                .decode(&states, encoded.guess_budget)
                .unwrap();
            for &(v, round) in &decoded.first_known {
                let target = crate::gd::Vertex::new(problem.indexed().name(v), round);
                assert!(decoded.graph.incoming(&target).count() > 0);
            }
        }
    }

    #[test]
    fn test_render_is_idempotent() {
        let problem = GdProblem::with_relations(settings(Some(1), 2, true), chain()).unwrap();
        let first = problem.render_model().unwrap();
        let second = problem.render_model().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.matches("solve minimize").count(), 1);
    }

    #[test]
    fn test_invalid_relations_rejected_before_solving() {
        let mut relations = triangle(&[]);
        relations.not_guessed.push("a".to_string());
        let err = GdProblem::with_relations(settings(None, 1, true), relations)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<GdError>(),
            Some(GdError::InvalidRelation(_))
        ));
    }

    #[test]
    fn test_kept_artifact_is_named_per_run() {
        let temp_dir = tempdir().unwrap();
        let mut settings = settings(Some(1), 1, true);
        settings.output.keep_artifacts = true;

        let context = RunContext::with_run_id("fixed", Some(temp_dir.path().to_path_buf()), true);
        let mut problem = GdProblem::with_relations(settings, triangle(&["b"]))
            .unwrap()
            .with_context(context);
        assert!(problem.solve().unwrap().solution().is_some());

        let path = temp_dir.path().join("gdmodel_mg1_ms1_fixed.mzn");
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("% guess-and-determine model for triangle"));
    }

    #[test]
    fn test_external_backend_failure_keeps_model() {
        let temp_dir = tempdir().unwrap();
        let mut settings = settings(Some(1), 1, true);
        settings.solver.backend = SolverBackend::Gecode;
        settings.solver.minizinc_executable = "no-such-minizinc-binary".to_string();
        settings.output.artifact_directory = Some(temp_dir.path().to_path_buf());

        let mut problem = GdProblem::with_relations(settings, triangle(&[])).unwrap();
        let err = problem.solve().unwrap_err();
        assert!(err.to_string().contains("Solver invocation failed"));

        let retained = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(retained, 1);
    }

    #[test]
    fn test_analysis() {
        let problem = GdProblem::with_relations(settings(None, 2, true), chain()).unwrap();
        let analysis = problem.analyze();
        assert_eq!(analysis.variables, 4);
        assert_eq!(analysis.symmetric_relations, 3);
        assert_eq!(analysis.free, 3);
        assert_eq!(analysis.alternatives, 10);
        assert_eq!(analysis.estimate.knowledge_variables, 12);
        assert!(analysis.to_string().contains("Free at round 0: 3"));

        let stats = problem.encoding_statistics().unwrap();
        assert_eq!(stats.max_steps, 2);
        assert_eq!(stats.guess_budget, 3);
    }
}
