//! Solution representation for guess-and-determine problems

use super::graph::{DeterminationGraph, Vertex};
use crate::relations::RelationId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A minimal guess set together with how everything else follows from it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GdSolution {
    pub problem_name: String,
    /// Solver verdict, e.g. "optimal" or "satisfied"
    pub status: String,
    /// Resolved guess budget the model was solved with
    pub guess_budget: usize,
    pub max_steps: usize,
    pub guessed: Vec<String>,
    pub known: Vec<String>,
    pub targets: Vec<String>,
    pub graph: DeterminationGraph,
    /// First round at which each non-initial variable became known
    pub determined: Vec<DeterminedVariable>,
    /// Time taken to find this solution
    #[serde(skip)]
    pub solve_time: Duration,
    pub metadata: SolutionMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminedVariable {
    pub variable: String,
    pub round: usize,
}

/// Metadata about a solution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionMetadata {
    pub run_id: String,
    pub backend: String,
    pub guess_count: usize,
    pub determined_count: usize,
    pub unique_edges: usize,
    pub redundant_edges: usize,
}

/// Summary information about a solution
#[derive(Debug, Clone)]
pub struct SolutionSummary {
    pub problem_name: String,
    pub status: String,
    pub guess_count: usize,
    pub guess_budget: usize,
    pub max_steps: usize,
    pub determined_count: usize,
    pub solve_time_ms: u64,
}

impl GdSolution {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        problem_name: String,
        status: String,
        guess_budget: usize,
        max_steps: usize,
        guessed: Vec<String>,
        known: Vec<String>,
        targets: Vec<String>,
        graph: DeterminationGraph,
        determined: Vec<DeterminedVariable>,
        solve_time: Duration,
        run_id: String,
        backend: String,
    ) -> Self {
        let metadata = SolutionMetadata {
            run_id,
            backend,
            guess_count: guessed.len(),
            determined_count: determined.len(),
            unique_edges: graph.unique_edge_count(),
            redundant_edges: graph.redundant_edge_count(),
        };

        Self {
            problem_name,
            status,
            guess_budget,
            max_steps,
            guessed,
            known,
            targets,
            graph,
            determined,
            solve_time,
            metadata,
        }
    }

    pub fn guess_count(&self) -> usize {
        self.guessed.len()
    }

    /// Round at which `variable` first became known; 0 for known and guessed
    pub fn round_of(&self, variable: &str) -> Option<usize> {
        if self.known.iter().chain(&self.guessed).any(|v| v == variable) {
            return Some(0);
        }
        self.determined
            .iter()
            .find(|d| d.variable == variable)
            .map(|d| d.round)
    }

    /// Get a summary of the solution
    pub fn summary(&self) -> SolutionSummary {
        SolutionSummary {
            problem_name: self.problem_name.clone(),
            status: self.status.clone(),
            guess_count: self.guess_count(),
            guess_budget: self.guess_budget,
            max_steps: self.max_steps,
            determined_count: self.metadata.determined_count,
            solve_time_ms: self.solve_time.as_millis() as u64,
        }
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Create from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Save to file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }

    /// Step-by-step account of every determination, round by round
    pub fn format_path(&self) -> String {
        let mut result = String::new();

        result.push_str(&format!(
            "Guessed ({}): {}\n",
            self.guessed.len(),
            self.guessed.join(", ")
        ));
        result.push_str(&format!("Known: {}\n", self.known.join(", ")));

        let mut determined = self.determined.clone();
        determined.sort_by_key(|d| d.round);

        for d in &determined {
            let target = Vertex::new(d.variable.clone(), d.round);
            let mut by_relation: BTreeMap<RelationId, Vec<String>> = BTreeMap::new();
            for edge in self.graph.incoming(&target) {
                for &rid in &edge.relations {
                    by_relation
                        .entry(rid)
                        .or_default()
                        .push(edge.source.variable.clone());
                }
            }

            for (rid, sources) in by_relation {
                result.push_str(&format!(
                    "round {}: {} <= {{{}}} via relation {}\n",
                    d.round,
                    d.variable,
                    sources.join(", "),
                    rid
                ));
            }
        }

        result
    }
}

impl std::fmt::Display for SolutionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} guesses (budget {}), {} determined within {} rounds [{}] in {}ms",
            self.problem_name,
            self.guess_count,
            self.guess_budget,
            self.determined_count,
            self.max_steps,
            self.status,
            self.solve_time_ms
        )
    }
}
