//! Display and output formatting utilities

use crate::config::OutputFormat;
use crate::gd::GdSolution;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Format solutions for display
pub struct SolutionFormatter;

impl SolutionFormatter {
    /// Format a single solution for console output
    pub fn format_solution(solution: &GdSolution, show_graph: bool) -> String {
        let mut output = String::new();

        output.push_str(&format!("=== {} ===\n", solution.problem_name));
        output.push_str(&format!("Status: {}\n", solution.status));
        output.push_str(&format!(
            "Guesses: {} (budget {})\n",
            solution.guess_count(),
            solution.guess_budget
        ));
        output.push_str(&format!("Rounds: {}\n", solution.max_steps));
        output.push_str(&format!("Solve Time: {:.3}s\n", solution.solve_time.as_secs_f64()));
        output.push_str(&format!("Run: {} ({})\n", solution.metadata.run_id, solution.metadata.backend));
        output.push('\n');

        output.push_str(&format!("Guessed: {}\n", Self::format_names(&solution.guessed)));
        output.push_str(&format!("Known: {}\n", Self::format_names(&solution.known)));
        output.push_str(&format!("Targets: {}\n", Self::format_names(&solution.targets)));
        output.push('\n');

        output.push_str(&Self::format_rounds(solution));

        if show_graph {
            output.push('\n');
            output.push_str(&Self::format_edges(solution));
            output.push('\n');
            output.push_str("Determination path:\n");
            output.push_str(&solution.format_path());
        }

        output
    }

    fn format_names(names: &[String]) -> String {
        if names.is_empty() {
            "-".to_string()
        } else {
            names.join(", ")
        }
    }

    /// Variables grouped by the round at which they became known
    pub fn format_rounds(solution: &GdSolution) -> String {
        let mut by_round: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        for name in solution.known.iter().chain(&solution.guessed) {
            by_round.entry(0).or_default().push(name);
        }
        for determined in &solution.determined {
            by_round
                .entry(determined.round)
                .or_default()
                .push(&determined.variable);
        }

        let mut output = String::new();
        output.push_str("Round | Count | Variables\n");
        output.push_str("------|-------|----------\n");
        for (round, names) in by_round {
            output.push_str(&format!("{:5} | {:5} | {}\n", round, names.len(), names.join(", ")));
        }
        output
    }

    /// Edge list with multiplicities
    pub fn format_edges(solution: &GdSolution) -> String {
        let graph = &solution.graph;
        let mut output = String::new();

        output.push_str(&format!(
            "Determination graph: {} vertices, {} edges ({} unique, {} redundant)\n",
            graph.vertex_count(),
            graph.edge_count(),
            graph.unique_edge_count(),
            graph.redundant_edge_count()
        ));
        for edge in graph.edges() {
            let relations: Vec<String> = edge.relations.iter().map(|r| r.to_string()).collect();
            output.push_str(&format!(
                "  {} -> {} [relations {}]{}\n",
                edge.source,
                edge.target,
                relations.join(", "),
                if edge.is_redundant() {
                    format!(" x{}", edge.multiplicity)
                } else {
                    String::new()
                }
            ));
        }
        output
    }

    /// Save a solution based on output format, returning the written path
    pub fn save_solution<P: AsRef<Path>>(
        solution: &GdSolution,
        output_dir: P,
        format: &OutputFormat,
    ) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

        let stem = format!(
            "{}_mg{}_ms{}",
            solution.problem_name, solution.guess_budget, solution.max_steps
        );

        let filepath = match format {
            OutputFormat::Text => {
                let filepath = output_dir.join(format!("{}.txt", stem));
                std::fs::write(&filepath, Self::format_solution(solution, true))?;
                filepath
            }
            OutputFormat::Json => {
                let filepath = output_dir.join(format!("{}.json", stem));
                solution.save_to_file(&filepath)?;
                filepath
            }
        };

        Ok(filepath)
    }
}

/// Color output utilities
pub struct ColorOutput;

impl ColorOutput {
    /// Format text with color (if terminal supports it)
    pub fn colored(text: &str, color: Color) -> String {
        if Self::supports_color() {
            format!("\x1b[{}m{}\x1b[0m", color.code(), text)
        } else {
            text.to_string()
        }
    }

    /// Check if terminal supports color
    fn supports_color() -> bool {
        std::env::var("NO_COLOR").is_err()
            && (std::env::var("TERM").unwrap_or_default() != "dumb")
    }

    /// Format success message
    pub fn success(text: &str) -> String {
        Self::colored(text, Color::Green)
    }

    /// Format warning message
    pub fn warning(text: &str) -> String {
        Self::colored(text, Color::Yellow)
    }

    /// Format info message
    pub fn info(text: &str) -> String {
        Self::colored(text, Color::Blue)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
}

impl Color {
    fn code(self) -> u8 {
        match self {
            Color::Red => 31,
            Color::Green => 32,
            Color::Yellow => 33,
            Color::Blue => 34,
        }
    }
}
