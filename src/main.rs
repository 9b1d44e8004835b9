//! Main CLI application for the guess-and-determine solver

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use guess_determine::{
    config::{CliOverrides, Settings, SolverBackend},
    gd::{GdOutcome, GdProblem},
    relations::create_example_relation_files,
    utils::{ColorOutput, SolutionFormatter},
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "guess_determine")]
#[command(about = "Guess-and-Determine solver for relation systems")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that loads a problem
#[derive(Args, Debug)]
struct ProblemArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.yaml")]
    config: PathBuf,

    /// Relation file (overrides config)
    #[arg(short, long)]
    relations: Option<PathBuf>,

    /// Maximum number of guessed variables (overrides config)
    #[arg(short = 'g', long)]
    max_guess: Option<usize>,

    /// Number of propagation rounds (overrides config)
    #[arg(short = 's', long)]
    max_steps: Option<usize>,

    /// Solver backend (overrides config)
    #[arg(short, long)]
    backend: Option<SolverBackend>,

    /// Solver time limit in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Parallelism hint for backends that accept it
    #[arg(long)]
    threads: Option<usize>,

    /// Random seed for backends that accept it
    #[arg(long)]
    seed: Option<u64>,

    /// Accept any feasible guess set instead of minimizing
    #[arg(long)]
    no_optimize: bool,

    /// Output directory (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep the rendered model file after solving
    #[arg(long)]
    keep_artifacts: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl ProblemArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            relation_file: self.relations.clone(),
            max_guess: self.max_guess,
            max_steps: self.max_steps,
            backend: self.backend,
            timeout_seconds: self.timeout,
            threads: self.threads,
            random_seed: self.seed,
            no_optimize: self.no_optimize,
            output_dir: self.output.clone(),
            keep_artifacts: self.keep_artifacts,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Find a minimal guess set and its determination path
    Solve {
        #[command(flatten)]
        args: ProblemArgs,

        /// Print the full determination graph and path
        #[arg(long)]
        show_path: bool,
    },

    /// Render the constraint model without solving
    Model {
        #[command(flatten)]
        args: ProblemArgs,

        /// Write the model to this file instead of stdout
        #[arg(long)]
        write: Option<PathBuf>,
    },

    /// Analyze a relation system and the model size it produces
    Analyze {
        #[command(flatten)]
        args: ProblemArgs,
    },

    /// Create example configuration and relation files
    Setup {
        /// Directory to create files in
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,

        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Commands::Solve { args, .. } | Commands::Model { args, .. } | Commands::Analyze { args } => {
            args.verbose
        }
        Commands::Setup { .. } => false,
    };
    init_logging(verbose);

    match cli.command {
        Commands::Solve { args, show_path } => solve_command(&args, show_path),
        Commands::Model { args, write } => model_command(&args, write),
        Commands::Analyze { args } => analyze_command(&args),
        Commands::Setup { directory, force } => setup_command(directory, force),
    }
}

/// Log to stderr; `RUST_LOG` wins over the verbosity flag
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Layer the config file, CLI overrides and validation; notes go to stderr
fn load_settings(args: &ProblemArgs) -> Result<Settings> {
    let mut settings = if args.config.exists() {
        Settings::from_file(&args.config)
            .with_context(|| format!("Failed to load config from {}", args.config.display()))?
    } else {
        eprintln!(
            "{}",
            ColorOutput::warning(&format!(
                "Config file {} not found, using defaults",
                args.config.display()
            ))
        );
        Settings::default()
    };

    settings.merge_with_cli(&args.overrides());
    settings.validate().context("Configuration validation failed")?;

    if args.verbose {
        eprintln!("Configuration:");
        eprintln!("  Relation file: {}", settings.problem.relation_file.display());
        match settings.problem.max_guess {
            Some(max_guess) => eprintln!("  Max guess: {}", max_guess),
            None => eprintln!("  Max guess: unconstrained"),
        }
        eprintln!("  Max steps: {}", settings.problem.max_steps);
        eprintln!("  Backend: {}", settings.solver.backend);
        eprintln!("  Optimize: {}", settings.solver.optimize);
        eprintln!("  Output dir: {}", settings.output.output_directory.display());
        eprintln!();
    }

    Ok(settings)
}

fn solve_command(args: &ProblemArgs, show_path: bool) -> Result<()> {
    println!("{}", ColorOutput::info("Starting guess-and-determine solver"));

    let settings = load_settings(args)?;
    let start_time = Instant::now();
    let mut problem = GdProblem::new(settings.clone()).context("Failed to create problem")?;

    if args.verbose {
        println!("{}", problem.analyze());
        println!();
    }

    let outcome = problem.solve().context("Failed to solve problem")?;
    let total_time = start_time.elapsed();

    let solution = match outcome {
        GdOutcome::Solved(solution) => solution,
        GdOutcome::Unsatisfiable {
            guess_budget,
            max_steps,
        } => {
            println!(
                "{}",
                ColorOutput::warning(&format!(
                    "No guess set of at most {} variables determines every target within {} rounds",
                    guess_budget, max_steps
                ))
            );
            println!("Increase --max-guess or --max-steps and retry.");
            return Ok(());
        }
        GdOutcome::Inconclusive { reason } => {
            println!(
                "{}",
                ColorOutput::warning(&format!("Solver was inconclusive: {}", reason))
            );
            return Ok(());
        }
    };

    println!(
        "{}",
        ColorOutput::success(&format!(
            "Found a guess set of size {} in {:.3}s",
            solution.guess_count(),
            total_time.as_secs_f64()
        ))
    );
    println!("{}", solution.summary());
    println!();
    println!("{}", SolutionFormatter::format_solution(&solution, show_path));

    let path = SolutionFormatter::save_solution(
        &solution,
        &settings.output.output_directory,
        &settings.output.format,
    )
    .context("Failed to save solution")?;
    println!(
        "{}",
        ColorOutput::success(&format!("Solution saved to {}", path.display()))
    );

    if args.verbose {
        println!("\n{}", problem.encoding_statistics()?);
    }

    Ok(())
}

fn model_command(args: &ProblemArgs, write: Option<PathBuf>) -> Result<()> {
    let settings = load_settings(args)?;
    let problem = GdProblem::new(settings).context("Failed to create problem")?;
    let text = problem.render_model()?;

    match write {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
            std::fs::write(&path, &text)
                .with_context(|| format!("Failed to write model to {}", path.display()))?;
            println!(
                "{}",
                ColorOutput::success(&format!("Model written to {}", path.display()))
            );
        }
        None => print!("{}", text),
    }

    if args.verbose {
        eprintln!("{}", problem.encoding_statistics()?);
    }

    Ok(())
}

fn analyze_command(args: &ProblemArgs) -> Result<()> {
    println!("{}", ColorOutput::info("Analyzing relation system..."));

    let settings = load_settings(args)?;
    let problem = GdProblem::new(settings).context("Failed to create problem for analysis")?;

    println!("{}", problem.analyze());
    println!();
    println!("{}", problem.encoding_statistics()?);

    Ok(())
}

fn setup_command(directory: PathBuf, force: bool) -> Result<()> {
    println!("{}", ColorOutput::info("Setting up project structure..."));

    let config_dir = directory.join("config");
    let input_dir = directory.join("input/relations");
    let output_dir = directory.join("output/solutions");

    for dir in [&config_dir, &input_dir, &output_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let config_path = config_dir.join("default.yaml");
    write_settings(&config_path, &Settings::default(), force)?;

    create_example_relation_files(&input_dir).context("Failed to create example relation files")?;
    println!("Created example relation files in: {}", input_dir.display());

    let examples_dir = config_dir.join("presets");
    std::fs::create_dir_all(&examples_dir)?;

    // Small instance, solved in-process
    let mut triangle = Settings::default();
    triangle.problem.relation_file = PathBuf::from("input/relations/triangle.txt");
    triangle.problem.max_steps = 1;
    write_settings(&examples_dir.join("triangle.yaml"), &triangle, force)?;

    // Same chain through a MiniZinc backend
    let mut external = Settings::default();
    external.solver.backend = SolverBackend::Gecode;
    external.solver.timeout_seconds = Some(60);
    write_settings(&examples_dir.join("gecode.yaml"), &external, force)?;

    println!("\n{}", ColorOutput::success("Setup complete!"));
    println!("\nNext steps:");
    println!("1. Edit configuration files in {}", config_dir.display());
    println!("2. Add your relation files to {}", input_dir.display());
    println!("3. Run: guess_determine solve --config config/default.yaml");

    Ok(())
}

fn write_settings(path: &Path, settings: &Settings, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Skipped: {} (already exists)", path.display());
        return Ok(());
    }
    settings
        .to_file(&path.to_path_buf())
        .with_context(|| format!("Failed to create configuration {}", path.display()))?;
    println!("Created: {}", path.display());
    Ok(())
}
