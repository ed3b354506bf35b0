//! CFLP Solver - Command Line Interface
//!
//! Solve capacitated facility location instances, generate demo instances and
//! inspect them.

use clap::{Parser, Subcommand, ValueEnum};
use cflp_solver::config::{AcceptorConfig, SolverConfig};
use cflp_solver::generator::DemoDataBuilder;
use cflp_solver::heuristics::acceptor::{LateAcceptance, TabuSearch};
use cflp_solver::heuristics::local_search::SearchResult;
use cflp_solver::heuristics::multi_start::MultiStartSolver;
use cflp_solver::instance::FacilityLocationInstance;
use cflp_solver::report::SolutionReport;
use cflp_solver::score::ScoreCalculator;
use indicatif::{ProgressBar, ProgressStyle};

use std::fmt::Display;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "cflp-solver")]
#[command(version = "1.0")]
#[command(about = "A local search solver for the Capacitated Facility Location Problem")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance
    Solve {
        /// Path to the instance file (JSON)
        #[arg(short, long)]
        instance: PathBuf,

        /// Solver configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of independent runs, solved in parallel
        #[arg(short, long, default_value = "1")]
        runs: usize,

        /// Random seed, overrides the configuration
        #[arg(short, long)]
        seed: Option<u64>,

        /// Iteration budget, overrides the configuration
        #[arg(long)]
        max_iterations: Option<u64>,

        /// Time limit in seconds, overrides the configuration
        #[arg(short, long)]
        time_limit: Option<f64>,

        /// Acceptor with default parameters, overrides the configuration
        #[arg(short, long, value_enum)]
        acceptor: Option<AcceptorKind>,

        /// Write the solution report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the assignments as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate a random demo instance
    Generate {
        /// Output instance file (JSON)
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "60")]
        consumers: usize,

        #[arg(long, default_value = "30")]
        facilities: usize,

        /// Capacity summed over all facilities
        #[arg(long, default_value = "4500")]
        total_capacity: i64,

        /// Demand summed over all consumers
        #[arg(long, default_value = "900")]
        total_demand: i64,

        #[arg(long, default_value = "50000")]
        setup_cost: i64,

        /// Maximum deviation of a setup cost from the average
        #[arg(long, default_value = "10000")]
        setup_cost_variation: i64,

        #[arg(short, long, default_value = "0")]
        seed: u64,

        #[arg(short, long, default_value = "demo")]
        name: String,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file (JSON)
        #[arg(short, long)]
        instance: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum AcceptorKind {
    /// Hill climbing
    HillClimbing,
    /// Simulated annealing
    Sa,
    /// Tabu search
    Tabu,
    /// Late acceptance
    LateAcceptance,
}

impl AcceptorKind {
    fn config(self) -> AcceptorConfig {
        match self {
            AcceptorKind::HillClimbing => AcceptorConfig::HillClimbing,
            AcceptorKind::Sa => AcceptorConfig::default(),
            AcceptorKind::Tabu => AcceptorConfig::TabuSearch { tenure: TabuSearch::default().tenure },
            AcceptorKind::LateAcceptance => AcceptorConfig::LateAcceptance { size: LateAcceptance::default().size },
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve { instance, config, runs, seed, max_iterations, time_limit, acceptor, output, csv, verbose } => {
            let overrides = Overrides { seed, max_iterations, time_limit, acceptor };
            solve_instance(&instance, config, overrides, runs, output, csv, verbose);
        }

        Commands::Generate {
            output,
            consumers,
            facilities,
            total_capacity,
            total_demand,
            setup_cost,
            setup_cost_variation,
            seed,
            name,
        } => {
            let builder = DemoDataBuilder::new()
                .with_name(name)
                .with_counts(consumers, facilities)
                .with_totals(total_capacity, total_demand)
                .with_setup_cost(setup_cost, setup_cost_variation)
                .with_seed(seed);
            generate_instance(&builder, &output);
        }

        Commands::Analyze { instance } => {
            analyze_instance(&instance);
        }
    }
}

/// Command line values that take precedence over the configuration file.
struct Overrides {
    seed: Option<u64>,
    max_iterations: Option<u64>,
    time_limit: Option<f64>,
    acceptor: Option<AcceptorKind>,
}

impl Overrides {
    fn apply(&self, config: &mut SolverConfig) {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(n) = self.max_iterations {
            config.termination.max_iterations = Some(n);
        }
        if let Some(seconds) = self.time_limit {
            config.termination.max_seconds = Some(seconds);
            if self.max_iterations.is_none() {
                config.termination.max_iterations = None;
            }
        }
        if let Some(kind) = self.acceptor {
            config.acceptor = kind.config();
        }
    }
}

fn exit_with<E: Display>(context: &str, error: E) -> ! {
    eprintln!("{}: {}", context, error);
    std::process::exit(1);
}

fn load_instance(path: &PathBuf) -> FacilityLocationInstance {
    println!("Loading instance from {:?}...", path);
    match FacilityLocationInstance::from_file(path) {
        Ok(inst) => inst,
        Err(e) => exit_with("Error loading instance", e),
    }
}

fn solve_instance(
    path: &PathBuf,
    config_path: Option<PathBuf>,
    overrides: Overrides,
    runs: usize,
    output: Option<PathBuf>,
    csv: Option<PathBuf>,
    verbose: bool,
) {
    let instance = load_instance(path);

    let mut config = match config_path {
        Some(p) => match SolverConfig::from_file(&p) {
            Ok(c) => c,
            Err(e) => exit_with("Error loading configuration", e),
        },
        None => SolverConfig::default(),
    };
    overrides.apply(&mut config);
    if let Err(e) = config.validate() {
        exit_with("Invalid configuration", e);
    }

    if verbose {
        println!("{}", instance.statistics());
        println!("Configuration: {:?}", config);
    }

    let start = Instant::now();
    let result: SearchResult = if runs > 1 {
        println!("Solving with {} runs...", runs);
        let progress = ProgressBar::new(runs as u64);
        let style = ProgressStyle::with_template("{bar:40} {pos}/{len} runs [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress.set_style(style);

        let solver = MultiStartSolver::new(config.clone(), runs);
        let outcome = solver.solve_with_progress(&instance, |run| {
            progress.set_message(format!("last {}", run.best_score));
            progress.inc(1);
        });
        progress.finish_and_clear();

        match outcome {
            Ok(multi) => {
                if verbose {
                    for (run, score) in multi.run_scores.iter().enumerate() {
                        println!("  Run {} (seed {}): {}", run, config.seed.wrapping_add(run as u64), score);
                    }
                }
                println!("Best run: {}", multi.best_run);
                multi.best
            }
            Err(e) => exit_with("Solver failed", e),
        }
    } else {
        let mut engine = match config.build_engine() {
            Ok(engine) => engine,
            Err(e) => exit_with("Invalid configuration", e),
        };
        println!("Solving with {}...", engine.acceptor_name());
        match engine.solve(&instance) {
            Ok(result) => result,
            Err(e) => exit_with("Solver failed", e),
        }
    };
    let elapsed = start.elapsed().as_secs_f64();

    let report = SolutionReport::new(&instance, &ScoreCalculator::new(config.weights), &result.best);

    println!("\n========== Solution ==========");
    print!("{}", report);
    println!("  Iterations: {}", result.stats.iterations);
    println!("  Accepted moves: {}", result.stats.accepted_moves);
    println!("  Improvements: {}", result.stats.improvements);
    println!("  Time: {:.3}s", elapsed);

    if let Some(out_path) = output {
        match report.write_json(&out_path) {
            Ok(()) => println!("Report saved to {:?}", out_path),
            Err(e) => eprintln!("Error saving report: {}", e),
        }
    }

    if let Some(csv_path) = csv {
        match report.write_assignments_csv(&csv_path) {
            Ok(()) => println!("Assignments saved to {:?}", csv_path),
            Err(e) => eprintln!("Error saving assignments: {}", e),
        }
    }
}

fn generate_instance(builder: &DemoDataBuilder, output: &PathBuf) {
    let instance = match builder.build() {
        Ok(inst) => inst,
        Err(e) => exit_with("Error generating instance", e),
    };

    let file = match File::create(output) {
        Ok(f) => f,
        Err(e) => exit_with("Error creating output file", e),
    };
    if let Err(e) = serde_json::to_writer_pretty(BufWriter::new(file), &instance.to_input()) {
        exit_with("Error writing instance", e);
    }

    println!("{}", instance.statistics());
    println!("Instance saved to {:?}", output);
}

fn analyze_instance(path: &PathBuf) {
    let instance = load_instance(path);

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    let total_capacity = instance.total_capacity();
    let total_demand = instance.total_demand();
    println!("\nCapacity:");
    if total_demand > 0 {
        println!("  Capacity / demand ratio: {:.2}", total_capacity as f64 / total_demand as f64);
    }
    if total_capacity < total_demand {
        println!("  Total demand exceeds total capacity: no feasible assignment exists");
    }

    let demands: Vec<i64> = instance.consumers.iter().map(|c| c.demand).collect();
    if let (Some(min), Some(max)) = (demands.iter().min(), demands.iter().max()) {
        println!("\nDemand Statistics:");
        println!("  Average: {:.2}", total_demand as f64 / demands.len() as f64);
        println!("  Min: {}", min);
        println!("  Max: {}", max);
    }

    let largest_capacity = instance.facilities.iter().map(|f| f.capacity).max().unwrap_or(0);
    let oversized = instance.consumers.iter().filter(|c| c.demand > largest_capacity).count();
    if oversized > 0 {
        println!("  Consumers larger than any facility: {}", oversized);
    }

    let setups: Vec<i64> = instance.facilities.iter().map(|f| f.setup_cost).collect();
    if let (Some(min), Some(max)) = (setups.iter().min(), setups.iter().max()) {
        println!("\nSetup Cost Statistics:");
        println!("  Average: {:.2}", setups.iter().sum::<i64>() as f64 / setups.len() as f64);
        println!("  Min: {}", min);
        println!("  Max: {}", max);
    }

    if let Some((south_west, north_east)) = instance.bounding_box() {
        println!("\nBounding box: ({}, {}) - ({}, {})", south_west.x, south_west.y, north_east.x, north_east.y);
    }
}
