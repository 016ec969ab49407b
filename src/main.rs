//! petri - CLI Entry Point
//!
//! Organism lifecycle and population simulator.

use clap::{Parser, Subcommand};
use petri::{benchmark, Config, OrganismKind, World};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "petri")]
#[command(version)]
#[command(about = "Pooled organism lifecycle and population simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a new simulation
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Number of steps to simulate
        #[arg(short, long, default_value = "10000")]
        steps: u64,

        /// Output directory for the stats history
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Global mutation probability override
        #[arg(long)]
        mutation: Option<f64>,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run performance benchmark
    Benchmark {
        /// Number of steps
        #[arg(short, long, default_value = "1000")]
        steps: u64,

        /// Human cell population
        #[arg(short, long, default_value = "500")]
        population: usize,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            steps,
            output,
            seed,
            mutation,
            quiet,
        } => run_simulation(config, steps, output, seed, mutation, quiet),

        Commands::Benchmark { steps, population } => run_benchmark(steps, population),

        Commands::Init { output } => generate_config(output),
    }
}

fn run_simulation(
    config_path: PathBuf,
    steps: u64,
    output: PathBuf,
    seed: Option<u64>,
    mutation: Option<f64>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Load or create config
    let loaded = config_path.exists();
    let config = if loaded {
        Config::from_file(&config_path)?
    } else {
        Config::default()
    };
    init_logging(&config.logging.log_level);
    if loaded {
        log::info!("Loaded config from: {:?}", config_path);
    } else {
        log::info!("Using default configuration");
    }

    std::fs::create_dir_all(&output)?;

    let mut world = match seed {
        Some(s) => World::new_with_seed(config.clone(), s),
        None => World::new(config.clone()),
    };
    if let Some(p) = mutation {
        world.set_global_mutation_probability(p);
    }

    println!("Starting simulation (seed {})", world.seed());
    for kind in OrganismKind::ALL {
        println!("  {}: {}", kind, world.active_count(kind));
    }
    println!("  Arena: {}x{}", config.arena.width, config.arena.height);
    println!("  Steps: {}", steps);
    println!();

    let start = Instant::now();
    let stats_interval = config.logging.stats_interval.max(1);

    for i in 0..steps {
        world.step();

        if !quiet && i % stats_interval == 0 {
            println!("{}", world.stats.summary());
        }

        for event in world.drain_events() {
            log::info!("Event at step {}: {:?}", world.time(), event);
        }

        if let Some(outcome) = world.outcome() {
            println!("\n{:?} at step {}", outcome, world.time());
            break;
        }
    }

    let elapsed = start.elapsed();
    let steps_per_sec = world.time() as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    println!();
    println!("=== Simulation Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Steps: {}", world.time());
    println!("Speed: {:.1} steps/s", steps_per_sec);
    for kind in OrganismKind::ALL {
        let stats = &world.stats.kinds[kind];
        println!(
            "{}: {} active, {} born, {} died, {} pooled instances",
            kind, stats.active, stats.births, stats.deaths, stats.pool_constructed
        );
    }
    println!("Shield mean/max: {:.1}/{}", world.stats.shield_mean, world.stats.shield_max);

    // Save stats history
    let stats_path = output.join("stats_history.json");
    world.stats_history.save(&stats_path.to_string_lossy())?;
    println!("Stats history: {:?}", stats_path);

    Ok(())
}

/// RUST_LOG still wins over the configured level
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run_benchmark(steps: u64, population: usize) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&Config::default().logging.log_level);
    println!("=== petri Benchmark ===");
    println!("Steps: {}", steps);
    println!("Population: {}", population);
    println!();

    let result = benchmark(steps, population);
    println!("{}", result);

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    init_logging(&config.logging.log_level);
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);
    Ok(())
}
