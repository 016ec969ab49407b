//! # petri
//!
//! Pooled organism lifecycle and population simulation engine.
//!
//! Bacteria, human cells and viruses live in a bounded 2D arena. Each kind
//! is backed by an object pool; organisms duplicate with a density-adaptive
//! probability, grow resistance shields by mutation and conjugation, and
//! hunt each other with exclusive target claims.
//!
//! ## Features
//!
//! - **Pooled**: organisms are constructed once and recycled forever
//! - **Deterministic**: seeded runs replay exactly on one build
//! - **Parallel**: the contact scan runs on Rayon
//! - **Configurable**: YAML configuration files
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use petri::{Config, OrganismKind, World};
//!
//! let mut world = World::new_with_seed(Config::default(), 7);
//! world.run(1000);
//!
//! println!("Human cells: {}", world.active_count(OrganismKind::HumanCell));
//! println!("{}", world.stats.summary());
//! ```
//!
//! ## Driving the world from outside
//!
//! ```rust
//! use petri::{Config, EventTally, OrganismKind, World};
//! use glam::Vec2;
//!
//! let mut config = Config::default();
//! config.simulation.initial_population.virus = 0;
//!
//! let mut world = World::new_with_seed(config, 1);
//! world.set_global_mutation_probability(0.01);
//!
//! if let Some(virus) = world.spawn_at(OrganismKind::Virus, Vec2::new(5.0, 5.0)).handle() {
//!     world.damage(virus, 100);
//! }
//!
//! let mut tally = EventTally::default();
//! world.dispatch_events(&mut tally);
//! assert_eq!(tally.kills.virus, 1);
//! ```

pub mod attack;
pub mod commands;
pub mod config;
pub mod duplication;
pub mod events;
pub mod grid;
pub mod kind;
pub mod locomotion;
pub mod mutation;
pub mod organism;
pub mod placement;
pub mod pool;
pub mod population;
pub mod registry;
pub mod scheduler;
pub mod stats;
pub mod world;

// Re-export main types
pub use commands::{CommandResult, SimState, WorldCommand};
pub use config::{Config, ConfigError};
pub use events::{EventTally, GameObserver, WorldEvent};
pub use kind::{KindMap, OrganismKind};
pub use organism::{DamageOutcome, Organism, OrganismHandle};
pub use world::{SpawnOutcome, World};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a quick benchmark with `population` human cells and a proportional
/// number of pathogens
pub fn benchmark(steps: u64, population: usize) -> BenchmarkResult {
    use std::time::Instant;

    let mut config = Config::default();
    let side = (population as f32 * 8.0).sqrt().max(40.0);
    config.arena.width = side;
    config.arena.height = side;
    config.simulation.initial_population = KindMap {
        bacteria: (population / 10).max(1),
        human_cell: population,
        virus: (population / 20).max(1),
    };
    // Keep the run going for the whole benchmark
    config.outcome.freeze_on_outcome = false;

    let mut world = World::new_with_seed(config, 0xBE7C);
    let initial_population = world.population();

    let start = Instant::now();
    world.run(steps);
    let elapsed = start.elapsed();

    BenchmarkResult {
        steps,
        initial_population,
        final_population: world.population(),
        elapsed_secs: elapsed.as_secs_f64(),
        steps_per_second: steps as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        constructed: OrganismKind::ALL
            .iter()
            .map(|&k| world.population.pool(k).constructed())
            .sum(),
    }
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub steps: u64,
    pub initial_population: usize,
    pub final_population: usize,
    pub elapsed_secs: f64,
    pub steps_per_second: f64,
    /// Organism instances constructed by all pools
    pub constructed: usize,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Steps: {}", self.steps)?;
        writeln!(f, "Population: {} -> {}", self.initial_population, self.final_population)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} steps/s", self.steps_per_second)?;
        writeln!(f, "Pooled instances: {}", self.constructed)?;
        Ok(())
    }
}
