//! Configuration system for the petri simulation.
//!
//! Supports YAML configuration files with sensible defaults.

use crate::attack::{AttackConfig, KillPolicy};
use crate::duplication::DuplicationConfig;
use crate::events::OutcomeConfig;
use crate::kind::{KindMap, Layer, OrganismKind};
use crate::mutation::{MutationConfig, ShieldConfig};
use crate::placement::PlacementConfig;
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub arena: ArenaConfig,
    pub simulation: SimulationConfig,
    pub kinds: KindMap<KindConfig>,
    pub mutation: MutationConfig,
    pub placement: PlacementConfig,
    #[serde(default)]
    pub outcome: OutcomeConfig,
    pub logging: LoggingConfig,
}

/// Bounded 2D arena
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    pub width: f32,
    pub height: f32,
    /// Bucket size of the occupancy index
    pub cell_size: f32,
}

/// Tick and initial population
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seconds of simulation time per tick
    pub dt: f64,
    /// Organisms scattered over the arena at start
    pub initial_population: KindMap<usize>,
    /// Random seed; a fresh one is drawn when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Template shared by every organism of one kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindConfig {
    pub max_health: i32,
    /// Base body diameter
    pub size: f32,
    /// Diameter cap when grown by a shield
    pub max_size: f32,
    /// Movement speed in units per second
    pub speed: f32,
    /// Chance per tick that a wanderer picks a new heading
    pub wander_turn_chance: f32,
    /// Seconds from death to return to the pool
    pub dissolve_duration: f32,
    /// Instances pre-constructed at start
    pub pool_warmup: usize,
    /// Sits on the non-blocking layer: never blocks a spawn
    #[serde(default)]
    pub non_blocking: bool,
    #[serde(default)]
    pub duplication: Option<DuplicationConfig>,
    #[serde(default)]
    pub shield: Option<ShieldConfig>,
    #[serde(default)]
    pub attack: Option<AttackConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Ticks between stats logging
    pub stats_interval: u64,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Errors that can occur while loading or validating configuration
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::default(),
            simulation: SimulationConfig::default(),
            kinds: KindMap {
                bacteria: KindConfig::bacteria(),
                human_cell: KindConfig::human_cell(),
                virus: KindConfig::virus(),
            },
            mutation: MutationConfig::default(),
            placement: PlacementConfig::default(),
            outcome: OutcomeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 80.0,
            height: 60.0,
            cell_size: 2.0,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 0.05,
            initial_population: KindMap {
                bacteria: 5,
                human_cell: 12,
                virus: 3,
            },
            seed: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stats_interval: 20,
            log_level: "info".to_string(),
        }
    }
}

impl KindConfig {
    /// Shield bearing attacker that hunts human cells
    pub fn bacteria() -> Self {
        Self {
            max_health: 100,
            size: 0.5,
            max_size: 1.5,
            speed: 1.5,
            wander_turn_chance: 0.02,
            dissolve_duration: 1.0,
            pool_warmup: 32,
            non_blocking: false,
            duplication: Some(DuplicationConfig::default()),
            shield: Some(ShieldConfig::default()),
            attack: Some(AttackConfig::default()),
        }
    }

    /// Passive, slowly duplicating prey
    pub fn human_cell() -> Self {
        Self {
            max_health: 50,
            size: 0.6,
            max_size: 0.6,
            speed: 0.5,
            wander_turn_chance: 0.01,
            dissolve_duration: 1.0,
            pool_warmup: 32,
            non_blocking: false,
            duplication: Some(DuplicationConfig {
                min_proba: 0.0002,
                max_proba: 0.004,
                soft_cap: 20,
                cooldown: 6.0,
            }),
            shield: None,
            attack: None,
        }
    }

    /// Small fast attacker that multiplies by killing
    pub fn virus() -> Self {
        Self {
            max_health: 10,
            size: 0.15,
            max_size: 0.15,
            speed: 2.5,
            wander_turn_chance: 0.05,
            dissolve_duration: 0.5,
            pool_warmup: 32,
            non_blocking: true,
            duplication: None,
            shield: None,
            attack: Some(AttackConfig {
                targets: vec![OrganismKind::HumanCell],
                detection_range: 4.0,
                attack_time: 3,
                hit_interval: 0.5,
                cooldown: 1.0,
                lock_timeout: 6.0,
                on_kill: KillPolicy::Replicate,
            }),
        }
    }

    /// Collision layer of organisms built from this template
    pub fn layer(&self, kind: OrganismKind) -> Layer {
        if self.non_blocking {
            Layer::NON_BLOCKING
        } else {
            kind.layer()
        }
    }

    fn validate(&self, kind: OrganismKind) -> Result<(), String> {
        if self.max_health <= 0 {
            return Err(format!("{}: max_health must be > 0", kind));
        }
        if self.size <= 0.0 || self.max_size < self.size {
            return Err(format!("{}: size must be > 0 and <= max_size", kind));
        }
        if self.speed < 0.0 || self.dissolve_duration < 0.0 {
            return Err(format!("{}: speed and dissolve_duration must be >= 0", kind));
        }
        if !(0.0..=1.0).contains(&self.wander_turn_chance) {
            return Err(format!("{}: wander_turn_chance must be in [0, 1]", kind));
        }
        if let Some(duplication) = &self.duplication {
            duplication.validate().map_err(|e| format!("{}: {}", kind, e))?;
        }
        if let Some(shield) = &self.shield {
            shield.validate().map_err(|e| format!("{}: {}", kind, e))?;
        }
        if let Some(attack) = &self.attack {
            attack.validate().map_err(|e| format!("{}: {}", kind, e))?;
        }
        Ok(())
    }
}

impl ArenaConfig {
    /// True if a circle lies entirely inside the arena
    pub fn contains_circle(&self, position: Vec2, radius: f32) -> bool {
        position.x - radius >= 0.0
            && position.y - radius >= 0.0
            && position.x + radius <= self.width
            && position.y + radius <= self.height
    }

    /// Uniform point keeping `clearance` from every wall, or the centre if the
    /// arena is too small for that
    pub fn random_point<R: Rng + ?Sized>(&self, clearance: f32, rng: &mut R) -> Vec2 {
        let axis = |extent: f32, rng: &mut R| {
            if extent > 2.0 * clearance {
                rng.gen_range(clearance..extent - clearance)
            } else {
                extent * 0.5
            }
        };
        let x = axis(self.width, rng);
        let y = axis(self.height, rng);
        Vec2::new(x, y)
    }

    /// Reflect a circle that moved past a wall. Returns the corrected
    /// position and velocity.
    pub fn bounce(&self, position: Vec2, velocity: Vec2, radius: f32) -> (Vec2, Vec2) {
        let mut position = position;
        let mut velocity = velocity;
        if position.x < radius {
            position.x = radius;
            velocity.x = velocity.x.abs();
        } else if position.x > self.width - radius {
            position.x = self.width - radius;
            velocity.x = -velocity.x.abs();
        }
        if position.y < radius {
            position.y = radius;
            velocity.y = velocity.y.abs();
        } else if position.y > self.height - radius {
            position.y = self.height - radius;
            velocity.y = -velocity.y.abs();
        }
        (position, velocity)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.arena.width <= 0.0 || self.arena.height <= 0.0 {
            return invalid("arena width and height must be > 0");
        }
        if self.arena.cell_size <= 0.0 {
            return invalid("arena cell_size must be > 0");
        }
        if self.simulation.dt <= 0.0 || !self.simulation.dt.is_finite() {
            return invalid("simulation dt must be > 0");
        }
        if !(0.0..=1.0).contains(&self.mutation.initial_probability) {
            return invalid("initial mutation probability must be in [0, 1]");
        }
        if self.placement.tries == 0 || self.placement.margin < 0.0 {
            return invalid("placement tries must be > 0 and margin >= 0");
        }
        for (kind, template) in self.kinds.iter() {
            template.validate(kind).map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }
}
