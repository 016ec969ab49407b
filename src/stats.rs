//! Statistics tracking for the simulation.

use crate::kind::{KindMap, OrganismKind};
use crate::population::Population;
use serde::{Deserialize, Serialize};

/// Per-kind figures in a snapshot
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KindStats {
    /// Registry size
    pub active: usize,
    /// Organisms currently dissolving
    pub dissolving: usize,
    /// Spawns since the start
    pub births: u64,
    /// Kills since the start
    pub deaths: u64,
    /// Mean core health of active organisms
    pub health_mean: f32,
    /// Pooled instances ready for reuse
    pub pool_available: usize,
    /// Instances ever constructed
    pub pool_constructed: usize,
}

/// Statistics snapshot for a simulation step
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Current tick
    pub time: u64,
    /// Simulation time in seconds
    pub sim_time: f64,
    /// Total active organisms
    pub population: usize,
    pub kinds: KindMap<KindStats>,
    /// Mean shield health over active shield bearers
    pub shield_mean: f32,
    /// Strongest shield among active organisms
    pub shield_max: i32,
    /// Global spontaneous mutation probability
    pub mutation_probability: f64,
    /// Kills landed by attackers since the start
    pub attack_kills: u64,
    /// Steps per second (performance)
    pub steps_per_second: f32,
}

impl Stats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats from the current population
    pub fn update(&mut self, population: &Population) {
        self.population = population.total_active();

        for kind in OrganismKind::ALL {
            let members: Vec<_> = population
                .registry(kind)
                .iter()
                .filter_map(|id| population.get(id))
                .collect();
            let stats = &mut self.kinds[kind];
            stats.active = members.len();
            stats.dissolving = population
                .organisms()
                .iter()
                .filter(|o| o.kind == kind && o.is_dissolving())
                .count();
            stats.births = population.births[kind];
            stats.deaths = population.deaths[kind];
            stats.health_mean = if members.is_empty() {
                0.0
            } else {
                members.iter().map(|o| o.health as f32).sum::<f32>() / members.len() as f32
            };
            stats.pool_available = population.pool(kind).available();
            stats.pool_constructed = population.pool(kind).constructed();
        }

        let shields: Vec<i32> = population
            .organisms()
            .iter()
            .filter(|o| o.is_active())
            .filter_map(|o| o.shield.map(|s| s.health()))
            .collect();
        if shields.is_empty() {
            self.shield_mean = 0.0;
            self.shield_max = 0;
        } else {
            self.shield_mean = shields.iter().sum::<i32>() as f32 / shields.len() as f32;
            self.shield_max = shields.iter().copied().max().unwrap_or(0);
        }
    }

    /// Save stats to JSON file
    pub fn save_json(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Load stats from JSON file
    pub fn load_json(path: &str) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "T:{:6} | Bac:{:4} | Hum:{:4} | Vir:{:4} | Shield:{:5.1}/{:3} | Mut:{:.4} | Kills:{}",
            self.time,
            self.kinds.bacteria.active,
            self.kinds.human_cell.active,
            self.kinds.virus.active,
            self.shield_mean,
            self.shield_max,
            self.mutation_probability,
            self.attack_kills,
        )
    }
}

/// Historical statistics tracker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsHistory {
    /// All recorded stats snapshots
    pub snapshots: Vec<Stats>,
    /// Recording interval
    pub interval: u64,
}

impl StatsHistory {
    /// Create new history with recording interval
    pub fn new(interval: u64) -> Self {
        Self {
            snapshots: Vec::new(),
            interval,
        }
    }

    /// Record a stats snapshot
    pub fn record(&mut self, stats: Stats) {
        self.snapshots.push(stats);
    }

    /// Get stats at a specific tick (approximate)
    pub fn get_at(&self, time: u64) -> Option<&Stats> {
        let index = (time / self.interval.max(1)) as usize;
        self.snapshots.get(index)
    }

    /// Active count of one kind over time
    pub fn population_series(&self, kind: OrganismKind) -> Vec<(u64, usize)> {
        self.snapshots
            .iter()
            .map(|s| (s.time, s.kinds[kind].active))
            .collect()
    }

    /// Mean shield health over time
    pub fn shield_series(&self) -> Vec<(u64, f32)> {
        self.snapshots
            .iter()
            .map(|s| (s.time, s.shield_mean))
            .collect()
    }

    /// Save history to file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)
    }

    /// Load history from file
    pub fn load(path: &str) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use glam::Vec2;

    #[test]
    fn test_stats_update() {
        let config = Config::default();
        let mut population = Population::new(config.kinds.clone(), config.arena.cell_size);
        let a = population.spawn(OrganismKind::Bacteria, Vec2::new(5.0, 5.0), 0.0);
        population.spawn(OrganismKind::Bacteria, Vec2::new(10.0, 5.0), 0.0);
        let cell = population.spawn(OrganismKind::HumanCell, Vec2::new(20.0, 5.0), 0.0);
        population.modify_shield(a.id, |s| s.set(30));
        population.kill(cell.id);

        let mut stats = Stats::new();
        stats.update(&population);

        assert_eq!(stats.population, 2);
        assert_eq!(stats.kinds.bacteria.active, 2);
        assert_eq!(stats.kinds.human_cell.active, 0);
        assert_eq!(stats.kinds.human_cell.dissolving, 1);
        assert_eq!(stats.kinds.human_cell.deaths, 1);
        assert_eq!(stats.shield_max, 30);
        assert_eq!(stats.shield_mean, 15.0);
    }

    #[test]
    fn test_stats_history() {
        let mut history = StatsHistory::new(10);

        for i in 0..5 {
            let mut stats = Stats::new();
            stats.time = i * 10;
            stats.kinds.human_cell.active = (i + 1) as usize * 100;
            history.record(stats);
        }

        let series = history.population_series(OrganismKind::HumanCell);
        assert_eq!(series.len(), 5);
        assert_eq!(series[0], (0, 100));
        assert_eq!(series[4], (40, 500));
        assert_eq!(history.get_at(20).map(|s| s.time), Some(20));
    }
}
