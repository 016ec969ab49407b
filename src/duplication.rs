//! Duplication: density-adaptive asexual reproduction.
//!
//! Each active organism of a duplication-capable kind rolls once per tick.
//! The probability is highest for a lone survivor and falls linearly as the
//! kind's registry grows, flooring at `min_proba` once the population reaches
//! the soft cap. Population can keep growing past the soft cap, just slowly.

use crate::config::ArenaConfig;
use crate::kind::OrganismKind;
use crate::organism::{Organism, OrganismHandle, OrganismId};
use crate::placement::{find_spawn_position, PlacementConfig};
use crate::population::Population;
use crate::scheduler::{SimClock, Scheduler, Timer};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Per-kind duplication parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicationConfig {
    /// Probability per tick once the population is at or past the soft cap
    pub min_proba: f64,
    /// Probability per tick for a lone organism
    pub max_proba: f64,
    /// Population size past which the probability stops falling
    pub soft_cap: usize,
    /// Upper bound of the cooldown in seconds; each draw is in [cooldown/2, cooldown]
    pub cooldown: f64,
}

impl Default for DuplicationConfig {
    fn default() -> Self {
        Self {
            min_proba: 0.0001,
            max_proba: 0.005,
            soft_cap: 5,
            cooldown: 4.0,
        }
    }
}

impl DuplicationConfig {
    /// Probability drop per additional organism below the soft cap
    #[inline]
    pub fn increase_rate(&self) -> f64 {
        (self.max_proba - self.min_proba) / (self.soft_cap.saturating_sub(1).max(1)) as f64
    }

    /// Duplication probability for a registry of `count` organisms
    pub fn probability(&self, count: usize) -> f64 {
        let crowding = count.max(1) - 1;
        let capped = crowding.min(self.soft_cap.saturating_sub(1));
        self.max_proba - self.increase_rate() * capped as f64
    }

    /// Randomized cooldown in `[cooldown / 2, cooldown]`
    pub fn draw_cooldown<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.cooldown <= 0.0 {
            return 0.0;
        }
        rng.gen_range(self.cooldown / 2.0..=self.cooldown)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.soft_cap < 2 {
            return Err("soft_cap must be >= 2".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_proba) || !(0.0..=1.0).contains(&self.max_proba) {
            return Err("duplication probabilities must be in [0, 1]".to_string());
        }
        if self.min_proba > self.max_proba {
            return Err("min_proba cannot exceed max_proba".to_string());
        }
        if self.cooldown < 0.0 {
            return Err("duplication cooldown must be >= 0".to_string());
        }
        Ok(())
    }
}

/// Per-organism duplication gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicationState {
    /// Cleared by a global stop; a stopped organism never duplicates again
    pub enabled: bool,
    /// Cooldown gate
    pub can_duplicate: bool,
}

impl Default for DuplicationState {
    fn default() -> Self {
        Self {
            enabled: true,
            can_duplicate: false,
        }
    }
}

/// Result of one duplication roll that passed the probability check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DuplicationResult {
    /// A child was placed
    Spawned { parent: OrganismHandle, child: OrganismHandle },
    /// Every placement try hit an occupied spot
    Crowded { parent: OrganismHandle },
}

/// Runs duplication for every duplication-capable kind
#[derive(Debug, Clone, Default)]
pub struct DuplicationController {
    frozen: bool,
    pub attempts: u64,
    pub successes: u64,
    pub crowded: u64,
}

impl DuplicationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// True after [`stop_all`](Self::stop_all) until [`resume_all`](Self::resume_all)
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Start the spawn-time cooldown of a freshly spawned organism
    pub fn on_spawned<R: Rng + ?Sized>(
        &self,
        population: &mut Population,
        scheduler: &mut Scheduler,
        clock: &SimClock,
        rng: &mut R,
        id: OrganismId,
    ) {
        let Some(org) = population.get(id) else {
            return;
        };
        let Some(config) = population.template(org.kind).duplication.clone() else {
            return;
        };

        if self.frozen {
            if let Some(dup) = population.get_mut(id).and_then(|o| o.duplication.as_mut()) {
                dup.enabled = false;
                dup.can_duplicate = false;
            }
            return;
        }
        Self::restart_cooldown(population, scheduler, clock, rng, id, &config);
    }

    /// Duplication cooldown elapsed
    pub fn recall(&self, organism: &mut Organism) {
        if self.frozen {
            return;
        }
        if let Some(dup) = organism.duplication.as_mut() {
            if dup.enabled {
                dup.can_duplicate = true;
            }
        }
    }

    fn restart_cooldown<R: Rng + ?Sized>(
        population: &mut Population,
        scheduler: &mut Scheduler,
        clock: &SimClock,
        rng: &mut R,
        id: OrganismId,
        config: &DuplicationConfig,
    ) {
        if let Some(dup) = population.get_mut(id).and_then(|o| o.duplication.as_mut()) {
            dup.can_duplicate = false;
        }
        let delay = config.draw_cooldown(rng);
        scheduler.schedule(id, Timer::DuplicationRecall, clock.now() + delay);
    }

    /// One duplication pass. Children are registered immediately, so later
    /// rolls in the same pass see the grown population.
    #[allow(clippy::too_many_arguments)]
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        population: &mut Population,
        scheduler: &mut Scheduler,
        clock: &SimClock,
        rng: &mut R,
        arena: &ArenaConfig,
        placement: &PlacementConfig,
    ) -> Vec<DuplicationResult> {
        let mut results = Vec::new();
        if clock.is_paused() || self.frozen {
            return results;
        }

        for kind in OrganismKind::ALL {
            let Some(config) = population.template(kind).duplication.clone() else {
                continue;
            };

            for id in population.registry(kind).snapshot() {
                let Some(org) = population.get(id) else {
                    continue;
                };
                if !org.is_active() || !org.duplication.is_some_and(|d| d.enabled && d.can_duplicate) {
                    continue;
                }

                let p = config.probability(population.active_count(kind));
                if rng.gen::<f64>() >= p {
                    continue;
                }

                self.attempts += 1;
                Self::restart_cooldown(population, scheduler, clock, rng, id, &config);
                if let Some(result) = self.spawn_duplicate(population, scheduler, clock, rng, arena, placement, id) {
                    results.push(result);
                }
            }
        }

        results
    }

    /// Place and spawn a clone of `parent`. The child inherits the parent's
    /// shield health unchanged.
    #[allow(clippy::too_many_arguments)]
    fn spawn_duplicate<R: Rng + ?Sized>(
        &mut self,
        population: &mut Population,
        scheduler: &mut Scheduler,
        clock: &SimClock,
        rng: &mut R,
        arena: &ArenaConfig,
        placement: &PlacementConfig,
        parent_id: OrganismId,
    ) -> Option<DuplicationResult> {
        let parent = population.get(parent_id)?;
        let kind = parent.kind;
        let parent_handle = parent.handle();
        let parent_shield = parent.shield.map(|s| s.health());

        let Some(position) = find_spawn_position(
            parent.position,
            parent.size,
            arena,
            population.index(),
            placement,
            rng,
        ) else {
            self.crowded += 1;
            log::trace!("Organism {} found no room to duplicate", parent_id);
            return Some(DuplicationResult::Crowded { parent: parent_handle });
        };

        let child = population.spawn(kind, position, clock.now());
        if let Some(shield) = parent_shield {
            population.modify_shield(child.id, |s| s.set(shield));
        }
        self.on_spawned(population, scheduler, clock, rng, child.id);
        self.successes += 1;

        log::trace!("Organism {} duplicated into {}", parent_id, child.id);
        Some(DuplicationResult::Spawned {
            parent: parent_handle,
            child,
        })
    }

    /// Freeze the population: no live or future organism duplicates until
    /// [`resume_all`](Self::resume_all)
    pub fn stop_all(&mut self, population: &mut Population, scheduler: &mut Scheduler) {
        self.frozen = true;
        let mut stopped = 0usize;
        for kind in OrganismKind::ALL {
            if population.template(kind).duplication.is_none() {
                continue;
            }
            for id in population.registry(kind).snapshot() {
                if let Some(dup) = population.get_mut(id).and_then(|o| o.duplication.as_mut()) {
                    dup.enabled = false;
                    dup.can_duplicate = false;
                    stopped += 1;
                }
                scheduler.cancel(id, Timer::DuplicationRecall);
            }
        }
        log::info!("Duplication stopped for {} organisms", stopped);
    }

    /// Lift a global stop; every live organism starts a fresh cooldown
    pub fn resume_all<R: Rng + ?Sized>(
        &mut self,
        population: &mut Population,
        scheduler: &mut Scheduler,
        clock: &SimClock,
        rng: &mut R,
    ) {
        self.frozen = false;
        for kind in OrganismKind::ALL {
            let Some(config) = population.template(kind).duplication.clone() else {
                continue;
            };
            for id in population.registry(kind).snapshot() {
                if let Some(dup) = population.get_mut(id).and_then(|o| o.duplication.as_mut()) {
                    dup.enabled = true;
                }
                Self::restart_cooldown(population, scheduler, clock, rng, id, &config);
            }
        }
        log::info!("Duplication resumed");
    }
}
