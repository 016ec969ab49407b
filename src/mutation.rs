//! Resistance shields: spontaneous mutation, conjugation and shield damage.
//!
//! Shield-bearing organisms gain shield strength two ways:
//! - **Spontaneous mutation**: one global probability, one draw per organism
//!   per tick, each success adds one shield increment.
//! - **Conjugation**: on contact with another shield bearer the receiver's
//!   shield may be raised to match the stronger of the two.
//!
//! Shields are only ever lowered by damage.

use crate::organism::{Organism, OrganismId};
use crate::population::Population;
use crate::scheduler::{SimClock, Scheduler, Timer};
use crate::kind::OrganismKind;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Per-kind shield parameters. Kinds without one carry no shield.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldConfig {
    /// Shield health gained per spontaneous mutation
    pub one_shield_health: i32,
    /// Chance that a contact copies the stronger shield
    pub conjugation_probability: f64,
    /// Seconds before the organism can conjugate again after any contact
    pub conjugation_cooldown: f64,
    /// Radius growth per point of shield health
    pub size_per_shield_health: f32,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            one_shield_health: 10,
            conjugation_probability: 0.3,
            conjugation_cooldown: 1.0,
            size_per_shield_health: 0.01,
        }
    }
}

impl ShieldConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.one_shield_health <= 0 {
            return Err("one_shield_health must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.conjugation_probability) {
            return Err("conjugation_probability must be in [0, 1]".to_string());
        }
        if self.conjugation_cooldown < 0.0 {
            return Err("conjugation_cooldown must be >= 0".to_string());
        }
        if self.size_per_shield_health < 0.0 {
            return Err("size_per_shield_health must be >= 0".to_string());
        }
        Ok(())
    }
}

/// Global mutation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Starting value of the global spontaneous mutation probability
    pub initial_probability: f64,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            initial_probability: 0.0005,
        }
    }
}

/// Secondary health pool that absorbs damage before core health
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shield {
    health: i32,
    max_health: i32,
}

impl Shield {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn health(&self) -> i32 {
        self.health
    }

    /// Highest shield health reached during this incarnation
    #[inline]
    pub fn max_health(&self) -> i32 {
        self.max_health
    }

    pub fn set(&mut self, value: i32) {
        self.health = value.max(0);
        self.max_health = self.max_health.max(self.health);
    }

    /// Ratchet up by `amount`
    pub fn increase(&mut self, amount: i32) {
        self.set(self.health.saturating_add(amount.max(0)));
    }

    /// Raise to `value`, never lowering
    pub fn raise_to(&mut self, value: i32) {
        if value > self.health {
            self.set(value);
        }
    }

    /// Soak up `amount` of damage. Returns the overflow that must reach
    /// core health.
    pub fn absorb(&mut self, amount: i32) -> i32 {
        let remaining = self.health - amount;
        if remaining < 0 {
            self.health = 0;
            -remaining
        } else {
            self.health = remaining;
            0
        }
    }

    pub(crate) fn reset(&mut self) {
        self.health = 0;
        self.max_health = 0;
    }
}

/// Conjugation cooldown gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConjugationState {
    pub can_collide: bool,
}

impl Default for ConjugationState {
    fn default() -> Self {
        Self { can_collide: true }
    }
}

/// Owns the global mutation probability and runs both shield behaviours
#[derive(Debug, Clone)]
pub struct MutationController {
    probability: f64,
    pub mutations: u64,
    pub conjugations: u64,
}

impl MutationController {
    pub fn new(config: &MutationConfig) -> Self {
        Self {
            probability: config.initial_probability.clamp(0.0, 1.0),
            mutations: 0,
            conjugations: 0,
        }
    }

    /// Current global probability, exposed for display
    #[inline]
    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn set_probability(&mut self, value: f64) {
        self.probability = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
        log::debug!("Global mutation probability set to {:.5}", self.probability);
    }

    /// Raise the probability in response to an outer-game event
    pub fn bump_probability(&mut self, delta: f64) {
        self.set_probability(self.probability + delta);
    }

    /// Spontaneous mutation pass over every active shield bearer
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        population: &mut Population,
        clock: &SimClock,
        rng: &mut R,
    ) -> usize {
        if clock.is_paused() {
            return 0;
        }

        let mut mutated = 0;
        for kind in OrganismKind::ALL {
            let Some(increment) = population
                .template(kind)
                .shield
                .as_ref()
                .map(|s| s.one_shield_health)
            else {
                continue;
            };

            let members = population.registry(kind).snapshot();
            for id in members {
                if !population.get(id).is_some_and(Organism::is_active) {
                    continue;
                }
                if rng.gen::<f64>() < self.probability {
                    population.modify_shield(id, |shield| shield.increase(increment));
                    mutated += 1;
                    log::trace!("Organism {} mutated a shield increment", id);
                }
            }
        }

        self.mutations += mutated as u64;
        mutated
    }

    /// Contact between two organisms: each side may receive the other's shield
    pub fn on_contact<R: Rng + ?Sized>(
        &mut self,
        population: &mut Population,
        scheduler: &mut Scheduler,
        clock: &SimClock,
        rng: &mut R,
        a: OrganismId,
        b: OrganismId,
    ) -> usize {
        if clock.is_paused() {
            return 0;
        }
        [(a, b), (b, a)]
            .into_iter()
            .filter(|&(receiver, donor)| {
                self.conjugate(population, scheduler, clock, rng, receiver, donor)
            })
            .count()
    }

    fn conjugate<R: Rng + ?Sized>(
        &mut self,
        population: &mut Population,
        scheduler: &mut Scheduler,
        clock: &SimClock,
        rng: &mut R,
        receiver: OrganismId,
        donor: OrganismId,
    ) -> bool {
        let (Some(r), Some(d)) = (population.get(receiver), population.get(donor)) else {
            return false;
        };
        if !r.is_active() || !d.is_active() || r.shield.is_none() {
            return false;
        }
        let Some(donor_shield) = d.shield.map(|s| s.health()) else {
            return false;
        };
        if !r.conjugation.is_some_and(|c| c.can_collide) {
            return false;
        }
        let Some(config) = population.template(r.kind).shield.clone() else {
            return false;
        };

        let success = rng.gen::<f64>() < config.conjugation_probability;
        if success {
            population.modify_shield(receiver, |shield| shield.raise_to(donor_shield));
            self.conjugations += 1;
            log::trace!("Organism {} conjugated shield {} from {}", receiver, donor_shield, donor);
        }

        // Cooldown restarts whether or not the draw succeeded
        if let Some(conj) = population.get_mut(receiver).and_then(|o| o.conjugation.as_mut()) {
            conj.can_collide = false;
        }
        scheduler.schedule(
            receiver,
            Timer::ConjugationRecall,
            clock.now() + config.conjugation_cooldown,
        );

        success
    }

    /// Conjugation cooldown elapsed
    pub fn recall(&self, organism: &mut Organism) {
        if let Some(conj) = organism.conjugation.as_mut() {
            conj.can_collide = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use glam::Vec2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup() -> (Population, Scheduler, SimClock, ChaCha8Rng) {
        let config = Config::default();
        let population = Population::new(config.kinds.clone(), config.arena.cell_size);
        (population, Scheduler::new(), SimClock::new(0.05), ChaCha8Rng::seed_from_u64(7))
    }

    #[test]
    fn test_shield_high_water_mark() {
        let mut shield = Shield::new();
        shield.increase(10);
        shield.increase(10);
        assert_eq!(shield.max_health(), 20);

        shield.absorb(15);
        assert_eq!(shield.health(), 5);
        assert_eq!(shield.max_health(), 20);

        shield.raise_to(12);
        assert_eq!(shield.health(), 12);
        assert_eq!(shield.max_health(), 20);
        assert!(shield.max_health() >= shield.health());
    }

    #[test]
    fn test_absorb_overflow() {
        let mut shield = Shield::new();
        shield.set(20);
        assert_eq!(shield.absorb(35), 15);
        assert_eq!(shield.health(), 0);

        shield.set(20);
        assert_eq!(shield.absorb(20), 0);
        assert_eq!(shield.health(), 0);
    }

    #[test]
    fn test_raise_to_never_lowers() {
        let mut shield = Shield::new();
        shield.set(30);
        shield.raise_to(10);
        assert_eq!(shield.health(), 30);
    }

    #[test]
    fn test_probability_clamped() {
        let mut controller = MutationController::new(&MutationConfig::default());
        controller.set_probability(3.0);
        assert_eq!(controller.probability(), 1.0);
        controller.set_probability(-1.0);
        assert_eq!(controller.probability(), 0.0);
        controller.bump_probability(0.25);
        assert_eq!(controller.probability(), 0.25);
    }

    #[test]
    fn test_certain_mutation_adds_increment() {
        let (mut population, _, clock, mut rng) = setup();
        let handle = population.spawn(OrganismKind::Bacteria, Vec2::new(10.0, 10.0), 0.0);
        let base_size = population.get(handle.id).unwrap().size;

        let mut controller = MutationController::new(&MutationConfig {
            initial_probability: 1.0,
        });
        let mutated = controller.tick(&mut population, &clock, &mut rng);

        let org = population.get(handle.id).unwrap();
        assert_eq!(mutated, 1);
        assert_eq!(org.shield_health(), ShieldConfig::default().one_shield_health);
        assert!(org.size > base_size);
    }

    #[test]
    fn test_paused_tick_does_nothing() {
        let (mut population, _, mut clock, mut rng) = setup();
        let handle = population.spawn(OrganismKind::Bacteria, Vec2::new(10.0, 10.0), 0.0);
        clock.set_paused(true);

        let mut controller = MutationController::new(&MutationConfig {
            initial_probability: 1.0,
        });
        assert_eq!(controller.tick(&mut population, &clock, &mut rng), 0);
        assert_eq!(population.get(handle.id).unwrap().shield_health(), 0);
    }

    #[test]
    fn test_conjugation_copies_stronger_shield() {
        let (mut population, mut scheduler, clock, mut rng) = setup();
        population.template_mut(OrganismKind::Bacteria).shield.as_mut().unwrap().conjugation_probability = 1.0;

        let weak = population.spawn(OrganismKind::Bacteria, Vec2::new(10.0, 10.0), 0.0);
        let strong = population.spawn(OrganismKind::Bacteria, Vec2::new(10.5, 10.0), 0.0);
        population.modify_shield(strong.id, |s| s.set(40));
        population.modify_shield(weak.id, |s| s.set(5));

        let mut controller = MutationController::new(&MutationConfig::default());
        controller.on_contact(&mut population, &mut scheduler, &clock, &mut rng, weak.id, strong.id);

        assert_eq!(population.get(weak.id).unwrap().shield_health(), 40);
        assert_eq!(population.get(strong.id).unwrap().shield_health(), 40);
        assert!(scheduler.is_pending(weak.id, Timer::ConjugationRecall));
        assert!(scheduler.is_pending(strong.id, Timer::ConjugationRecall));
    }

    #[test]
    fn test_failed_conjugation_still_restarts_cooldown() {
        let (mut population, mut scheduler, clock, mut rng) = setup();
        population.template_mut(OrganismKind::Bacteria).shield.as_mut().unwrap().conjugation_probability = 0.0;

        let a = population.spawn(OrganismKind::Bacteria, Vec2::new(10.0, 10.0), 0.0);
        let b = population.spawn(OrganismKind::Bacteria, Vec2::new(10.5, 10.0), 0.0);
        population.modify_shield(b.id, |s| s.set(40));

        let mut controller = MutationController::new(&MutationConfig::default());
        let n = controller.on_contact(&mut population, &mut scheduler, &clock, &mut rng, a.id, b.id);

        assert_eq!(n, 0);
        assert_eq!(population.get(a.id).unwrap().shield_health(), 0);
        assert!(!population.get(a.id).unwrap().conjugation.unwrap().can_collide);
        assert!(scheduler.is_pending(a.id, Timer::ConjugationRecall));

        // On cooldown: a second contact is ignored and does not reschedule
        let due = scheduler.due_at(a.id, Timer::ConjugationRecall);
        controller.on_contact(&mut population, &mut scheduler, &clock, &mut rng, a.id, b.id);
        assert_eq!(scheduler.due_at(a.id, Timer::ConjugationRecall), due);

        controller.recall(population.get_mut(a.id).unwrap());
        assert!(population.get(a.id).unwrap().conjugation.unwrap().can_collide);
    }
}
