//! Attack: detect, lock, chase and wear down a single target.
//!
//! `Cooldown -> Ready -> Locked -> Attacking -> Cooldown`
//!
//! A target can be held by one attacker at a time. The claim freezes it in
//! place; damage is spread evenly over `attack_time` hits so every kill takes
//! the same time regardless of the victim's health.

use crate::config::ArenaConfig;
use crate::kind::OrganismKind;
use crate::organism::{Organism, OrganismHandle, OrganismId};
use crate::placement::{find_spawn_position, is_free, PlacementConfig};
use crate::population::Population;
use crate::scheduler::{SimClock, Scheduler, Timer};
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// What happens after a successful kill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillPolicy {
    Nothing,
    /// Spawn one organism of the attacker's kind where the victim died
    Replicate,
}

/// Per-kind attack parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackConfig {
    /// Kinds this attacker hunts
    pub targets: Vec<OrganismKind>,
    /// Reach beyond the attacker's own collider
    pub detection_range: f32,
    /// Hits needed to kill any target
    pub attack_time: u32,
    /// Seconds between hits
    pub hit_interval: f64,
    /// Seconds before the attacker hunts again
    pub cooldown: f64,
    /// Seconds a locked target is held before the attacker gives up on it
    pub lock_timeout: f64,
    pub on_kill: KillPolicy,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            targets: vec![OrganismKind::HumanCell],
            detection_range: 3.0,
            attack_time: 5,
            hit_interval: 0.5,
            cooldown: 2.0,
            lock_timeout: 8.0,
            on_kill: KillPolicy::Nothing,
        }
    }
}

impl AttackConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.attack_time == 0 {
            return Err("attack_time must be > 0".to_string());
        }
        if self.hit_interval <= 0.0 {
            return Err("hit_interval must be > 0".to_string());
        }
        if self.detection_range < 0.0 || self.cooldown < 0.0 || self.lock_timeout < 0.0 {
            return Err("attack ranges and durations must be >= 0".to_string());
        }
        Ok(())
    }
}

/// Attack state of one attacker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AttackState {
    Cooldown,
    Ready,
    /// Target claimed, closing in
    Locked { target: OrganismHandle, since: f64 },
    /// In contact, landing a hit every interval
    Attacking {
        target: OrganismHandle,
        per_hit: i32,
        next_hit_at: f64,
    },
}

impl AttackState {
    /// Target currently held, if any
    pub fn target(&self) -> Option<OrganismHandle> {
        match *self {
            AttackState::Locked { target, .. } | AttackState::Attacking { target, .. } => Some(target),
            AttackState::Cooldown | AttackState::Ready => None,
        }
    }
}

/// Damage per hit so that `attack_time` hits kill a target of `health`
pub fn per_hit_damage(health: i32, attack_time: u32) -> i32 {
    let hits = attack_time.max(1) as i32;
    ((health + hits - 1) / hits).max(1)
}

/// A kill landed by an attacker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackReport {
    pub attacker: OrganismHandle,
    pub victim: OrganismHandle,
    pub victim_kind: OrganismKind,
    pub position: Vec2,
    /// Organism spawned by a `Replicate` policy
    pub offspring: Option<OrganismHandle>,
}

/// Runs every attacker
#[derive(Debug, Clone, Default)]
pub struct AttackController {
    pub claims: u64,
    pub hits: u64,
    pub kills: u64,
    pub lost_targets: u64,
    pub timeouts: u64,
}

impl AttackController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attack cooldown elapsed
    pub fn recall(&self, organism: &mut Organism) {
        if !organism.is_active() {
            return;
        }
        if let Some(state) = organism.attack.as_mut() {
            if *state == AttackState::Cooldown {
                *state = AttackState::Ready;
            }
        }
    }

    /// Ready attackers look for the nearest claimable target in range
    pub fn detect(&mut self, population: &mut Population, clock: &SimClock) -> usize {
        if clock.is_paused() {
            return 0;
        }

        let mut locked = 0;
        for kind in OrganismKind::ALL {
            let Some(config) = population.template(kind).attack.clone() else {
                continue;
            };

            for id in population.registry(kind).snapshot() {
                let Some(attacker) = population.get(id) else {
                    continue;
                };
                if !attacker.is_active() || attacker.attack != Some(AttackState::Ready) {
                    continue;
                }

                let candidates = population.index().query_nearest(
                    attacker.position,
                    attacker.radius() + config.detection_range,
                    |occ| occ.id != id && config.targets.contains(&occ.kind),
                );

                for candidate in candidates {
                    let claimed = population.get_mut(candidate).and_then(|target| {
                        if target.try_claim(id) {
                            target.motion.freeze();
                            Some(target.handle())
                        } else {
                            None
                        }
                    });
                    let Some(target) = claimed else {
                        continue;
                    };

                    if let Some(attacker) = population.get_mut(id) {
                        attacker.attack = Some(AttackState::Locked {
                            target,
                            since: clock.now(),
                        });
                        attacker.motion.chase = Some(target);
                    }
                    population.sync_index(candidate);
                    self.claims += 1;
                    locked += 1;
                    log::trace!("{} {} locked onto {}", kind, id, candidate);
                    break;
                }
            }
        }
        locked
    }

    /// Contact between two organisms: a locked attacker touching its own
    /// target starts attacking
    pub fn on_contact(&mut self, population: &mut Population, clock: &SimClock, a: OrganismId, b: OrganismId) {
        if clock.is_paused() {
            return;
        }
        for (attacker_id, other) in [(a, b), (b, a)] {
            let Some(attacker) = population.get(attacker_id) else {
                continue;
            };
            let Some(AttackState::Locked { target, .. }) = attacker.attack else {
                continue;
            };
            if target.id != other {
                continue;
            }
            let Some(config) = population.template(attacker.kind).attack.clone() else {
                continue;
            };
            let Some(health) = population.resolve(target).filter(|t| t.is_active()).map(|t| t.health) else {
                continue;
            };

            if let Some(attacker) = population.get_mut(attacker_id) {
                attacker.attack = Some(AttackState::Attacking {
                    target,
                    per_hit: per_hit_damage(health, config.attack_time),
                    next_hit_at: clock.now() + config.hit_interval,
                });
                attacker.motion.velocity = Vec2::ZERO;
            }
            log::trace!("Organism {} engaged {}", attacker_id, other);
        }
    }

    /// Land due hits, drop lost or timed-out targets and apply kill policies
    #[allow(clippy::too_many_arguments)]
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        population: &mut Population,
        scheduler: &mut Scheduler,
        clock: &SimClock,
        rng: &mut R,
        arena: &ArenaConfig,
        placement: &PlacementConfig,
    ) -> Vec<AttackReport> {
        let mut reports = Vec::new();
        if clock.is_paused() {
            return reports;
        }
        let now = clock.now();

        for kind in OrganismKind::ALL {
            let Some(config) = population.template(kind).attack.clone() else {
                continue;
            };

            for id in population.registry(kind).snapshot() {
                let Some(attacker) = population.get(id).filter(|o| o.is_active()) else {
                    continue;
                };
                let attacker_handle = attacker.handle();
                let state = attacker.attack;

                match state {
                    Some(AttackState::Locked { target, since }) => {
                        if !population.resolve(target).is_some_and(Organism::is_active) {
                            self.lost_targets += 1;
                            Self::cool_down(population, scheduler, clock, id, &config);
                        } else if now - since >= config.lock_timeout {
                            if let Some(victim) = population.resolve_mut(target) {
                                if victim.release_claim(id) {
                                    victim.motion.unfreeze();
                                }
                            }
                            self.timeouts += 1;
                            log::trace!("Organism {} gave up on {}", id, target.id);
                            Self::cool_down(population, scheduler, clock, id, &config);
                        }
                    }
                    Some(AttackState::Attacking {
                        target,
                        per_hit,
                        mut next_hit_at,
                    }) => {
                        let mut finished = false;
                        while next_hit_at <= now {
                            let Some(victim) = population.resolve(target).filter(|t| t.is_active()) else {
                                // Killed elsewhere
                                self.lost_targets += 1;
                                finished = true;
                                break;
                            };
                            let victim_kind = victim.kind;
                            let position = victim.position;

                            let outcome = population.damage(target, per_hit);
                            self.hits += 1;
                            if outcome.is_kill() {
                                self.kills += 1;
                                let offspring = match config.on_kill {
                                    KillPolicy::Nothing => None,
                                    KillPolicy::Replicate => {
                                        Self::replicate(population, clock, rng, arena, placement, kind, position)
                                    }
                                };
                                reports.push(AttackReport {
                                    attacker: attacker_handle,
                                    victim: target,
                                    victim_kind,
                                    position,
                                    offspring,
                                });
                                log::trace!("{} {} killed {} {}", kind, id, victim_kind, target.id);
                                finished = true;
                                break;
                            }
                            next_hit_at += config.hit_interval;
                        }

                        if finished {
                            Self::cool_down(population, scheduler, clock, id, &config);
                        } else if let Some(attacker) = population.get_mut(id) {
                            attacker.attack = Some(AttackState::Attacking {
                                target,
                                per_hit,
                                next_hit_at,
                            });
                        }
                    }
                    Some(AttackState::Cooldown) | Some(AttackState::Ready) | None => {}
                }
            }
        }

        reports
    }

    fn cool_down(
        population: &mut Population,
        scheduler: &mut Scheduler,
        clock: &SimClock,
        id: OrganismId,
        config: &AttackConfig,
    ) {
        if let Some(attacker) = population.get_mut(id) {
            attacker.attack = Some(AttackState::Cooldown);
            attacker.motion.chase = None;
        }
        scheduler.schedule(id, Timer::AttackRecall, clock.now() + config.cooldown);
    }

    /// Spawn one organism of `kind` where a victim died, or next to it if
    /// that spot is blocked
    fn replicate<R: Rng + ?Sized>(
        population: &mut Population,
        clock: &SimClock,
        rng: &mut R,
        arena: &ArenaConfig,
        placement: &PlacementConfig,
        kind: OrganismKind,
        position: Vec2,
    ) -> Option<OrganismHandle> {
        let size = population.template(kind).size;
        let spot = if is_free(position, size * 0.5, arena, population.index()) {
            Some(position)
        } else {
            find_spawn_position(position, size, arena, population.index(), placement, rng)
        };
        match spot {
            Some(spot) => Some(population.spawn(kind, spot, clock.now())),
            None => {
                log::trace!("No room to replicate {} at ({:.2}, {:.2})", kind, position.x, position.y);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Rig {
        population: Population,
        scheduler: Scheduler,
        clock: SimClock,
        rng: ChaCha8Rng,
        config: Config,
        controller: AttackController,
    }

    impl Rig {
        fn new() -> Self {
            let config = Config::default();
            Self {
                population: Population::new(config.kinds.clone(), config.arena.cell_size),
                scheduler: Scheduler::new(),
                clock: SimClock::new(0.1),
                rng: ChaCha8Rng::seed_from_u64(4),
                config,
                controller: AttackController::new(),
            }
        }

        fn tick(&mut self) -> Vec<AttackReport> {
            self.controller.tick(
                &mut self.population,
                &mut self.scheduler,
                &self.clock,
                &mut self.rng,
                &self.config.arena,
                &self.config.placement,
            )
        }
    }

    #[test]
    fn test_per_hit_damage_rounds_up() {
        assert_eq!(per_hit_damage(50, 5), 10);
        assert_eq!(per_hit_damage(51, 5), 11);
        assert_eq!(per_hit_damage(3, 5), 1);
        assert_eq!(per_hit_damage(10, 0), 10);
    }

    #[test]
    fn test_detect_claims_nearest_target() {
        let mut rig = Rig::new();
        let attacker = rig.population.spawn(OrganismKind::Bacteria, Vec2::new(10.0, 10.0), 0.0);
        let far = rig.population.spawn(OrganismKind::HumanCell, Vec2::new(12.5, 10.0), 0.0);
        let near = rig.population.spawn(OrganismKind::HumanCell, Vec2::new(11.5, 10.0), 0.0);

        assert_eq!(rig.controller.detect(&mut rig.population, &rig.clock), 1);

        let state = rig.population.get(attacker.id).unwrap().attack.unwrap();
        assert_eq!(state.target(), Some(near));
        let target = rig.population.get(near.id).unwrap();
        assert_eq!(target.targeted_by, Some(attacker.id));
        assert!(target.motion.frozen);
        assert!(!rig.population.get(far.id).unwrap().is_targeted());
    }

    #[test]
    fn test_second_attacker_cannot_claim_held_target() {
        let mut rig = Rig::new();
        let first = rig.population.spawn(OrganismKind::Bacteria, Vec2::new(10.0, 10.0), 0.0);
        let second = rig.population.spawn(OrganismKind::Bacteria, Vec2::new(12.0, 10.0), 0.0);
        let target = rig.population.spawn(OrganismKind::HumanCell, Vec2::new(11.0, 10.0), 0.0);

        rig.controller.detect(&mut rig.population, &rig.clock);

        let holders: Vec<OrganismId> = [first.id, second.id]
            .into_iter()
            .filter(|&id| rig.population.get(id).unwrap().attack.unwrap().target() == Some(target))
            .collect();
        assert_eq!(holders.len(), 1);
        assert_eq!(rig.population.get(target.id).unwrap().targeted_by, Some(holders[0]));
        let loser = if holders[0] == first.id { second.id } else { first.id };
        assert_eq!(rig.population.get(loser).unwrap().attack, Some(AttackState::Ready));
    }

    #[test]
    fn test_attack_kills_in_attack_time_hits() {
        let mut rig = Rig::new();
        let attacker = rig.population.spawn(OrganismKind::Bacteria, Vec2::new(10.0, 10.0), 0.0);
        let target = rig.population.spawn(OrganismKind::HumanCell, Vec2::new(10.5, 10.0), 0.0);

        rig.controller.detect(&mut rig.population, &rig.clock);
        rig.controller.on_contact(&mut rig.population, &rig.clock, attacker.id, target.id);
        assert!(matches!(
            rig.population.get(attacker.id).unwrap().attack,
            Some(AttackState::Attacking { .. })
        ));

        let attack_time = rig.config.kinds.bacteria.attack.as_ref().unwrap().attack_time;
        let mut reports = Vec::new();
        for _ in 0..400 {
            rig.clock.advance();
            reports.extend(rig.tick());
            if !reports.is_empty() {
                break;
            }
        }

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].victim, target);
        assert_eq!(rig.controller.hits, attack_time as u64);
        assert!(rig.population.get(target.id).unwrap().is_dissolving());
        assert_eq!(rig.population.get(attacker.id).unwrap().attack, Some(AttackState::Cooldown));
        assert!(rig.scheduler.is_pending(attacker.id, Timer::AttackRecall));
    }

    #[test]
    fn test_target_killed_elsewhere_degrades_to_cooldown() {
        let mut rig = Rig::new();
        let attacker = rig.population.spawn(OrganismKind::Bacteria, Vec2::new(10.0, 10.0), 0.0);
        let target = rig.population.spawn(OrganismKind::HumanCell, Vec2::new(10.5, 10.0), 0.0);
        rig.controller.detect(&mut rig.population, &rig.clock);
        rig.controller.on_contact(&mut rig.population, &rig.clock, attacker.id, target.id);

        rig.population.kill(target.id);
        for _ in 0..20 {
            rig.clock.advance();
            assert!(rig.tick().is_empty());
        }

        assert_eq!(rig.population.get(attacker.id).unwrap().attack, Some(AttackState::Cooldown));
        assert_eq!(rig.controller.lost_targets, 1);
    }

    #[test]
    fn test_dead_attacker_releases_target() {
        let mut rig = Rig::new();
        let attacker = rig.population.spawn(OrganismKind::Bacteria, Vec2::new(10.0, 10.0), 0.0);
        let target = rig.population.spawn(OrganismKind::HumanCell, Vec2::new(11.5, 10.0), 0.0);
        rig.controller.detect(&mut rig.population, &rig.clock);
        assert!(rig.population.get(target.id).unwrap().is_targeted());

        rig.population.kill(attacker.id);

        let target = rig.population.get(target.id).unwrap();
        assert!(!target.is_targeted());
        assert!(!target.motion.frozen);
    }

    #[test]
    fn test_lock_timeout_releases_target() {
        let mut rig = Rig::new();
        let attacker = rig.population.spawn(OrganismKind::Bacteria, Vec2::new(10.0, 10.0), 0.0);
        let target = rig.population.spawn(OrganismKind::HumanCell, Vec2::new(11.5, 10.0), 0.0);
        rig.controller.detect(&mut rig.population, &rig.clock);

        let timeout = rig.config.kinds.bacteria.attack.as_ref().unwrap().lock_timeout;
        while rig.clock.now() < timeout {
            rig.clock.advance();
            rig.tick();
        }

        assert_eq!(rig.controller.timeouts, 1);
        assert!(!rig.population.get(target.id).unwrap().is_targeted());
        assert_eq!(rig.population.get(attacker.id).unwrap().attack, Some(AttackState::Cooldown));
    }

    #[test]
    fn test_virus_replicates_on_kill() {
        let mut rig = Rig::new();
        let virus = rig.population.spawn(OrganismKind::Virus, Vec2::new(10.0, 10.0), 0.0);
        let cell = rig.population.spawn(OrganismKind::HumanCell, Vec2::new(10.3, 10.0), 0.0);
        rig.controller.detect(&mut rig.population, &rig.clock);
        rig.controller.on_contact(&mut rig.population, &rig.clock, virus.id, cell.id);

        let mut reports = Vec::new();
        for _ in 0..400 {
            rig.clock.advance();
            reports.extend(rig.tick());
            if !reports.is_empty() {
                break;
            }
        }

        let offspring = reports[0].offspring.expect("virus should replicate");
        assert_eq!(rig.population.active_count(OrganismKind::Virus), 2);
        assert_eq!(rig.population.get(offspring.id).unwrap().position, Vec2::new(10.3, 10.0));
    }

    #[test]
    fn test_recall_only_from_cooldown() {
        let mut rig = Rig::new();
        let attacker = rig.population.spawn(OrganismKind::Bacteria, Vec2::new(10.0, 10.0), 0.0);
        let org = rig.population.get_mut(attacker.id).unwrap();
        org.attack = Some(AttackState::Cooldown);
        rig.controller.recall(org);
        assert_eq!(org.attack, Some(AttackState::Ready));
    }
}
