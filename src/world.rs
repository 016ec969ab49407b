//! World simulation engine - main simulation loop.

use crate::attack::AttackController;
use crate::commands::{CommandResult, SimState, WorldCommand};
use crate::config::Config;
use crate::duplication::DuplicationController;
use crate::events::{GameObserver, OutcomeTracker, WorldEvent};
use crate::kind::{KindMap, OrganismKind};
use crate::locomotion::{contact_pairs, step_motion};
use crate::mutation::MutationController;
use crate::organism::{DamageOutcome, OrganismHandle, OrganismId};
use crate::placement::find_free_position;
use crate::population::Population;
use crate::scheduler::{SimClock, Scheduler, Timer};
use crate::stats::{Stats, StatsHistory};
use glam::Vec2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

/// Result of asking the world for a new organism
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    Spawned(OrganismHandle),
    /// The body would stick out of the arena
    OutOfBounds,
    /// The scatter search found no free spot
    NoRoom,
}

impl SpawnOutcome {
    pub fn handle(&self) -> Option<OrganismHandle> {
        match *self {
            SpawnOutcome::Spawned(handle) => Some(handle),
            SpawnOutcome::OutOfBounds | SpawnOutcome::NoRoom => None,
        }
    }
}

/// The simulation world
pub struct World {
    // Population
    pub population: Population,

    // Time
    pub clock: SimClock,
    pub scheduler: Scheduler,

    // Configuration
    pub config: Config,

    // Controllers
    pub duplication: DuplicationController,
    pub mutation: MutationController,
    pub attack: AttackController,
    outcome: OutcomeTracker,
    events: Vec<WorldEvent>,

    // Statistics
    pub stats: Stats,
    pub stats_history: StatsHistory,

    // Random number generator (seeded for reproducibility)
    rng: ChaCha8Rng,
    seed: u64,

    // Wall clock at the last history record, for steps per second
    last_record: (Instant, u64),
}

impl World {
    /// Create a new world with the given configuration. Uses the configured
    /// seed when there is one.
    pub fn new(config: Config) -> Self {
        let seed = config.simulation.seed.unwrap_or_else(|| rand::thread_rng().gen());
        Self::new_with_seed(config, seed)
    }

    /// Create a new world with a specific seed for reproducibility
    pub fn new_with_seed(config: Config, seed: u64) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(seed);
        let population = Population::new(config.kinds.clone(), config.arena.cell_size);

        let mut world = Self {
            population,
            clock: SimClock::new(config.simulation.dt),
            scheduler: Scheduler::new(),
            duplication: DuplicationController::new(),
            mutation: MutationController::new(&config.mutation),
            attack: AttackController::new(),
            outcome: OutcomeTracker::new(config.outcome.clone()),
            events: Vec::new(),
            stats: Stats::new(),
            stats_history: StatsHistory::new(config.logging.stats_interval),
            config,
            rng,
            seed,
            last_record: (Instant::now(), 0),
        };

        // Scatter the initial population
        for kind in OrganismKind::ALL {
            let wanted = world.config.simulation.initial_population[kind];
            let placed = (0..wanted)
                .filter(|_| world.spawn_random(kind).handle().is_some())
                .count();
            if placed < wanted {
                log::warn!("Placed only {}/{} initial {}", placed, wanted, kind);
            }
        }
        world.outcome.observe(&world.counts());
        world.update_stats();

        log::info!(
            "World created with seed {} ({} organisms)",
            seed,
            world.population.total_active()
        );
        world
    }

    /// Main simulation step. Does nothing while paused.
    pub fn step(&mut self) {
        if !self.clock.advance() {
            return;
        }
        let dt = self.clock.dt() as f32;

        // Phase 1: Fire due cooldowns
        self.fire_timers();

        // Phase 2: Movement
        step_motion(&mut self.population, dt, &self.config.arena, &mut self.rng);

        // Phase 3: Contacts (conjugation, attack engagement)
        for (a, b) in contact_pairs(&self.population) {
            self.mutation
                .on_contact(&mut self.population, &mut self.scheduler, &self.clock, &mut self.rng, a, b);
            self.attack.on_contact(&mut self.population, &self.clock, a, b);
        }

        // Phase 4: Attacks
        self.attack.detect(&mut self.population, &self.clock);
        let reports = self.attack.tick(
            &mut self.population,
            &mut self.scheduler,
            &self.clock,
            &mut self.rng,
            &self.config.arena,
            &self.config.placement,
        );
        for offspring in reports.iter().filter_map(|r| r.offspring) {
            self.on_spawned(offspring.id);
        }

        // Phase 5: Spontaneous mutation
        self.mutation.tick(&mut self.population, &self.clock, &mut self.rng);

        // Phase 6: Duplication
        self.duplication.tick(
            &mut self.population,
            &mut self.scheduler,
            &self.clock,
            &mut self.rng,
            &self.config.arena,
            &self.config.placement,
        );

        // Phase 7: Deaths and dissolves
        self.reap_killed();
        self.population.advance_dissolve(dt);

        // Phase 8: Outcome rules
        self.check_outcome();

        // Phase 9: Statistics
        self.update_stats();
    }

    fn fire_timers(&mut self) {
        for (id, timer) in self.scheduler.drain_due(self.clock.now()) {
            let Some(org) = self.population.get_mut(id) else {
                continue;
            };
            if !org.is_active() {
                continue;
            }
            match timer {
                Timer::DuplicationRecall => self.duplication.recall(org),
                Timer::ConjugationRecall => self.mutation.recall(org),
                Timer::AttackRecall => self.attack.recall(org),
            }
        }
    }

    /// Start the spawn-time cooldowns of a new organism and mark its kind
    /// as present for the outcome rules
    fn on_spawned(&mut self, id: OrganismId) {
        if let Some(org) = self.population.get(id) {
            self.outcome.note_spawn(org.kind);
        }
        self.duplication
            .on_spawned(&mut self.population, &mut self.scheduler, &self.clock, &mut self.rng, id);
    }

    /// Cancel the timers of everything killed since the last call
    fn reap_killed(&mut self) {
        for (id, _) in self.population.drain_killed() {
            self.scheduler.cancel_all(id);
        }
    }

    fn counts(&self) -> KindMap<usize> {
        KindMap::from_fn(|kind| self.population.active_count(kind))
    }

    fn check_outcome(&mut self) {
        let counts = self.counts();
        let events = self.outcome.observe(&counts);
        let decided = events
            .iter()
            .any(|e| matches!(e, WorldEvent::GameOver | WorldEvent::PlayerWon));
        self.events.extend(events);

        if decided && self.outcome.freeze_on_outcome() && !self.duplication.is_frozen() {
            self.stop_all_duplication();
        }
    }

    /// Update statistics
    fn update_stats(&mut self) {
        self.stats.time = self.clock.tick();
        self.stats.sim_time = self.clock.now();
        self.stats.mutation_probability = self.mutation.probability();
        self.stats.attack_kills = self.attack.kills;
        self.stats.update(&self.population);

        // Record history
        let tick = self.clock.tick();
        if tick % self.config.logging.stats_interval.max(1) == 0 {
            let (since, from_tick) = self.last_record;
            let elapsed = since.elapsed().as_secs_f32();
            if tick > from_tick && elapsed > 0.0 {
                self.stats.steps_per_second = (tick - from_tick) as f32 / elapsed;
            }
            self.last_record = (Instant::now(), tick);
            self.stats_history.record(self.stats.clone());
        }
    }

    /// Spawn `kind` at an exact position. Overlap is not checked; the body
    /// only has to fit inside the arena.
    pub fn spawn_at(&mut self, kind: OrganismKind, position: Vec2) -> SpawnOutcome {
        let radius = self.population.template(kind).size * 0.5;
        if !self.config.arena.contains_circle(position, radius) {
            return SpawnOutcome::OutOfBounds;
        }
        let handle = self.population.spawn(kind, position, self.clock.now());
        self.on_spawned(handle.id);
        SpawnOutcome::Spawned(handle)
    }

    /// Spawn `kind` at a random free spot
    pub fn spawn_random(&mut self, kind: OrganismKind) -> SpawnOutcome {
        let size = self.population.template(kind).size;
        match find_free_position(
            size,
            &self.config.arena,
            self.population.index(),
            &self.config.placement,
            &mut self.rng,
        ) {
            Some(position) => self.spawn_at(kind, position),
            None => SpawnOutcome::NoRoom,
        }
    }

    /// External damage (weapons). A kill is reported to the outer game.
    pub fn damage(&mut self, target: OrganismHandle, amount: i32) -> DamageOutcome {
        let kind = self.population.resolve(target).map(|o| o.kind);
        let outcome = self.population.damage(target, amount);
        if outcome.is_kill() {
            if let Some(kind) = kind {
                self.events.push(WorldEvent::KillCounted(kind));
            }
            self.reap_killed();
            self.check_outcome();
        }
        outcome
    }

    /// Number of active organisms of `kind`
    pub fn active_count(&self, kind: OrganismKind) -> usize {
        self.population.active_count(kind)
    }

    /// Get current population count
    pub fn population(&self) -> usize {
        self.population.total_active()
    }

    pub fn set_global_mutation_probability(&mut self, value: f64) {
        self.mutation.set_probability(value);
    }

    /// Raise the global mutation probability, e.g. after antibiotic use
    pub fn bump_global_mutation_probability(&mut self, delta: f64) {
        self.mutation.bump_probability(delta);
    }

    pub fn global_mutation_probability(&self) -> f64 {
        self.mutation.probability()
    }

    pub fn stop_all_duplication(&mut self) {
        self.duplication.stop_all(&mut self.population, &mut self.scheduler);
    }

    pub fn resume_all_duplication(&mut self) {
        self.duplication
            .resume_all(&mut self.population, &mut self.scheduler, &self.clock, &mut self.rng);
    }

    /// Freeze simulation time: no cooldown or dissolve makes progress
    pub fn pause(&mut self) {
        self.clock.set_paused(true);
        log::debug!("Paused at tick {}", self.clock.tick());
    }

    pub fn resume(&mut self) {
        self.clock.set_paused(false);
        log::debug!("Resumed at tick {}", self.clock.tick());
    }

    pub fn state(&self) -> SimState {
        if self.outcome.decided().is_some() {
            SimState::Stopped
        } else if self.clock.is_paused() {
            SimState::Paused
        } else {
            SimState::Running
        }
    }

    /// `GameOver` or `PlayerWon` once the game is decided
    pub fn outcome(&self) -> Option<WorldEvent> {
        self.outcome.decided()
    }

    /// Apply one command from outside the tick loop
    pub fn apply(&mut self, command: WorldCommand) -> CommandResult {
        match command {
            WorldCommand::Pause => self.pause(),
            WorldCommand::Resume => self.resume(),
            WorldCommand::Step => {
                self.step();
                return CommandResult::Stepped {
                    tick: self.clock.tick(),
                };
            }
            WorldCommand::SpawnAt { kind, position } => {
                return CommandResult::Spawned(self.spawn_at(kind, position));
            }
            WorldCommand::Damage { target, amount } => {
                return CommandResult::Damaged(self.damage(target, amount));
            }
            WorldCommand::SetMutationProbability(value) => self.set_global_mutation_probability(value),
            WorldCommand::BumpMutationProbability(delta) => self.bump_global_mutation_probability(delta),
            WorldCommand::StopAllDuplication => self.stop_all_duplication(),
            WorldCommand::ResumeAllDuplication => self.resume_all_duplication(),
        }
        CommandResult::Done
    }

    /// Events raised since the last drain
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Hand every pending event to `observer`
    pub fn dispatch_events<O: GameObserver + ?Sized>(&mut self, observer: &mut O) {
        for event in self.drain_events() {
            observer.notify(event);
        }
    }

    /// Run simulation for specified number of steps
    pub fn run(&mut self, steps: u64) {
        for _ in 0..steps {
            self.step();
        }
    }

    /// Run simulation with callback for progress updates
    pub fn run_with_callback<F>(&mut self, steps: u64, mut callback: F)
    where
        F: FnMut(&World, u64),
    {
        for i in 0..steps {
            self.step();
            callback(self, i);
        }
    }

    /// Current tick
    pub fn time(&self) -> u64 {
        self.clock.tick()
    }

    /// Get seed for reproducibility
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventTally;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.simulation.initial_population = KindMap {
            bacteria: 4,
            human_cell: 10,
            virus: 2,
        };
        config
    }

    fn empty_config() -> Config {
        let mut config = Config::default();
        config.simulation.initial_population = KindMap::default();
        config
    }

    #[test]
    fn test_world_creation() {
        let config = test_config();
        let world = World::new_with_seed(config, 1);

        assert_eq!(world.active_count(OrganismKind::Bacteria), 4);
        assert_eq!(world.active_count(OrganismKind::HumanCell), 10);
        assert_eq!(world.active_count(OrganismKind::Virus), 2);
        assert_eq!(world.time(), 0);
    }

    #[test]
    fn test_world_run() {
        let mut world = World::new_with_seed(test_config(), 2);
        world.run(100);
        assert_eq!(world.time(), 100);
    }

    #[test]
    fn test_reproducibility() {
        let mut world1 = World::new_with_seed(test_config(), 42);
        let mut world2 = World::new_with_seed(test_config(), 42);

        world1.run(300);
        world2.run(300);

        for kind in OrganismKind::ALL {
            assert_eq!(world1.active_count(kind), world2.active_count(kind));
        }
        let positions = |w: &World| -> Vec<Vec2> {
            w.population.organisms().iter().map(|o| o.position).collect()
        };
        assert_eq!(positions(&world1), positions(&world2));
    }

    #[test]
    fn test_pause_freezes_time_and_dissolve() {
        let mut world = World::new_with_seed(empty_config(), 3);
        let cell = world.spawn_at(OrganismKind::HumanCell, Vec2::new(10.0, 10.0)).handle().unwrap();
        world.spawn_at(OrganismKind::HumanCell, Vec2::new(30.0, 30.0));
        world.damage(cell, 1_000);

        world.pause();
        assert_eq!(world.state(), SimState::Paused);
        world.run(50);
        assert_eq!(world.time(), 0);
        assert_eq!(world.population.get(cell.id).unwrap().dissolve_value, 0.0);

        world.resume();
        world.run(5);
        assert_eq!(world.time(), 5);
        assert!(world.population.get(cell.id).unwrap().dissolve_value > 0.0);
    }

    #[test]
    fn test_external_kill_is_counted() {
        let mut world = World::new_with_seed(empty_config(), 4);
        let bacteria = world.spawn_at(OrganismKind::Bacteria, Vec2::new(10.0, 10.0)).handle().unwrap();
        world.spawn_at(OrganismKind::HumanCell, Vec2::new(30.0, 30.0));
        world.run(1);
        world.drain_events();

        let outcome = world.damage(bacteria, 1_000);
        assert!(outcome.is_kill());

        let mut tally = EventTally::default();
        world.dispatch_events(&mut tally);
        assert_eq!(tally.kills.bacteria, 1);
        assert!(tally.extinct.contains(&OrganismKind::Bacteria));
        assert!(tally.player_won);
        assert_eq!(world.state(), SimState::Stopped);
        assert!(world.duplication.is_frozen());
    }

    #[test]
    fn test_kill_before_first_step_announces_extinction() {
        let mut world = World::new_with_seed(empty_config(), 9);
        world.spawn_at(OrganismKind::Bacteria, Vec2::new(60.0, 50.0));
        let cell = world.spawn_at(OrganismKind::HumanCell, Vec2::new(10.0, 10.0)).handle().unwrap();

        assert!(world.damage(cell, 1_000).is_kill());

        let mut tally = EventTally::default();
        world.dispatch_events(&mut tally);
        assert_eq!(tally.kills.human_cell, 1);
        assert_eq!(tally.extinct, vec![OrganismKind::HumanCell]);
        assert!(tally.game_over);
        assert_eq!(world.outcome(), Some(WorldEvent::GameOver));
    }

    #[test]
    fn test_losing_last_cell_is_game_over() {
        let mut world = World::new_with_seed(empty_config(), 5);
        let cell = world.spawn_at(OrganismKind::HumanCell, Vec2::new(10.0, 10.0)).handle().unwrap();
        world.spawn_at(OrganismKind::Bacteria, Vec2::new(60.0, 50.0));
        world.run(1);

        world.damage(cell, 1_000);
        assert_eq!(world.outcome(), Some(WorldEvent::GameOver));
        assert!(world.drain_events().contains(&WorldEvent::GameOver));
    }

    #[test]
    fn test_history_records_speed() {
        let mut config = test_config();
        config.logging.stats_interval = 5;
        let mut world = World::new_with_seed(config, 10);
        world.run(20);

        let last = world.stats_history.snapshots.last().unwrap();
        assert_eq!(last.time, 20);
        assert!(last.steps_per_second > 0.0);
    }

    #[test]
    fn test_spawn_outside_arena_refused() {
        let mut world = World::new_with_seed(empty_config(), 6);
        assert_eq!(
            world.spawn_at(OrganismKind::Bacteria, Vec2::new(-5.0, 10.0)),
            SpawnOutcome::OutOfBounds
        );
        assert_eq!(world.population(), 0);
    }

    #[test]
    fn test_stop_all_duplication_holds_population() {
        let mut config = empty_config();
        config.kinds.human_cell.duplication = Some(crate::duplication::DuplicationConfig {
            min_proba: 1.0,
            max_proba: 1.0,
            soft_cap: 5,
            cooldown: 0.1,
        });
        config.outcome.freeze_on_outcome = false;
        let mut world = World::new_with_seed(config, 7);
        world.spawn_at(OrganismKind::HumanCell, Vec2::new(40.0, 30.0));

        world.stop_all_duplication();
        world.run(200);
        assert_eq!(world.active_count(OrganismKind::HumanCell), 1);

        world.resume_all_duplication();
        world.run(200);
        assert!(world.active_count(OrganismKind::HumanCell) > 1);
    }

    #[test]
    fn test_commands() {
        let mut world = World::new_with_seed(empty_config(), 8);
        let result = world.apply(WorldCommand::SpawnAt {
            kind: OrganismKind::Virus,
            position: Vec2::new(5.0, 5.0),
        });
        let CommandResult::Spawned(SpawnOutcome::Spawned(virus)) = result else {
            panic!("spawn failed: {:?}", result);
        };

        world.apply(WorldCommand::SetMutationProbability(0.2));
        world.apply(WorldCommand::BumpMutationProbability(0.1));
        assert!((world.global_mutation_probability() - 0.3).abs() < 1e-12);

        assert_eq!(world.apply(WorldCommand::Step), CommandResult::Stepped { tick: 1 });
        let damaged = world.apply(WorldCommand::Damage {
            target: virus,
            amount: 3,
        });
        assert!(matches!(damaged, CommandResult::Damaged(DamageOutcome::Hit { dealt: 3, .. })));
    }
}
