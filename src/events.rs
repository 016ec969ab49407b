//! Outer-game notifications and the default win/lose rules.

use crate::kind::{KindMap, OrganismKind};
use serde::{Deserialize, Serialize};

/// Something the outer game wants to hear about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// The registry of a kind just dropped to zero
    PopulationExtinct(OrganismKind),
    /// An organism of this kind was killed by external damage
    KillCounted(OrganismKind),
    GameOver,
    PlayerWon,
}

/// Receiver for world events. Every method defaults to a no-op.
pub trait GameObserver {
    fn on_population_extinct(&mut self, _kind: OrganismKind) {}

    fn increment_kill_count(&mut self, _kind: OrganismKind) {}

    fn game_over(&mut self) {}

    fn player_won(&mut self) {}

    /// Route one event to the matching callback
    fn notify(&mut self, event: WorldEvent) {
        match event {
            WorldEvent::PopulationExtinct(kind) => self.on_population_extinct(kind),
            WorldEvent::KillCounted(kind) => self.increment_kill_count(kind),
            WorldEvent::GameOver => self.game_over(),
            WorldEvent::PlayerWon => self.player_won(),
        }
    }
}

/// Which extinctions end the game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeConfig {
    /// Any of these going extinct is a loss
    pub lose_kinds: Vec<OrganismKind>,
    /// All of these extinct is a win
    pub win_kinds: Vec<OrganismKind>,
    /// Stop all duplication once the game is decided
    pub freeze_on_outcome: bool,
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        Self {
            lose_kinds: vec![OrganismKind::HumanCell],
            win_kinds: vec![OrganismKind::Bacteria, OrganismKind::Virus],
            freeze_on_outcome: true,
        }
    }
}

/// Watches registry sizes tick to tick and raises extinction and outcome
/// events on transitions
#[derive(Debug, Clone)]
pub struct OutcomeTracker {
    config: OutcomeConfig,
    alive: KindMap<bool>,
    decided: Option<WorldEvent>,
}

impl OutcomeTracker {
    pub fn new(config: OutcomeConfig) -> Self {
        Self {
            config,
            alive: KindMap::default(),
            decided: None,
        }
    }

    /// A kind gained a member outside the tick loop; its next drop to zero
    /// counts as an extinction
    pub fn note_spawn(&mut self, kind: OrganismKind) {
        self.alive[kind] = true;
    }

    /// `GameOver` or `PlayerWon` once reached
    pub fn decided(&self) -> Option<WorldEvent> {
        self.decided
    }

    #[inline]
    pub fn freeze_on_outcome(&self) -> bool {
        self.config.freeze_on_outcome
    }

    /// Compare against the previous counts. Extinction fires only for kinds
    /// that had members before; the outcome fires at most once.
    pub fn observe(&mut self, counts: &KindMap<usize>) -> Vec<WorldEvent> {
        let mut events = Vec::new();
        let mut extinct_now = Vec::new();

        for kind in OrganismKind::ALL {
            let alive = counts[kind] > 0;
            if self.alive[kind] && !alive {
                events.push(WorldEvent::PopulationExtinct(kind));
                extinct_now.push(kind);
                log::debug!("{} population extinct", kind);
            }
            self.alive[kind] = alive;
        }

        if self.decided.is_none() && !extinct_now.is_empty() {
            let lost = extinct_now.iter().any(|k| self.config.lose_kinds.contains(k));
            let won = !self.config.win_kinds.is_empty()
                && self.config.win_kinds.iter().all(|&k| counts[k] == 0)
                && extinct_now.iter().any(|k| self.config.win_kinds.contains(k));

            let outcome = if lost {
                Some(WorldEvent::GameOver)
            } else if won {
                Some(WorldEvent::PlayerWon)
            } else {
                None
            };
            if let Some(outcome) = outcome {
                log::info!("Outcome decided: {:?}", outcome);
                self.decided = Some(outcome);
                events.push(outcome);
            }
        }

        events
    }
}

/// Observer that just counts what it hears
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTally {
    pub extinct: Vec<OrganismKind>,
    pub kills: KindMap<u64>,
    pub game_over: bool,
    pub player_won: bool,
}

impl GameObserver for EventTally {
    fn on_population_extinct(&mut self, kind: OrganismKind) {
        self.extinct.push(kind);
    }

    fn increment_kill_count(&mut self, kind: OrganismKind) {
        self.kills[kind] += 1;
    }

    fn game_over(&mut self) {
        self.game_over = true;
    }

    fn player_won(&mut self) {
        self.player_won = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(bacteria: usize, human_cell: usize, virus: usize) -> KindMap<usize> {
        KindMap {
            bacteria,
            human_cell,
            virus,
        }
    }

    #[test]
    fn test_extinction_fires_once_on_transition() {
        let mut tracker = OutcomeTracker::new(OutcomeConfig::default());
        assert!(tracker.observe(&counts(3, 5, 1)).is_empty());

        let events = tracker.observe(&counts(3, 5, 0));
        assert_eq!(events, vec![WorldEvent::PopulationExtinct(OrganismKind::Virus)]);
        assert!(tracker.observe(&counts(3, 5, 0)).is_empty());
    }

    #[test]
    fn test_losing_human_cells_is_game_over() {
        let mut tracker = OutcomeTracker::new(OutcomeConfig::default());
        tracker.observe(&counts(3, 1, 1));

        let events = tracker.observe(&counts(3, 0, 1));
        assert!(events.contains(&WorldEvent::GameOver));
        assert_eq!(tracker.decided(), Some(WorldEvent::GameOver));

        // Decided once
        tracker.observe(&counts(0, 0, 0));
        assert_eq!(tracker.decided(), Some(WorldEvent::GameOver));
    }

    #[test]
    fn test_clearing_every_pathogen_wins() {
        let mut tracker = OutcomeTracker::new(OutcomeConfig::default());
        tracker.observe(&counts(2, 4, 1));

        assert!(!tracker.observe(&counts(0, 4, 1)).contains(&WorldEvent::PlayerWon));
        let events = tracker.observe(&counts(0, 4, 0));
        assert!(events.contains(&WorldEvent::PlayerWon));
    }

    #[test]
    fn test_noted_spawn_counts_toward_extinction() {
        let mut tracker = OutcomeTracker::new(OutcomeConfig::default());
        assert!(tracker.observe(&counts(1, 0, 0)).is_empty());

        tracker.note_spawn(OrganismKind::HumanCell);
        let events = tracker.observe(&counts(1, 0, 0));
        assert_eq!(
            events,
            vec![WorldEvent::PopulationExtinct(OrganismKind::HumanCell), WorldEvent::GameOver]
        );
    }

    #[test]
    fn test_tally_routes_events() {
        let mut tally = EventTally::default();
        tally.notify(WorldEvent::KillCounted(OrganismKind::Bacteria));
        tally.notify(WorldEvent::KillCounted(OrganismKind::Bacteria));
        tally.notify(WorldEvent::PopulationExtinct(OrganismKind::Virus));
        tally.notify(WorldEvent::PlayerWon);

        assert_eq!(tally.kills.bacteria, 2);
        assert_eq!(tally.extinct, vec![OrganismKind::Virus]);
        assert!(tally.player_won && !tally.game_over);
    }
}
