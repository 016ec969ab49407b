//! Commands for driving the world from outside the tick loop.

use crate::kind::OrganismKind;
use crate::organism::{DamageOutcome, OrganismHandle};
use crate::world::SpawnOutcome;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Commands accepted by [`crate::world::World::apply`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldCommand {
    /// Pause the simulation
    Pause,
    /// Resume the simulation
    Resume,
    /// Execute a single step
    Step,
    /// Spawn one organism at a position
    SpawnAt { kind: OrganismKind, position: Vec2 },
    /// Damage from an outer-game weapon
    Damage { target: OrganismHandle, amount: i32 },
    /// Set the global mutation probability
    SetMutationProbability(f64),
    /// Add to the global mutation probability
    BumpMutationProbability(f64),
    /// Stop every organism from duplicating
    StopAllDuplication,
    /// Lift a previous stop
    ResumeAllDuplication,
}

/// What a command did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandResult {
    Done,
    Stepped { tick: u64 },
    Spawned(SpawnOutcome),
    Damaged(DamageOutcome),
}

/// Current simulation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SimState {
    /// Simulation is running
    Running,
    /// Simulation is paused
    #[default]
    Paused,
    /// The game has been decided
    Stopped,
}
