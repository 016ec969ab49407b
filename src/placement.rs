//! Spatial placement: bounded search for a free spot to spawn into.

use crate::config::ArenaConfig;
use crate::grid::SpatialIndex;
use crate::kind::Layer;
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Placement search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Candidate positions tried before giving up
    pub tries: u32,
    /// Gap kept between parent and child, and added to the clearance radius
    pub margin: f32,
    /// Tries per organism when scattering the initial population
    pub initial_tries: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            tries: 3,
            margin: 0.1,
            initial_tries: 30,
        }
    }
}

/// Layers that block a spawn
#[inline]
pub fn blocking_mask() -> Layer {
    Layer::ALL.without(Layer::NON_BLOCKING)
}

/// Uniformly random unit vector
pub fn random_heading<R: Rng + ?Sized>(rng: &mut R) -> Vec2 {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    Vec2::new(angle.cos(), angle.sin())
}

/// True if a body of `size` fits at `position` without overlapping a
/// blocking occupant or leaving the arena
pub fn is_free(position: Vec2, clearance: f32, arena: &ArenaConfig, index: &SpatialIndex) -> bool {
    arena.contains_circle(position, clearance) && !index.is_occupied(position, clearance, blocking_mask())
}

/// Look for a spot next to a parent of `size` at `origin`.
///
/// Each try picks a fresh random heading at distance `size + margin` and
/// checks a clearance of `size / 2 + margin`. Returns `None` once every try
/// has failed; the caller abandons the spawn.
pub fn find_spawn_position<R: Rng + ?Sized>(
    origin: Vec2,
    size: f32,
    arena: &ArenaConfig,
    index: &SpatialIndex,
    config: &PlacementConfig,
    rng: &mut R,
) -> Option<Vec2> {
    let offset = size + config.margin;
    let clearance = size * 0.5 + config.margin;

    (0..config.tries)
        .map(|_| origin + random_heading(rng) * offset)
        .find(|&candidate| is_free(candidate, clearance, arena, index))
}

/// Scatter search: a uniformly random free spot anywhere in the arena
pub fn find_free_position<R: Rng + ?Sized>(
    size: f32,
    arena: &ArenaConfig,
    index: &SpatialIndex,
    config: &PlacementConfig,
    rng: &mut R,
) -> Option<Vec2> {
    let clearance = size * 0.5 + config.margin;
    (0..config.initial_tries)
        .map(|_| arena.random_point(clearance, rng))
        .find(|&candidate| is_free(candidate, clearance, arena, index))
}
