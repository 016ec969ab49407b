//! Locomotion: wandering, chasing, freezing and contact detection.

use crate::config::ArenaConfig;
use crate::organism::{OrganismHandle, OrganismId};
use crate::placement::random_heading;
use crate::population::Population;
use glam::Vec2;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Overlap a chaser allows itself when closing on its target
const CONTACT_SLACK: f32 = 1e-3;

/// Movement state of one organism
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub velocity: Vec2,
    /// Held in place by an attacker's claim
    pub frozen: bool,
    /// Target being approached
    pub chase: Option<OrganismHandle>,
}

impl Motion {
    /// Stop and hold position
    pub fn freeze(&mut self) {
        self.frozen = true;
        self.velocity = Vec2::ZERO;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }
}

/// Move every active organism one tick. Chasers head for their target,
/// everything else wanders; bodies bounce off the arena walls.
pub fn step_motion<R: Rng + ?Sized>(
    population: &mut Population,
    dt: f32,
    arena: &ArenaConfig,
    rng: &mut R,
) {
    // Chase destinations are read before anything moves
    let destinations: Vec<(OrganismId, Option<(Vec2, f32)>)> = population
        .organisms()
        .iter()
        .filter(|o| o.is_active() && o.motion.chase.is_some())
        .map(|o| {
            let goal = o
                .motion
                .chase
                .and_then(|handle| population.resolve(handle))
                .filter(|target| target.is_active())
                .map(|target| (target.position, target.radius()));
            (o.id, goal)
        })
        .collect();

    for (id, goal) in destinations {
        let speed = match population.get(id) {
            Some(org) => population.template(org.kind).speed,
            None => continue,
        };
        let Some(org) = population.get_mut(id) else {
            continue;
        };
        match goal {
            Some((target, target_radius)) => {
                let offset = target - org.position;
                let gap = offset.length() - org.radius() - target_radius;
                org.motion.velocity = if gap <= 0.0 {
                    Vec2::ZERO
                } else {
                    // Close the gap with a hair of overlap so contact registers
                    let step = (speed * dt).min(gap + CONTACT_SLACK);
                    offset.normalize_or_zero() * (step / dt.max(f32::EPSILON))
                };
            }
            None => org.motion.chase = None,
        }
    }

    let ids: Vec<OrganismId> = population
        .organisms()
        .iter()
        .filter(|o| o.is_active())
        .map(|o| o.id)
        .collect();

    for id in ids {
        let (speed, turn_chance) = match population.get(id) {
            Some(org) => {
                let template = population.template(org.kind);
                (template.speed, template.wander_turn_chance)
            }
            None => continue,
        };
        let Some(org) = population.get_mut(id) else {
            continue;
        };
        if org.motion.frozen {
            org.motion.velocity = Vec2::ZERO;
        } else if org.motion.chase.is_none() && speed > 0.0 {
            let stalled = org.motion.velocity == Vec2::ZERO;
            if stalled || rng.gen::<f32>() < turn_chance {
                org.motion.velocity = random_heading(rng) * speed;
            }
        }

        // Bounce even when standing still: a growing shield can push a body
        // past the wall
        let radius = org.radius();
        let (position, velocity) = arena.bounce(org.position + org.motion.velocity * dt, org.motion.velocity, radius);
        org.motion.velocity = velocity;
        if position != org.position {
            org.position = position;
            population.sync_index(id);
        }
    }
}

/// Every pair of active, collidable organisms in physical contact, as
/// `(lower id, higher id)` sorted ascending.
///
/// The neighbour scan only reads, so it runs in parallel; the result order
/// does not depend on thread scheduling.
pub fn contact_pairs(population: &Population) -> Vec<(OrganismId, OrganismId)> {
    let index = population.index();

    let mut pairs: Vec<(OrganismId, OrganismId)> = population
        .organisms()
        .par_iter()
        .filter(|o| o.is_active() && o.collision_enabled)
        .flat_map_iter(|org| {
            index
                .query_nearest(org.position, org.radius(), |occ| occ.id > org.id)
                .into_iter()
                .filter(|&other| {
                    population
                        .get(other)
                        .is_some_and(|o| o.is_active() && o.collision_enabled && org.touches(o))
                })
                .map(move |other| (org.id, other))
                .collect::<Vec<_>>()
        })
        .collect();

    pairs.sort_unstable();
    pairs
}
