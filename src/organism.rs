//! Organism structure and lifecycle state machine.
//!
//! An organism is constructed once by its pool and never destroyed. It cycles
//! `Pooled -> Spawning -> Active -> Dissolving -> Pooled` indefinitely; every
//! trip through `on_spawn` starts a new incarnation, which invalidates any
//! [`OrganismHandle`] taken during the previous one.

use crate::attack::AttackState;
use crate::config::KindConfig;
use crate::duplication::DuplicationState;
use crate::kind::{Layer, OrganismKind};
use crate::locomotion::Motion;
use crate::mutation::{ConjugationState, Shield};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Slab index of an organism, stable for the life of the world
pub type OrganismId = u32;

/// Reference to one incarnation of a pooled organism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganismHandle {
    pub id: OrganismId,
    pub incarnation: u32,
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Spawning,
    Active,
    Dissolving,
    Pooled,
}

/// Result of applying damage to an organism
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// The shield soaked up all of it
    Absorbed { shield: i32 },
    /// Core health was reduced, organism survives
    Hit { dealt: i32, health: i32 },
    /// Health reached zero, organism started dissolving
    Killed { dealt: i32 },
    /// Target is not active (pooled, dissolving or stale handle)
    Ignored,
}

impl DamageOutcome {
    #[inline]
    pub fn is_kill(&self) -> bool {
        matches!(self, DamageOutcome::Killed { .. })
    }
}

/// A pooled organism
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Organism {
    // Identity
    pub id: OrganismId,
    pub kind: OrganismKind,
    pub incarnation: u32,
    pub state: LifecycleState,

    // Physical state
    pub position: Vec2,
    pub health: i32,
    pub max_health: i32,
    /// Body diameter; the collider radius is half of it. Read by placement
    /// and attack range, always in step with the shield.
    pub size: f32,
    pub base_size: f32,
    pub max_size: f32,
    pub layer: Layer,
    pub collision_enabled: bool,
    pub motion: Motion,

    // Dissolve animation progress in [0, 1]
    pub dissolve_value: f32,
    pub dissolve_duration: f32,

    // Kind-specific behaviour
    pub shield: Option<Shield>,
    size_per_shield_health: f32,
    pub duplication: Option<DuplicationState>,
    pub conjugation: Option<ConjugationState>,
    pub attack: Option<AttackState>,

    /// Attacker currently holding the exclusive claim on this organism
    pub targeted_by: Option<OrganismId>,

    // Time of the current incarnation's spawn
    pub spawned_at: f64,
}

impl Organism {
    /// Construct a pooled instance from its kind template
    pub fn new(id: OrganismId, kind: OrganismKind, template: &KindConfig) -> Self {
        Self {
            id,
            kind,
            incarnation: 0,
            state: LifecycleState::Pooled,
            position: Vec2::ZERO,
            health: 0,
            max_health: template.max_health,
            size: template.size,
            base_size: template.size,
            max_size: template.max_size,
            layer: template.layer(kind),
            collision_enabled: false,
            motion: Motion::default(),
            dissolve_value: 0.0,
            dissolve_duration: template.dissolve_duration,
            shield: template.shield.as_ref().map(|_| Shield::new()),
            size_per_shield_health: template
                .shield
                .as_ref()
                .map(|s| s.size_per_shield_health)
                .unwrap_or(0.0),
            duplication: template.duplication.as_ref().map(|_| DuplicationState::default()),
            conjugation: template.shield.as_ref().map(|_| ConjugationState::default()),
            attack: template.attack.as_ref().map(|_| AttackState::Ready),
            targeted_by: None,
            spawned_at: 0.0,
        }
    }

    /// Handle naming the current incarnation
    #[inline]
    pub fn handle(&self) -> OrganismHandle {
        OrganismHandle {
            id: self.id,
            incarnation: self.incarnation,
        }
    }

    /// Bring a pooled instance back to life at an already validated position
    pub fn on_spawn(&mut self, position: Vec2, now: f64) {
        debug_assert_eq!(self.state, LifecycleState::Pooled, "spawning a live organism");
        self.state = LifecycleState::Spawning;

        self.incarnation = self.incarnation.wrapping_add(1);
        self.position = position;
        self.health = self.max_health;
        if let Some(shield) = self.shield.as_mut() {
            shield.reset();
        }
        self.refresh_size();
        self.collision_enabled = true;
        self.motion = Motion::default();
        self.dissolve_value = 0.0;
        self.targeted_by = None;
        self.spawned_at = now;

        if let Some(dup) = self.duplication.as_mut() {
            *dup = DuplicationState::default();
        }
        if let Some(conj) = self.conjugation.as_mut() {
            *conj = ConjugationState::default();
        }
        if let Some(attack) = self.attack.as_mut() {
            *attack = AttackState::Ready;
        }

        self.state = LifecycleState::Active;
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    #[inline]
    pub fn is_dissolving(&self) -> bool {
        self.state == LifecycleState::Dissolving
    }

    #[inline]
    pub fn is_pooled(&self) -> bool {
        self.state == LifecycleState::Pooled
    }

    /// Apply damage: the shield absorbs first, overflow reaches core health.
    ///
    /// Only the state change happens here; registry and index bookkeeping for
    /// a kill is done by [`crate::population::Population::kill`].
    pub fn take_damage(&mut self, amount: i32) -> DamageOutcome {
        if !self.is_active() || amount <= 0 {
            return DamageOutcome::Ignored;
        }

        let mut core = amount;
        if let Some(shield) = self.shield.as_mut() {
            if shield.health() > 0 {
                core = shield.absorb(amount);
                self.refresh_size();
                if core == 0 {
                    return DamageOutcome::Absorbed {
                        shield: self.shield_health(),
                    };
                }
            }
        }

        self.damage_core(core)
    }

    /// Reduce core health directly, bypassing any shield
    pub fn damage_core(&mut self, amount: i32) -> DamageOutcome {
        if !self.is_active() {
            return DamageOutcome::Ignored;
        }
        let dealt = amount.min(self.health);
        self.health -= dealt;
        if self.health <= 0 {
            self.health = 0;
            DamageOutcome::Killed { dealt }
        } else {
            DamageOutcome::Hit {
                dealt,
                health: self.health,
            }
        }
    }

    /// `Active -> Dissolving`. Returns false if the organism was not active.
    pub fn begin_dissolve(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state = LifecycleState::Dissolving;
        self.collision_enabled = false;
        self.motion = Motion::default();
        self.dissolve_value = 0.0;
        self.targeted_by = None;
        if let Some(attack) = self.attack.as_mut() {
            *attack = AttackState::Cooldown;
        }
        true
    }

    /// Progress the dissolve animation. Returns true once it has completed.
    pub fn advance_dissolve(&mut self, dt: f32) -> bool {
        if !self.is_dissolving() {
            return false;
        }
        let step = if self.dissolve_duration > 0.0 {
            dt / self.dissolve_duration
        } else {
            1.0
        };
        self.dissolve_value = (self.dissolve_value + step).min(1.0);
        self.dissolve_value >= 1.0
    }

    /// Mark as returned to the pool
    pub fn deactivate(&mut self) {
        self.state = LifecycleState::Pooled;
        self.collision_enabled = false;
        self.motion = Motion::default();
        self.targeted_by = None;
    }

    /// Current shield health, zero for organisms without a shield
    #[inline]
    pub fn shield_health(&self) -> i32 {
        self.shield.as_ref().map(Shield::health).unwrap_or(0)
    }

    /// Change the shield and recompute size in the same step.
    /// Returns false if this organism carries no shield.
    pub fn modify_shield<F: FnOnce(&mut Shield)>(&mut self, f: F) -> bool {
        match self.shield.as_mut() {
            Some(shield) => {
                f(shield);
                self.refresh_size();
                true
            }
            None => false,
        }
    }

    /// Recompute the effective radius from the shield
    pub fn refresh_size(&mut self) {
        let grown = self.base_size + self.shield_health() as f32 * self.size_per_shield_health;
        self.size = grown.min(self.max_size.max(self.base_size));
    }

    /// Claim this organism as the exclusive target of `attacker`
    pub fn try_claim(&mut self, attacker: OrganismId) -> bool {
        if !self.is_active() || self.targeted_by.is_some() {
            return false;
        }
        self.targeted_by = Some(attacker);
        true
    }

    /// Drop the claim held by `attacker`. Returns false if it held none.
    pub fn release_claim(&mut self, attacker: OrganismId) -> bool {
        if self.targeted_by == Some(attacker) {
            self.targeted_by = None;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn is_targeted(&self) -> bool {
        self.targeted_by.is_some()
    }

    /// Collider radius
    #[inline]
    pub fn radius(&self) -> f32 {
        self.size * 0.5
    }

    #[inline]
    pub fn distance_to(&self, other: &Organism) -> f32 {
        self.position.distance(other.position)
    }

    /// Physical contact: colliders overlap or touch
    #[inline]
    pub fn touches(&self, other: &Organism) -> bool {
        self.distance_to(other) <= self.radius() + other.radius()
    }
}
