//! Population: the organism slab plus the pools, registries and occupancy
//! index that track it.
//!
//! Every transition that changes registry or index membership goes through
//! here, so the three views never disagree:
//! - `Pooled`: in its pool's free list, in no registry, not in the index
//! - `Active`: in its kind's registry and in the index
//! - `Dissolving`: in neither, waiting to return to its pool

use crate::config::KindConfig;
use crate::grid::{Occupant, SpatialIndex};
use crate::kind::{KindMap, OrganismKind};
use crate::mutation::Shield;
use crate::organism::{DamageOutcome, Organism, OrganismHandle, OrganismId};
use crate::pool::OrganismPool;
use crate::registry::Registry;
use glam::Vec2;

/// Organism storage and membership bookkeeping
#[derive(Debug, Clone)]
pub struct Population {
    templates: KindMap<KindConfig>,
    organisms: Vec<Organism>,
    pools: KindMap<OrganismPool>,
    registries: KindMap<Registry>,
    index: SpatialIndex,
    /// Organisms killed since the last drain, in kill order
    killed: Vec<(OrganismId, OrganismKind)>,
    pub births: KindMap<u64>,
    pub deaths: KindMap<u64>,
}

impl Population {
    /// Create the population and warm every pool
    pub fn new(templates: KindMap<KindConfig>, cell_size: f32) -> Self {
        let mut organisms = Vec::new();
        let mut pools = KindMap::from_fn(OrganismPool::new);
        for kind in OrganismKind::ALL {
            let template = &templates[kind];
            pools[kind].warm(&mut organisms, template, template.pool_warmup);
        }
        log::debug!("Warmed pools with {} organisms", organisms.len());

        Self {
            templates,
            organisms,
            pools,
            registries: KindMap::from_fn(|_| Registry::new()),
            index: SpatialIndex::new(cell_size),
            killed: Vec::new(),
            births: KindMap::from_fn(|_| 0),
            deaths: KindMap::from_fn(|_| 0),
        }
    }

    #[inline]
    pub fn template(&self, kind: OrganismKind) -> &KindConfig {
        &self.templates[kind]
    }

    /// Live template access; affects behaviour from the next read on,
    /// not the stats baked into already constructed instances
    pub fn template_mut(&mut self, kind: OrganismKind) -> &mut KindConfig {
        &mut self.templates[kind]
    }

    /// Every constructed organism, pooled ones included
    #[inline]
    pub fn organisms(&self) -> &[Organism] {
        &self.organisms
    }

    #[inline]
    pub fn get(&self, id: OrganismId) -> Option<&Organism> {
        self.organisms.get(id as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, id: OrganismId) -> Option<&mut Organism> {
        self.organisms.get_mut(id as usize)
    }

    /// The organism named by `handle`, if that incarnation is still the
    /// current one
    pub fn resolve(&self, handle: OrganismHandle) -> Option<&Organism> {
        self.get(handle.id).filter(|o| o.incarnation == handle.incarnation)
    }

    pub fn resolve_mut(&mut self, handle: OrganismHandle) -> Option<&mut Organism> {
        self.get_mut(handle.id).filter(|o| o.incarnation == handle.incarnation)
    }

    #[inline]
    pub fn registry(&self, kind: OrganismKind) -> &Registry {
        &self.registries[kind]
    }

    #[inline]
    pub fn pool(&self, kind: OrganismKind) -> &OrganismPool {
        &self.pools[kind]
    }

    /// Current registry size of `kind`
    #[inline]
    pub fn active_count(&self, kind: OrganismKind) -> usize {
        self.registries[kind].len()
    }

    pub fn total_active(&self) -> usize {
        OrganismKind::ALL.iter().map(|&k| self.active_count(k)).sum()
    }

    #[inline]
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Take an instance from the pool of `kind` and bring it to life at
    /// `position`. The position must already have been validated.
    pub fn spawn(&mut self, kind: OrganismKind, position: Vec2, now: f64) -> OrganismHandle {
        let id = self.pools[kind].get(&mut self.organisms, &self.templates[kind]);
        let org = &mut self.organisms[id as usize];
        org.on_spawn(position, now);
        let handle = org.handle();
        let occupant = Occupant {
            id,
            kind,
            position: org.position,
            radius: org.radius(),
            layer: org.layer,
        };

        self.registries[kind].insert(id);
        self.index.insert(occupant);
        self.births[kind] += 1;
        log::trace!("Spawned {} {} at ({:.2}, {:.2})", kind, id, position.x, position.y);
        handle
    }

    /// `Active -> Dissolving`: drop out of the registry and the index, and
    /// let go of any attack claim in either direction.
    /// Returns false if the organism was not active.
    pub fn kill(&mut self, id: OrganismId) -> bool {
        let Some(org) = self.get(id) else {
            return false;
        };
        if !org.is_active() {
            return false;
        }
        let kind = org.kind;
        let held = org.attack.and_then(|a| a.target());
        let claimed_by = org.targeted_by;

        // Release the target this organism was attacking
        if let Some(target) = held {
            if let Some(victim) = self.resolve_mut(target) {
                if victim.release_claim(id) {
                    victim.motion.unfreeze();
                }
            }
        }

        // Its own attacker stops chasing; the attack pass finds the stale
        // handle and cools down
        if let Some(attacker) = claimed_by.and_then(|a| self.get_mut(a)) {
            if attacker.motion.chase.is_some_and(|h| h.id == id) {
                attacker.motion.chase = None;
            }
        }

        if let Some(org) = self.get_mut(id) {
            org.begin_dissolve();
        }
        self.registries[kind].remove(id);
        self.index.remove(id);
        self.killed.push((id, kind));
        self.deaths[kind] += 1;
        log::trace!("{} {} killed", kind, id);
        true
    }

    /// Apply damage to the organism named by `handle`. A stale handle or an
    /// organism that is not active is ignored.
    pub fn damage(&mut self, handle: OrganismHandle, amount: i32) -> DamageOutcome {
        let Some(org) = self.resolve_mut(handle) else {
            return DamageOutcome::Ignored;
        };
        let outcome = org.take_damage(amount);
        match outcome {
            DamageOutcome::Killed { .. } => {
                self.kill(handle.id);
            }
            DamageOutcome::Absorbed { .. } | DamageOutcome::Hit { .. } => self.sync_index(handle.id),
            DamageOutcome::Ignored => {}
        }
        outcome
    }

    /// Change an organism's shield and keep its collider in step.
    /// Returns false if it carries no shield.
    pub fn modify_shield<F: FnOnce(&mut Shield)>(&mut self, id: OrganismId, f: F) -> bool {
        let changed = self.get_mut(id).is_some_and(|org| org.modify_shield(f));
        if changed {
            self.sync_index(id);
        }
        changed
    }

    /// Push an active organism's position and radius into the index
    pub fn sync_index(&mut self, id: OrganismId) {
        if let Some(org) = self.organisms.get(id as usize) {
            if org.is_active() {
                self.index.update(id, org.position, org.radius());
            }
        }
    }

    /// Progress every dissolve. Finished organisms go back to their pool;
    /// their ids are returned.
    pub fn advance_dissolve(&mut self, dt: f32) -> Vec<OrganismId> {
        let mut finished = Vec::new();
        for org in self.organisms.iter_mut() {
            if org.advance_dissolve(dt) {
                self.pools[org.kind].give_back(org);
                finished.push(org.id);
            }
        }
        finished
    }

    /// Organisms killed since the previous call
    pub fn drain_killed(&mut self) -> Vec<(OrganismId, OrganismKind)> {
        std::mem::take(&mut self.killed)
    }
}
