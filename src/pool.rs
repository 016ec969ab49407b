//! Object pool of pre-constructed organisms of one kind.
//!
//! Storage lives in the population slab; the pool owns the ids of every
//! instance currently parked in it. A miss grows the pool by exactly one
//! instance instead of failing.

use crate::config::KindConfig;
use crate::kind::OrganismKind;
use crate::organism::{Organism, OrganismId};

/// Free list for one organism kind
#[derive(Debug, Clone)]
pub struct OrganismPool {
    kind: OrganismKind,
    free: Vec<OrganismId>,
    constructed: usize,
}

impl OrganismPool {
    pub fn new(kind: OrganismKind) -> Self {
        Self {
            kind,
            free: Vec::new(),
            constructed: 0,
        }
    }

    #[inline]
    pub fn kind(&self) -> OrganismKind {
        self.kind
    }

    /// Instances waiting in the free list
    #[inline]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Instances this pool has ever constructed
    #[inline]
    pub fn constructed(&self) -> usize {
        self.constructed
    }

    fn construct(&mut self, slab: &mut Vec<Organism>, template: &KindConfig) -> OrganismId {
        let id = slab.len() as OrganismId;
        slab.push(Organism::new(id, self.kind, template));
        self.constructed += 1;
        id
    }

    /// Pre-construct `count` pooled instances
    pub fn warm(&mut self, slab: &mut Vec<Organism>, template: &KindConfig, count: usize) {
        self.free.reserve(count);
        for _ in 0..count {
            let id = self.construct(slab, template);
            self.free.push(id);
        }
    }

    /// Hand out a pooled instance, constructing one if the free list is empty.
    /// The instance is still `Pooled`; the caller spawns it.
    pub fn get(&mut self, slab: &mut Vec<Organism>, template: &KindConfig) -> OrganismId {
        match self.free.pop() {
            Some(id) => id,
            None => {
                let id = self.construct(slab, template);
                log::trace!("{} pool grew to {} instances", self.kind, self.constructed);
                id
            }
        }
    }

    /// Take an instance back. Must be called at most once per dissolve cycle.
    pub fn give_back(&mut self, organism: &mut Organism) {
        debug_assert_eq!(organism.kind, self.kind, "returned to the wrong pool");
        debug_assert!(!self.free.contains(&organism.id), "organism returned twice");
        organism.deactivate();
        self.free.push(organism.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_empty_pool_constructs_on_miss() {
        let template = KindConfig::human_cell();
        let mut slab = Vec::new();
        let mut pool = OrganismPool::new(OrganismKind::HumanCell);

        let id = pool.get(&mut slab, &template);

        assert_eq!(pool.constructed(), 1);
        assert_eq!(pool.available(), 0);
        assert!(slab[id as usize].is_pooled());
    }

    #[test]
    fn test_warm_pool_reuses_instances() {
        let template = KindConfig::bacteria();
        let mut slab = Vec::new();
        let mut pool = OrganismPool::new(OrganismKind::Bacteria);
        pool.warm(&mut slab, &template, 4);

        let id = pool.get(&mut slab, &template);
        assert_eq!(pool.constructed(), 4);
        assert_eq!(pool.available(), 3);
        assert_eq!(slab.len(), 4);

        slab[id as usize].on_spawn(Vec2::new(1.0, 1.0), 0.0);
        slab[id as usize].begin_dissolve();
        pool.give_back(&mut slab[id as usize]);

        assert_eq!(pool.available(), 4);
        assert!(slab[id as usize].is_pooled());
    }
}
