//! Live-membership registries, one per organism kind.

use crate::organism::OrganismId;
use std::collections::BTreeSet;

/// Set of active organisms of one kind.
///
/// Ordered by id so a seeded run visits organisms in the same order every
/// time; callers must not rely on any particular order beyond that.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    members: BTreeSet<OrganismId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if already registered
    pub fn insert(&mut self, id: OrganismId) -> bool {
        self.members.insert(id)
    }

    /// Returns false if not registered
    pub fn remove(&mut self, id: OrganismId) -> bool {
        self.members.remove(&id)
    }

    #[inline]
    pub fn contains(&self, id: OrganismId) -> bool {
        self.members.contains(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = OrganismId> + '_ {
        self.members.iter().copied()
    }

    /// Copy of the current members, for passes that mutate the population
    pub fn snapshot(&self) -> Vec<OrganismId> {
        self.members.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership() {
        let mut registry = Registry::new();
        assert!(registry.insert(3));
        assert!(!registry.insert(3));
        assert!(registry.insert(1));
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(3));
        assert!(!registry.remove(3));
        assert!(!registry.contains(3));
        assert_eq!(registry.snapshot(), vec![1]);
    }
}
