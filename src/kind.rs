//! Organism kinds, collision layers and per-kind storage.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// The three organism kinds living in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganismKind {
    Bacteria,
    HumanCell,
    Virus,
}

impl OrganismKind {
    /// Every kind, in registry order
    pub const ALL: [OrganismKind; 3] = [
        OrganismKind::Bacteria,
        OrganismKind::HumanCell,
        OrganismKind::Virus,
    ];

    /// Collision layer an organism of this kind occupies by default
    pub fn layer(&self) -> Layer {
        match self {
            OrganismKind::Bacteria => Layer::BACTERIA,
            OrganismKind::HumanCell => Layer::HUMAN_CELL,
            OrganismKind::Virus => Layer::VIRUS,
        }
    }

    /// Get display name
    pub fn name(&self) -> &'static str {
        match self {
            OrganismKind::Bacteria => "bacteria",
            OrganismKind::HumanCell => "human cell",
            OrganismKind::Virus => "virus",
        }
    }
}

impl std::fmt::Display for OrganismKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Collision layer bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layer(pub u32);

impl Layer {
    pub const NONE: Layer = Layer(0);
    pub const BACTERIA: Layer = Layer(1 << 0);
    pub const HUMAN_CELL: Layer = Layer(1 << 1);
    pub const VIRUS: Layer = Layer(1 << 2);
    /// Occupants on this layer never block a spawn
    pub const NON_BLOCKING: Layer = Layer(1 << 3);
    pub const ALL: Layer = Layer(u32::MAX);

    /// True if any bit of `other` is set in this mask
    #[inline]
    pub fn intersects(self, other: Layer) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn union(self, other: Layer) -> Layer {
        Layer(self.0 | other.0)
    }

    /// This mask with every bit of `other` cleared
    #[inline]
    pub fn without(self, other: Layer) -> Layer {
        Layer(self.0 & !other.0)
    }
}

/// One value per organism kind.
///
/// Serialized as a map with `bacteria`, `human_cell` and `virus` keys so it
/// reads naturally in YAML configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindMap<T> {
    pub bacteria: T,
    pub human_cell: T,
    pub virus: T,
}

impl<T> KindMap<T> {
    /// Build a map by evaluating `f` for every kind
    pub fn from_fn<F: FnMut(OrganismKind) -> T>(mut f: F) -> Self {
        Self {
            bacteria: f(OrganismKind::Bacteria),
            human_cell: f(OrganismKind::HumanCell),
            virus: f(OrganismKind::Virus),
        }
    }

    /// Iterate `(kind, value)` pairs in registry order
    pub fn iter(&self) -> impl Iterator<Item = (OrganismKind, &T)> {
        OrganismKind::ALL.into_iter().map(move |kind| (kind, &self[kind]))
    }

    pub fn map<U, F: FnMut(&T) -> U>(&self, mut f: F) -> KindMap<U> {
        KindMap::from_fn(|kind| f(&self[kind]))
    }
}

impl<T> Index<OrganismKind> for KindMap<T> {
    type Output = T;

    fn index(&self, kind: OrganismKind) -> &T {
        match kind {
            OrganismKind::Bacteria => &self.bacteria,
            OrganismKind::HumanCell => &self.human_cell,
            OrganismKind::Virus => &self.virus,
        }
    }
}

impl<T> IndexMut<OrganismKind> for KindMap<T> {
    fn index_mut(&mut self, kind: OrganismKind) -> &mut T {
        match kind {
            OrganismKind::Bacteria => &mut self.bacteria,
            OrganismKind::HumanCell => &mut self.human_cell,
            OrganismKind::Virus => &mut self.virus,
        }
    }
}
