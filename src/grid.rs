//! Spatial occupancy index for overlap and neighbor queries.
//!
//! Continuous 2D positions are bucketed into square cells. Every occupant is
//! a circle on one collision layer; queries return the ids whose circle
//! overlaps the query circle.

use crate::kind::{Layer, OrganismKind};
use crate::organism::OrganismId;
use glam::Vec2;
use std::collections::HashMap;

/// Slack below which two circles count as touching rather than overlapping
pub const OVERLAP_EPSILON: f32 = 1e-4;

/// A collidable circle registered in the index
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Occupant {
    pub id: OrganismId,
    pub kind: OrganismKind,
    pub position: Vec2,
    pub radius: f32,
    pub layer: Layer,
}

/// Bucket grid over the arena
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    cell_size: f32,
    /// cells[(cx, cy)] holds the ids whose center lies in that bucket
    cells: HashMap<(i32, i32), Vec<OrganismId>>,
    occupants: HashMap<OrganismId, (Occupant, (i32, i32))>,
    max_radius: f32,
}

impl SpatialIndex {
    /// Create a new index with the given bucket size
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            cells: HashMap::new(),
            occupants: HashMap::new(),
            max_radius: 0.0,
        }
    }

    #[inline]
    fn bucket(&self, position: Vec2) -> (i32, i32) {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.cells.clear();
        self.occupants.clear();
        self.max_radius = 0.0;
    }

    /// Insert an occupant, replacing any previous entry with the same id
    pub fn insert(&mut self, occupant: Occupant) {
        self.remove(occupant.id);

        let bucket = self.bucket(occupant.position);
        self.cells.entry(bucket).or_insert_with(|| Vec::with_capacity(4)).push(occupant.id);
        self.occupants.insert(occupant.id, (occupant, bucket));
        self.max_radius = self.max_radius.max(occupant.radius);
    }

    /// Move and resize an occupant already in the index
    pub fn update(&mut self, id: OrganismId, position: Vec2, radius: f32) {
        if let Some(&(occupant, _)) = self.occupants.get(&id) {
            self.insert(Occupant {
                position,
                radius,
                ..occupant
            });
        }
    }

    /// Remove an occupant. Returns true if it was present.
    pub fn remove(&mut self, id: OrganismId) -> bool {
        let Some((_, bucket)) = self.occupants.remove(&id) else {
            return false;
        };
        if let Some(ids) = self.cells.get_mut(&bucket) {
            if let Some(pos) = ids.iter().position(|&other| other == id) {
                ids.swap_remove(pos);
            }
            if ids.is_empty() {
                self.cells.remove(&bucket);
            }
        }
        true
    }

    #[inline]
    pub fn get(&self, id: OrganismId) -> Option<&Occupant> {
        self.occupants.get(&id).map(|(occupant, _)| occupant)
    }

    #[inline]
    pub fn contains(&self, id: OrganismId) -> bool {
        self.occupants.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    /// Visit every occupant whose center could lie within `reach` of `center`
    fn for_each_candidate<F: FnMut(&Occupant)>(&self, center: Vec2, reach: f32, mut visit: F) {
        let min = self.bucket(center - Vec2::splat(reach));
        let max = self.bucket(center + Vec2::splat(reach));
        for cy in min.1..=max.1 {
            for cx in min.0..=max.0 {
                if let Some(ids) = self.cells.get(&(cx, cy)) {
                    for id in ids {
                        if let Some((occupant, _)) = self.occupants.get(id) {
                            visit(occupant);
                        }
                    }
                }
            }
        }
    }

    /// Occupants on `mask` whose circle strictly overlaps the query circle,
    /// sorted by id
    pub fn query_occupancy(&self, position: Vec2, radius: f32, mask: Layer) -> Vec<OrganismId> {
        let mut results = Vec::new();
        self.for_each_candidate(position, radius + self.max_radius, |occ| {
            if mask.intersects(occ.layer)
                && occ.position.distance(position) + OVERLAP_EPSILON < radius + occ.radius
            {
                results.push(occ.id);
            }
        });
        results.sort_unstable();
        results
    }

    /// True if any occupant on `mask` overlaps the query circle
    pub fn is_occupied(&self, position: Vec2, radius: f32, mask: Layer) -> bool {
        !self.query_occupancy(position, radius, mask).is_empty()
    }

    /// Occupants whose circle touches the query circle and that pass `filter`,
    /// nearest first (ties broken by id)
    pub fn query_nearest<F: Fn(&Occupant) -> bool>(
        &self,
        position: Vec2,
        radius: f32,
        filter: F,
    ) -> Vec<OrganismId> {
        let mut found: Vec<(f32, OrganismId)> = Vec::new();
        self.for_each_candidate(position, radius + self.max_radius, |occ| {
            let distance = occ.position.distance(position);
            if distance <= radius + occ.radius && filter(occ) {
                found.push((distance, occ.id));
            }
        });
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        found.into_iter().map(|(_, id)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupant(id: OrganismId, x: f32, y: f32, radius: f32, layer: Layer) -> Occupant {
        Occupant {
            id,
            kind: OrganismKind::Bacteria,
            position: Vec2::new(x, y),
            radius,
            layer,
        }
    }

    #[test]
    fn test_insert_and_remove() {
        let mut index = SpatialIndex::new(2.0);
        index.insert(occupant(0, 1.0, 1.0, 0.5, Layer::BACTERIA));
        index.insert(occupant(1, 1.5, 1.0, 0.5, Layer::BACTERIA));

        assert_eq!(index.len(), 2);
        assert!(index.remove(0));
        assert!(!index.remove(0));
        assert!(!index.contains(0));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_query_occupancy_overlap() {
        let mut index = SpatialIndex::new(2.0);
        index.insert(occupant(0, 10.0, 10.0, 0.5, Layer::BACTERIA));
        index.insert(occupant(1, 20.0, 20.0, 0.5, Layer::BACTERIA)); // Far away

        assert_eq!(index.query_occupancy(Vec2::new(10.8, 10.0), 0.5, Layer::ALL), vec![0]);
        // Touching exactly is not an overlap
        assert!(index.query_occupancy(Vec2::new(11.0, 10.0), 0.5, Layer::ALL).is_empty());
    }

    #[test]
    fn test_query_respects_layer_mask() {
        let mut index = SpatialIndex::new(2.0);
        index.insert(occupant(0, 5.0, 5.0, 1.0, Layer::NON_BLOCKING));

        let mask = Layer::ALL.without(Layer::NON_BLOCKING);
        assert!(!index.is_occupied(Vec2::new(5.0, 5.0), 1.0, mask));
        assert!(index.is_occupied(Vec2::new(5.0, 5.0), 1.0, Layer::ALL));
    }

    #[test]
    fn test_large_occupant_found_across_buckets() {
        let mut index = SpatialIndex::new(1.0);
        index.insert(occupant(0, 0.5, 0.5, 4.0, Layer::BACTERIA));

        assert!(index.is_occupied(Vec2::new(4.0, 0.5), 0.1, Layer::ALL));
    }

    #[test]
    fn test_update_moves_occupant() {
        let mut index = SpatialIndex::new(2.0);
        index.insert(occupant(0, 1.0, 1.0, 0.5, Layer::BACTERIA));
        index.update(0, Vec2::new(30.0, 30.0), 0.5);

        assert!(!index.is_occupied(Vec2::new(1.0, 1.0), 0.5, Layer::ALL));
        assert!(index.is_occupied(Vec2::new(30.0, 30.0), 0.5, Layer::ALL));
    }

    #[test]
    fn test_query_nearest_sorted() {
        let mut index = SpatialIndex::new(2.0);
        index.insert(occupant(0, 13.0, 10.0, 0.5, Layer::BACTERIA));
        index.insert(occupant(1, 11.0, 10.0, 0.5, Layer::BACTERIA));
        index.insert(occupant(2, 12.0, 10.0, 0.5, Layer::VIRUS));

        let all = index.query_nearest(Vec2::new(10.0, 10.0), 3.0, |_| true);
        assert_eq!(all, vec![1, 2, 0]);

        let bacteria = index.query_nearest(Vec2::new(10.0, 10.0), 3.0, |o| o.layer == Layer::BACTERIA);
        assert_eq!(bacteria, vec![1, 0]);
    }
}
