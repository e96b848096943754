//! Abstract spatial query interface for broad-phase collision detection
//!
//! The broad phase quickly identifies pairs of colliders that might be
//! touching using a spatial partitioning scheme. This abstraction allows
//! swapping schemes (octree, grid, BVH) without changing the world.

use std::collections::HashMap;

use crate::foundation::collections::ColliderHandle;
use crate::foundation::math::Vec3;
use crate::physics::collision::AABB;

use super::octree::{Octree, OctreeConfig};

/// Abstract interface for spatial partitioning used by the broad phase
pub trait SpatialQuery: Send + Sync {
    /// Insert a collider with its world bounds
    fn insert(&mut self, id: ColliderHandle, bounds: AABB);

    /// Remove a collider from the spatial structure
    fn remove(&mut self, id: ColliderHandle);

    /// Update a collider's bounds
    fn update(&mut self, id: ColliderHandle, bounds: AABB);

    /// Colliders whose bounds intersect `aabb`
    fn query_aabb(&self, aabb: &AABB) -> Vec<ColliderHandle>;

    /// Colliders whose bounds a ray enters within `max_distance`
    fn query_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Vec<ColliderHandle>;

    /// Current bounds of a collider
    fn bounds(&self, id: ColliderHandle) -> Option<AABB>;

    /// Get the number of colliders in the structure
    fn entity_count(&self) -> usize;
}

/// Octree-based implementation of [`SpatialQuery`]
pub struct OctreeSpatialQuery {
    octree: Octree,
    /// Cache of bounds for quick lookups
    bounds_cache: HashMap<ColliderHandle, AABB>,
}

impl OctreeSpatialQuery {
    /// Create a new octree-based spatial query system
    pub fn new(octree: Octree) -> Self {
        Self {
            octree,
            bounds_cache: HashMap::new(),
        }
    }

    /// Build an empty octree over `world_bounds`
    pub fn with_bounds(world_bounds: AABB, config: OctreeConfig) -> Self {
        Self::new(Octree::new(world_bounds, config))
    }

    /// Get a reference to the underlying octree (for visualization, etc.)
    pub fn octree(&self) -> &Octree {
        &self.octree
    }
}

impl SpatialQuery for OctreeSpatialQuery {
    fn insert(&mut self, id: ColliderHandle, bounds: AABB) {
        if self.bounds_cache.insert(id, bounds).is_some() {
            self.octree.remove(id);
        }
        self.octree.insert(id, bounds);
    }

    fn remove(&mut self, id: ColliderHandle) {
        if self.bounds_cache.remove(&id).is_some() {
            self.octree.remove(id);
        }
    }

    fn update(&mut self, id: ColliderHandle, bounds: AABB) {
        // Unchanged bounds keep their node
        if self.bounds_cache.get(&id) == Some(&bounds) {
            return;
        }
        self.insert(id, bounds);
    }

    fn query_aabb(&self, aabb: &AABB) -> Vec<ColliderHandle> {
        self.octree.query_aabb(aabb).into_iter().map(|e| e.id).collect()
    }

    fn query_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Vec<ColliderHandle> {
        self.octree
            .query_ray(origin, direction, max_distance)
            .into_iter()
            .map(|e| e.id)
            .collect()
    }

    fn bounds(&self, id: ColliderHandle) -> Option<AABB> {
        self.bounds_cache.get(&id).copied()
    }

    fn entity_count(&self) -> usize {
        self.bounds_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::SlotMap;

    fn create_test_query() -> OctreeSpatialQuery {
        let bounds = AABB::new(Vec3::new(-100.0, -100.0, -100.0), Vec3::new(100.0, 100.0, 100.0));
        let config = OctreeConfig {
            max_entities_per_node: 2,
            max_depth: 5,
            min_node_size: 5.0,
        };
        OctreeSpatialQuery::with_bounds(bounds, config)
    }

    #[test]
    fn test_update_moves_entry() {
        let mut handles: SlotMap<ColliderHandle, ()> = SlotMap::with_key();
        let mut spatial = create_test_query();
        let id = handles.insert(());
        let unit = Vec3::new(1.0, 1.0, 1.0);

        spatial.insert(id, AABB::from_center_extents(Vec3::zeros(), unit));
        spatial.update(id, AABB::from_center_extents(Vec3::new(40.0, 0.0, 0.0), unit));

        assert_eq!(spatial.entity_count(), 1);
        assert_eq!(spatial.octree().entity_count(), 1);
        assert!(spatial.query_aabb(&AABB::from_center_extents(Vec3::zeros(), unit)).is_empty());
        assert_eq!(
            spatial.query_aabb(&AABB::from_center_extents(Vec3::new(40.0, 0.0, 0.0), unit)),
            vec![id]
        );
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut handles: SlotMap<ColliderHandle, ()> = SlotMap::with_key();
        let mut spatial = create_test_query();
        spatial.remove(handles.insert(()));
        assert_eq!(spatial.entity_count(), 0);
    }
}
