//! Octree spatial partitioning structure
//!
//! Divides 3D space into hierarchical regions for fast bounds queries. Each
//! entry is stored in the deepest node whose bounds fully contain it, so
//! large entries stay high in the tree. Nodes subdivide into 8 octants when
//! they hold more entries than the configured threshold.
//!
//! Entries that do not fit inside the root bounds go to an overflow list
//! that every query also scans.

use serde::{Deserialize, Serialize};

use crate::foundation::collections::ColliderHandle;
use crate::foundation::math::Vec3;
use crate::physics::collision::AABB;

/// Configuration for octree behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
    /// Maximum entries per node before subdivision
    pub max_entities_per_node: usize,

    /// Maximum subdivision depth
    pub max_depth: u32,

    /// Minimum node size (prevents excessive subdivision)
    pub min_node_size: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_entities_per_node: 8,
            max_depth: 8,
            min_node_size: 1.0,
        }
    }
}

/// Entry stored in the octree
#[derive(Debug, Clone, Copy)]
pub struct OctreeEntry {
    /// Collider the bounds belong to
    pub id: ColliderHandle,
    /// World-space bounds
    pub bounds: AABB,
}

/// Single node in the octree hierarchy
#[derive(Debug, Clone)]
pub struct OctreeNode {
    /// World-space bounds of this node
    pub bounds: AABB,

    /// Entries that straddle the child octants (or all entries, if leaf)
    pub entries: Vec<OctreeEntry>,

    /// Child nodes (8 octants), None if this is a leaf
    pub children: Option<Box<[OctreeNode; 8]>>,

    /// Depth in the tree (0 = root)
    pub depth: u32,
}

impl OctreeNode {
    /// Create a new leaf node
    pub fn new(bounds: AABB, depth: u32) -> Self {
        Self {
            bounds,
            entries: Vec::new(),
            children: None,
            depth,
        }
    }

    /// Check if this node is a leaf (has no children)
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    // Octant layout: bit 0 = +X, bit 1 = +Y, bit 2 = +Z
    fn octant_bounds(&self, octant: usize) -> AABB {
        let center = self.bounds.center();
        let quarter = self.bounds.extents() * 0.5;
        let sign = |bit: usize| if octant & bit != 0 { 1.0 } else { -1.0 };
        let child_center = center + Vec3::new(quarter.x * sign(1), quarter.y * sign(2), quarter.z * sign(4));
        AABB::from_center_extents(child_center, quarter)
    }

    /// Child octant that fully contains `bounds`, if any
    fn fitting_octant(&self, bounds: &AABB) -> Option<usize> {
        let center = self.bounds.center();
        let mut octant = 0;
        for (axis, bit) in [(0, 1), (1, 2), (2, 4)] {
            if bounds.min[axis] >= center[axis] {
                octant |= bit;
            } else if bounds.max[axis] >= center[axis] {
                return None;
            }
        }
        Some(octant)
    }

    /// Subdivide this node into 8 children
    fn subdivide(&mut self) {
        if self.children.is_some() {
            return;
        }

        let children: [OctreeNode; 8] =
            std::array::from_fn(|octant| OctreeNode::new(self.octant_bounds(octant), self.depth + 1));
        self.children = Some(Box::new(children));

        // Push down whatever fits in a single octant
        let entries = std::mem::take(&mut self.entries);
        for entry in entries {
            match (self.fitting_octant(&entry.bounds), self.children.as_mut()) {
                (Some(octant), Some(children)) => children[octant].entries.push(entry),
                _ => self.entries.push(entry),
            }
        }
    }

    /// Insert an entry into this node, returns false if it is outside the node
    pub fn insert(&mut self, entry: OctreeEntry, config: &OctreeConfig) -> bool {
        if !self.bounds.contains(&entry.bounds) {
            return false;
        }

        if self.is_leaf() {
            let should_subdivide = self.entries.len() >= config.max_entities_per_node
                && self.depth < config.max_depth
                && self.bounds.extents().x > config.min_node_size;
            if !should_subdivide {
                self.entries.push(entry);
                return true;
            }
            self.subdivide();
        }

        match (self.fitting_octant(&entry.bounds), self.children.as_mut()) {
            (Some(octant), Some(children)) => children[octant].insert(entry, config),
            _ => {
                self.entries.push(entry);
                true
            }
        }
    }

    /// Remove an entry from this node or its children
    pub fn remove(&mut self, id: ColliderHandle) -> bool {
        if let Some(index) = self.entries.iter().position(|e| e.id == id) {
            self.entries.swap_remove(index);
            return true;
        }

        if let Some(ref mut children) = self.children {
            for child in children.iter_mut() {
                if child.remove(id) {
                    return true;
                }
            }
        }

        false
    }

    /// Collect entries whose bounds intersect `query`
    pub fn query_aabb(&self, query: &AABB, results: &mut Vec<OctreeEntry>) {
        if !self.bounds.intersects(query) {
            return;
        }

        results.extend(self.entries.iter().filter(|e| e.bounds.intersects(query)));

        if let Some(ref children) = self.children {
            for child in children.iter() {
                child.query_aabb(query, results);
            }
        }
    }

    /// Collect entries whose bounds the ray enters within `max_distance`
    pub fn query_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32, results: &mut Vec<OctreeEntry>) {
        match self.bounds.intersect_ray(origin, direction) {
            Some(t) if t <= max_distance => {}
            _ => return,
        }

        results.extend(self.entries.iter().filter(|e| {
            e.bounds
                .intersect_ray(origin, direction)
                .map_or(false, |t| t <= max_distance)
        }));

        if let Some(ref children) = self.children {
            for child in children.iter() {
                child.query_ray(origin, direction, max_distance, results);
            }
        }
    }

    /// Get all leaf nodes (for visualization)
    pub fn get_all_leaves<'a>(&'a self, leaves: &mut Vec<&'a OctreeNode>) {
        if self.is_leaf() {
            leaves.push(self);
        } else if let Some(ref children) = self.children {
            for child in children.iter() {
                child.get_all_leaves(leaves);
            }
        }
    }

    /// Count total entries in this node and all children
    pub fn count_entries(&self) -> usize {
        let mut count = self.entries.len();

        if let Some(ref children) = self.children {
            for child in children.iter() {
                count += child.count_entries();
            }
        }

        count
    }
}

/// Octree spatial partitioning structure
#[derive(Debug, Clone)]
pub struct Octree {
    /// Root node containing the configured world space
    pub root: OctreeNode,

    /// Entries outside the root bounds
    overflow: Vec<OctreeEntry>,

    config: OctreeConfig,
}

impl Octree {
    /// Create a new octree with given world bounds
    pub fn new(world_bounds: AABB, config: OctreeConfig) -> Self {
        Self {
            root: OctreeNode::new(world_bounds, 0),
            overflow: Vec::new(),
            config,
        }
    }

    /// Insert an entry, falling back to the overflow list outside the root
    pub fn insert(&mut self, id: ColliderHandle, bounds: AABB) {
        let entry = OctreeEntry { id, bounds };
        if !self.root.insert(entry, &self.config) {
            log::trace!("Collider {:?} outside octree bounds, stored in overflow", id);
            self.overflow.push(entry);
        }
    }

    /// Remove an entry from the octree
    pub fn remove(&mut self, id: ColliderHandle) -> bool {
        if let Some(index) = self.overflow.iter().position(|e| e.id == id) {
            self.overflow.swap_remove(index);
            return true;
        }
        self.root.remove(id)
    }

    /// Entries whose bounds intersect `query`
    pub fn query_aabb(&self, query: &AABB) -> Vec<OctreeEntry> {
        let mut results = Vec::new();
        self.root.query_aabb(query, &mut results);
        results.extend(self.overflow.iter().filter(|e| e.bounds.intersects(query)));
        results
    }

    /// Entries whose bounds a ray enters within `max_distance`
    ///
    /// For actual intersection testing, you still need to test each entry
    /// individually.
    pub fn query_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Vec<OctreeEntry> {
        let mut results = Vec::new();
        self.root.query_ray(origin, direction, max_distance, &mut results);
        results.extend(self.overflow.iter().filter(|e| {
            e.bounds
                .intersect_ray(origin, direction)
                .map_or(false, |t| t <= max_distance)
        }));
        results
    }

    /// Number of entries in the overflow list
    pub fn overflow_count(&self) -> usize {
        self.overflow.len()
    }

    /// Get all leaf nodes (for visualization)
    pub fn get_all_leaves(&self) -> Vec<&OctreeNode> {
        let mut leaves = Vec::new();
        self.root.get_all_leaves(&mut leaves);
        leaves
    }

    /// Get total entry count
    pub fn entity_count(&self) -> usize {
        self.root.count_entries() + self.overflow.len()
    }
}
