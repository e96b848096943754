//! Spatial partitioning data structures
//!
//! Provides spatial indexing of collider bounds for the broad phase and for
//! query culling.

mod octree;
pub mod spatial_query;

pub use octree::{Octree, OctreeConfig, OctreeEntry, OctreeNode};
pub use spatial_query::{OctreeSpatialQuery, SpatialQuery};
