//! Attachment to a host scene graph
//!
//! Colliders may be tagged with the [`EntityId`] of the scene entity that
//! owns them. [`crate::physics::World::update_with_scene`] reads the
//! transforms of non-dynamic colliders from a [`TransformStore`] before
//! stepping and writes dynamic transforms back afterwards.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::foundation::math::Transform;

/// Caller-owned entity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// World transforms of scene entities
pub trait TransformStore {
    /// Current world transform of `entity`
    fn transform(&self, entity: EntityId) -> Option<Transform>;

    /// Overwrite the world transform of `entity`
    fn set_transform(&mut self, entity: EntityId, transform: Transform);
}

impl TransformStore for HashMap<EntityId, Transform> {
    fn transform(&self, entity: EntityId) -> Option<Transform> {
        self.get(&entity).copied()
    }

    fn set_transform(&mut self, entity: EntityId, transform: Transform) {
        self.insert(entity, transform);
    }
}

impl TransformStore for BTreeMap<EntityId, Transform> {
    fn transform(&self, entity: EntityId) -> Option<Transform> {
        self.get(&entity).copied()
    }

    fn set_transform(&mut self, entity: EntityId, transform: Transform) {
        self.insert(entity, transform);
    }
}
