//! Compound shapes
//!
//! A dynamic body owns every collider nested under it. At build time their
//! scaled shapes are gathered into one [`CompoundShape`] posed relative to the
//! body, and the body collides and integrates as a single rigid unit.

use crate::foundation::collections::ColliderHandle;
use crate::foundation::math::{Iso, Vec3};

use super::primitives::AABB;
use super::shape::{MassProperties, Shape};

/// One child of a compound
#[derive(Debug, Clone)]
pub struct CompoundPart {
    /// Shape with the child's scale baked in
    pub shape: Shape,
    /// Pose relative to the compound root
    pub local: Iso,
    /// Collider the part was built from
    pub source: ColliderHandle,
}

/// Rigid group of posed shapes
#[derive(Debug, Clone, Default)]
pub struct CompoundShape {
    parts: Vec<CompoundPart>,
    aabb: Option<AABB>,
}

impl CompoundShape {
    /// Gather parts into a compound
    pub fn new(parts: Vec<CompoundPart>) -> Self {
        let aabb = parts
            .iter()
            .map(|p| p.shape.local_aabb().transformed(&p.local))
            .reduce(|a, b| a.union(&b));
        Self { parts, aabb }
    }

    /// Parts in build order
    pub fn parts(&self) -> &[CompoundPart] {
        &self.parts
    }

    /// Whether no part was gathered
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Bounds relative to the root
    pub fn local_aabb(&self) -> AABB {
        self.aabb
            .unwrap_or_else(|| AABB::from_center_extents(Vec3::zeros(), Vec3::zeros()))
    }

    /// Summed mass properties about the root origin
    pub fn mass_properties(&self, density: f32) -> MassProperties {
        self.parts.iter().fold(MassProperties::zero(), |acc, part| {
            let rotation = part.local.rotation.to_rotation_matrix().into_inner();
            let props = part
                .shape
                .mass_properties(density)
                .transformed(&rotation, &part.local.translation.vector);
            acc.combined(&props)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Translation3};
    use approx::assert_relative_eq;
    use slotmap::SlotMap;

    #[test]
    fn test_two_spheres_combine_mass_and_bounds() {
        let mut handles: SlotMap<ColliderHandle, ()> = SlotMap::with_key();
        let part = |x: f32, source| CompoundPart {
            shape: Shape::sphere(1.0),
            local: Iso::from_parts(Translation3::new(x, 0.0, 0.0), Quat::identity()),
            source,
        };
        let compound = CompoundShape::new(vec![part(-2.0, handles.insert(())), part(2.0, handles.insert(()))]);

        let single = Shape::sphere(1.0).mass_properties(1.0);
        let props = compound.mass_properties(1.0);
        assert_relative_eq!(props.mass, single.mass * 2.0, epsilon = 1e-4);
        assert_relative_eq!(props.center_of_mass, Vec3::zeros(), epsilon = 1e-5);
        assert_relative_eq!(props.inertia[(1, 1)], 2.0 * (single.inertia[(1, 1)] + single.mass * 4.0), epsilon = 1e-3);
        assert_relative_eq!(compound.local_aabb().max, Vec3::new(3.0, 1.0, 1.0), epsilon = 1e-5);
    }
}
