//! Colliders
//!
//! A collider binds a shape, matter and filter to a world transform. A
//! collider with a [`Body`] is simulated when the body is dynamic; without
//! one it is static and only moves when the caller moves it.
//!
//! The authored shape is kept unscaled. Its scaled copy is rebuilt whenever
//! the shape or the transform's scale changes, and that copy is what the
//! collision pipeline sees.

use crate::foundation::collections::ColliderHandle;
use crate::foundation::math::{Iso, Transform, Vec3};
use crate::physics::collision::{CompoundShape, Shape, AABB};

use super::body::{Body, BodyDesc};
use super::collision_layers::{clamp_layer, Layer};
use super::filter::{ColliderKinds, Filter, FilterCandidate};
use super::matter::Matter;
use super::scene::EntityId;

/// Collider creation parameters
#[derive(Debug, Clone)]
pub struct ColliderDesc {
    /// Collision shape, unscaled
    pub shape: Shape,
    /// Surface; `None` uses the world default
    pub matter: Option<Matter>,
    /// Filter; `None` uses the world default
    pub filter: Option<Filter>,
    /// Collision layer
    pub layer: Layer,
    /// Only report overlaps, never push
    pub intangible: bool,
    /// World transform
    pub transform: Transform,
    /// Parent collider for compound merging
    pub parent: Option<ColliderHandle>,
    /// Scene entity tag
    pub entity: Option<EntityId>,
    /// Body component
    pub body: Option<BodyDesc>,
}

impl ColliderDesc {
    /// Static collider with `shape` at the origin
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            matter: None,
            filter: None,
            layer: 0,
            intangible: false,
            transform: Transform::identity(),
            parent: None,
            entity: None,
            body: None,
        }
    }

    /// Dynamic body with `shape` at the origin
    pub fn dynamic(shape: Shape) -> Self {
        Self::new(shape).with_body(BodyDesc::default())
    }

    /// Set the world transform
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Set the world position
    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    /// Set the matter
    #[must_use]
    pub fn with_matter(mut self, matter: Matter) -> Self {
        self.matter = Some(matter);
        self
    }

    /// Set the filter
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the layer, clamped into range
    #[must_use]
    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = clamp_layer(layer);
        self
    }

    /// Make the collider intangible
    #[must_use]
    pub fn intangible(mut self, intangible: bool) -> Self {
        self.intangible = intangible;
        self
    }

    /// Nest under another collider
    #[must_use]
    pub fn with_parent(mut self, parent: ColliderHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Tag with a scene entity
    #[must_use]
    pub fn with_entity(mut self, entity: EntityId) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Attach a body
    #[must_use]
    pub fn with_body(mut self, body: BodyDesc) -> Self {
        self.body = Some(body);
        self
    }
}

/// A shape placed in a world
#[derive(Debug, Clone)]
pub struct Collider {
    shape: Shape,
    scaled_shape: Shape,
    pub(crate) matter: Option<Matter>,
    pub(crate) filter: Option<Filter>,
    pub(crate) layer: Layer,
    pub(crate) intangible: bool,
    pub(crate) transform: Transform,
    pub(crate) linear_velocity: Vec3,
    pub(crate) angular_velocity: Vec3,
    pub(crate) parent: Option<ColliderHandle>,
    pub(crate) entity: Option<EntityId>,
    pub(crate) body: Option<Body>,

    /// Bumped on every discontinuous transform change
    pub(crate) transform_version: u64,
    /// Pose a non-dynamic collider moves to during the next step
    pub(crate) kinematic_target: Option<Iso>,
    /// Merged shape when this collider is a compound root
    pub(crate) compound: Option<CompoundShape>,
    /// Compound root this collider is merged into
    pub(crate) merged_into: Option<ColliderHandle>,
    /// Pose relative to the compound root
    pub(crate) local_to_root: Iso,
    /// Whether the compound root this collider is merged into is dynamic
    pub(crate) root_dynamic: bool,
}

impl Collider {
    pub(crate) fn new(desc: ColliderDesc) -> Self {
        let scaled_shape = desc.shape.scaled(&desc.transform.scale);
        let (linear_velocity, angular_velocity) = desc
            .body
            .as_ref()
            .map_or((Vec3::zeros(), Vec3::zeros()), |b| (b.velocity, b.angular_velocity));
        let mut collider = Self {
            shape: desc.shape,
            scaled_shape,
            matter: desc.matter.map(|m| m.clamped()),
            filter: desc.filter,
            layer: desc.layer,
            intangible: desc.intangible,
            transform: desc.transform,
            linear_velocity,
            angular_velocity,
            parent: desc.parent,
            entity: desc.entity,
            body: desc.body.as_ref().map(Body::new),
            transform_version: 0,
            kinematic_target: None,
            compound: None,
            merged_into: None,
            local_to_root: Iso::identity(),
            root_dynamic: false,
        };
        collider.refresh_body_geometry();
        collider
    }

    /// Authored shape, without scale
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Shape with the transform's scale baked in
    pub fn scaled_shape(&self) -> &Shape {
        &self.scaled_shape
    }

    pub(crate) fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
        self.rescale();
    }

    pub(crate) fn rescale(&mut self) {
        self.scaled_shape = self.shape.scaled(&self.transform.scale);
        self.refresh_body_geometry();
    }

    /// Recompute body mass from the current collision geometry
    pub(crate) fn refresh_body_geometry(&mut self) {
        let unit = match &self.compound {
            Some(compound) => compound.mass_properties(1.0),
            None => self.scaled_shape.mass_properties(1.0),
        };
        if let Some(body) = self.body.as_mut() {
            body.set_geometry(unit);
        }
    }

    /// Own matter, if any
    pub fn matter(&self) -> Option<&Matter> {
        self.matter.as_ref()
    }

    /// Own filter, if any
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Collision layer
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Whether the collider only reports overlaps
    pub fn is_intangible(&self) -> bool {
        self.intangible
    }

    /// World transform
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Rigid part of the world transform
    pub fn pose(&self) -> Iso {
        self.transform.isometry()
    }

    /// Linear velocity (of the center of mass for bodies)
    pub fn velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    /// Angular velocity
    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    /// Parent collider
    pub fn parent(&self) -> Option<ColliderHandle> {
        self.parent
    }

    /// Scene entity tag
    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    /// Body component
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Whether the solver moves this collider
    pub fn is_dynamic(&self) -> bool {
        self.body.as_ref().map_or(false, Body::is_dynamic) && self.merged_into.is_none()
    }

    /// Compound root this collider is merged into
    pub fn merged_into(&self) -> Option<ColliderHandle> {
        self.merged_into
    }

    /// Merged compound when this collider is a compound root
    pub fn compound(&self) -> Option<&CompoundShape> {
        self.compound.as_ref()
    }

    /// Discontinuous transform change counter
    pub fn transform_version(&self) -> u64 {
        self.transform_version
    }

    /// Kind flags used by filters
    pub fn kinds(&self) -> ColliderKinds {
        let moving = self.is_dynamic() || (self.merged_into.is_some() && self.root_dynamic);
        let mut kinds = if moving { ColliderKinds::DYNAMIC } else { ColliderKinds::STATIC };
        if self.intangible {
            kinds |= ColliderKinds::INTANGIBLE;
        }
        kinds
    }

    pub(crate) fn candidate(&self, handle: ColliderHandle) -> FilterCandidate {
        FilterCandidate { handle, layer: self.layer, kinds: self.kinds() }
    }

    /// World bounds of the collider's own shape
    pub fn world_aabb(&self) -> AABB {
        self.scaled_shape.local_aabb().transformed(&self.pose())
    }

    /// Center of mass in world space
    pub fn center_of_mass(&self) -> Vec3 {
        let local = self.body.as_ref().map_or_else(Vec3::zeros, Body::local_center_of_mass);
        self.pose().transform_point(&local.into()).coords
    }

    /// Size used by the relative speed limit
    pub(crate) fn size(&self) -> f32 {
        let extents = match &self.compound {
            Some(compound) => compound.local_aabb().extents(),
            None => self.scaled_shape.local_aabb().extents(),
        };
        extents.min() * 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::MassMode;
    use approx::assert_relative_eq;

    #[test]
    fn test_scale_is_baked_into_shape() {
        let desc = ColliderDesc::new(Shape::cuboid(Vec3::new(1.0, 1.0, 1.0)))
            .with_transform(Transform::from_position(Vec3::zeros()).with_scale(Vec3::new(2.0, 1.0, 1.0)));
        let collider = Collider::new(desc);
        assert_relative_eq!(collider.world_aabb().extents(), Vec3::new(1.0, 0.5, 0.5), epsilon = 1e-6);
        assert_relative_eq!(collider.shape().local_aabb().extents(), Vec3::new(0.5, 0.5, 0.5), epsilon = 1e-6);
    }

    #[test]
    fn test_density_follows_scale() {
        let desc = ColliderDesc::new(Shape::cuboid(Vec3::new(1.0, 1.0, 1.0)))
            .with_body(BodyDesc { mass: MassMode::Density(3.0), ..BodyDesc::default() });
        let mut collider = Collider::new(desc);
        assert_relative_eq!(collider.body().map_or(0.0, Body::mass), 3.0, epsilon = 1e-5);

        collider.transform.scale = Vec3::new(2.0, 2.0, 2.0);
        collider.rescale();
        assert_relative_eq!(collider.body().map_or(0.0, Body::mass), 24.0, epsilon = 1e-4);
    }

    #[test]
    fn test_kinds() {
        let shape = Shape::sphere(1.0);
        assert_eq!(Collider::new(ColliderDesc::new(shape.clone())).kinds(), ColliderKinds::STATIC);
        assert_eq!(Collider::new(ColliderDesc::dynamic(shape.clone())).kinds(), ColliderKinds::DYNAMIC);
        let trigger = Collider::new(ColliderDesc::new(shape).intangible(true));
        assert_eq!(trigger.kinds(), ColliderKinds::STATIC | ColliderKinds::INTANGIBLE);
    }
}
