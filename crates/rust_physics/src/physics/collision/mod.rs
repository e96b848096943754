//! Collision geometry
//!
//! Shapes, bounding volumes, convex distance queries and contact generation.
//! Everything here is stateless and works on posed shapes; the world owns
//! the colliders and decides which pairs get tested.

pub mod cast;
pub mod compound;
pub mod gjk;
pub mod levelset;
pub mod mesh;
pub mod narrow_phase;
pub mod primitives;
pub mod shape;
pub mod support;

pub use cast::{ray_cast, shape_cast, ShapeCastHit, ShapeRayHit};
pub use compound::{CompoundPart, CompoundShape};
pub use levelset::LevelsetShape;
pub use mesh::{ConvexHull, MeshShape};
pub use narrow_phase::{contacts, RawContact, MAX_MANIFOLD_POINTS};
pub use primitives::{BoundingSphere, Ray, Triangle, AABB};
pub use shape::{
    create_box_shape, create_capsule_shape, create_cone_shape, create_cylinder_shape,
    create_levelset_shape, create_mesh_shape, create_sphere_shape, Axis, BoxShape, CapsuleShape,
    ConeShape, CylinderShape, MassProperties, Shape, ShapeKind, SphereShape,
};
pub use support::{PosedShape, SupportMap};
