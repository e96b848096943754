//! Rigid-body physics
//!
//! Colliders, bodies and constraints live in a [`World`]; worlds live in a
//! [`PhysicsRegistry`]. Spatial queries go through [`Probe`].

pub mod body;
pub mod collider;
pub mod collision;
pub mod collision_layers;
pub mod collision_system;
pub mod constraint;
mod constraint_solver;
mod contact_solver;
pub mod error;
pub mod filter;
pub mod matter;
pub mod probe;
pub mod registry;
pub mod scene;
pub mod settings;
pub mod world;

pub use body::{Body, BodyDesc, ForceMode, MassMode};
pub use collider::{Collider, ColliderDesc};
pub use collision::{Axis, CompoundShape, LevelsetShape, MeshShape, Shape, ShapeKind, AABB};
pub use collision_layers::{Layer, LayerCollisionMatrix};
pub use constraint::{
    Constraint, ConstraintDesc, ConstraintKind, ConstraintState, HingeLimit, HingeMotor, HingeSettings, MotorTarget,
};
pub use error::{PhysicsError, Result};
pub use filter::{ColliderKinds, Filter};
pub use matter::Matter;
pub use probe::{CastQueue, Probe, ProbeQuery, ProbeScope, RayCastHit, TriangleHit};
pub use registry::PhysicsRegistry;
pub use scene::{EntityId, TransformStore};
pub use settings::{BroadPhaseSettings, WorldSettings};
pub use world::World;
