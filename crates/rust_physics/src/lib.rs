//! # Rust Physics
//!
//! A fixed-step rigid-body physics and collision engine.
//!
//! ## Features
//!
//! - **Shapes**: spheres, boxes, capsules, cylinders, cones, convex and
//!   concave meshes, levelsets and compounds
//! - **Collision**: octree broad phase, GJK/EPA narrow phase, contact
//!   manifolds and layer/filter control
//! - **Dynamics**: sequential-impulse solver with friction, restitution and
//!   fixed, hinge and point constraints
//! - **Events**: per-collider Enter/Stay/Exit subscriptions for collisions
//!   and overlaps
//! - **Queries**: ray, sphere and shape casts, immediate or deferred
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_physics::prelude::*;
//!
//! fn main() -> Result<(), PhysicsError> {
//!     let mut world = World::new(WorldSettings::default());
//!     world.add_collider(ColliderDesc::new(Shape::cuboid(Vec3::new(20.0, 1.0, 20.0))))?;
//!     let ball = world.add_collider(
//!         ColliderDesc::dynamic(Shape::sphere(0.5)).with_position(Vec3::new(0.0, 5.0, 0.0)),
//!     )?;
//!
//!     for _ in 0..120 {
//!         world.update(1.0 / 60.0);
//!     }
//!     println!("ball at {:?}", world.collider(ball)?.transform().position);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod debug;
pub mod events;
pub mod foundation;
pub mod physics;
pub mod spatial;

#[cfg(test)]
mod tests;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::Config,
        debug::DebugShape,
        events::{EventKind, PhysicsEvent, TouchPhase},
        foundation::{
            collections::{ColliderHandle, ConstraintHandle, SubscriptionHandle, WorldId},
            math::{Iso, Quat, Transform, Vec3},
        },
        physics::{
            BodyDesc, ColliderDesc, ConstraintDesc, ConstraintKind, Filter, ForceMode, HingeSettings, Matter,
            PhysicsError, PhysicsRegistry, Probe, RayCastHit, Shape, World, WorldSettings,
        },
    };
}
