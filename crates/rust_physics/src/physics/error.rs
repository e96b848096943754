//! Physics error type

use crate::config::ConfigError;
use crate::foundation::collections::{ColliderHandle, ConstraintHandle, WorldId};

/// Errors reported by world, collider, constraint and query operations
#[derive(thiserror::Error, Debug)]
pub enum PhysicsError {
    /// The collider handle is stale or belongs to another world
    #[error("Collider {0:?} does not exist")]
    ColliderNotFound(ColliderHandle),

    /// The constraint handle is stale
    #[error("Constraint {0:?} does not exist")]
    ConstraintNotFound(ConstraintHandle),

    /// The world handle is stale
    #[error("World {0:?} does not exist")]
    WorldNotFound(WorldId),

    /// The collider has no body component
    #[error("Collider {0:?} is not a body")]
    NotABody(ColliderHandle),

    /// Re-anchoring was requested on a constraint attached to the world
    #[error("Constraint {0:?} has no target collider")]
    NoConstraintTarget(ConstraintHandle),

    /// The operation does not apply to this kind of constraint
    #[error("Constraint {0:?} is not a hinge")]
    NotAHinge(ConstraintHandle),

    /// A collider cannot be constrained to itself
    #[error("Constraint owner and target are the same collider {0:?}")]
    SelfConstraint(ColliderHandle),

    /// A shape cast was requested with a shape that cannot be swept
    #[error("Shape cast with a {0} shape is not supported")]
    UnsupportedCastShape(&'static str),

    /// The parent collider of a new collider does not exist
    #[error("Parent collider {0:?} does not exist")]
    ParentNotFound(ColliderHandle),

    /// Invalid shape parameters
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Mesh data is malformed
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// Configuration loading failed
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias for physics operations
pub type Result<T> = std::result::Result<T, PhysicsError>;
