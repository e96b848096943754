//! Surface materials
//!
//! A [`Matter`] describes how a collider's surface responds to contact.
//! Colliders without their own matter use the world's default. When two
//! surfaces touch, their values are combined with [`Matter::combine`].

use serde::{Deserialize, Serialize};

/// Friction and bounciness of a surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Matter {
    /// Coulomb friction coefficient, `>= 0`
    pub friction: f32,
    /// Restitution against dynamic bodies, in `[0, 1]`
    pub dynamic_bounciness: f32,
    /// Restitution against static colliders, in `[0, 1]`
    pub static_bounciness: f32,
    /// Resistance to rolling, `>= 0`
    pub rolling_friction: f32,
    /// Resistance to spinning about the contact normal, `>= 0`
    pub spinning_friction: f32,
}

impl Default for Matter {
    fn default() -> Self {
        Self {
            friction: 0.5,
            dynamic_bounciness: 0.0,
            static_bounciness: 0.0,
            rolling_friction: 0.0,
            spinning_friction: 0.0,
        }
    }
}

/// Coefficients used by the contact solver for one touching pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinedMatter {
    /// Coulomb friction
    pub friction: f32,
    /// Restitution
    pub restitution: f32,
    /// Rolling friction
    pub rolling_friction: f32,
    /// Spinning friction
    pub spinning_friction: f32,
}

impl Matter {
    /// Create a matter with the given friction and no bounce
    pub fn new(friction: f32) -> Self {
        Self { friction, ..Self::default() }
    }

    /// Set both bounciness values
    #[must_use]
    pub fn with_bounciness(mut self, bounciness: f32) -> Self {
        self.dynamic_bounciness = bounciness;
        self.static_bounciness = bounciness;
        self
    }

    /// Copy with every value moved into its valid range
    #[must_use]
    pub fn clamped(&self) -> Self {
        let clamp_nonneg = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };
        let clamp_unit = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        let clamped = Self {
            friction: clamp_nonneg(self.friction),
            dynamic_bounciness: clamp_unit(self.dynamic_bounciness),
            static_bounciness: clamp_unit(self.static_bounciness),
            rolling_friction: clamp_nonneg(self.rolling_friction),
            spinning_friction: clamp_nonneg(self.spinning_friction),
        };
        if clamped != *self {
            log::warn!("Matter values out of range were clamped: {:?}", self);
        }
        clamped
    }

    /// Combine two surfaces
    ///
    /// Friction uses the geometric mean, bounciness the average, and the
    /// rolling and spinning terms the larger value. `against_static` picks
    /// the static bounciness when either side cannot move.
    pub fn combine(&self, other: &Self, against_static: bool) -> CombinedMatter {
        let restitution = if against_static {
            (self.static_bounciness + other.static_bounciness) * 0.5
        } else {
            (self.dynamic_bounciness + other.dynamic_bounciness) * 0.5
        };
        CombinedMatter {
            friction: (self.friction * other.friction).sqrt(),
            restitution,
            rolling_friction: self.rolling_friction.max(other.rolling_friction),
            spinning_friction: self.spinning_friction.max(other.spinning_friction),
        }
    }
}
