//! World settings
//!
//! [`WorldSettings`] is a plain value object. Worlds copy it on creation and
//! on [`crate::physics::World::set_settings`]; nothing shares it by
//! reference. Out-of-range values are clamped by [`WorldSettings::sanitized`]
//! with a warning rather than rejected.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::foundation::math::Vec3;
use crate::physics::collision::AABB;
use crate::spatial::OctreeConfig;

use super::collision_layers::LayerCollisionMatrix;
use super::filter::Filter;
use super::matter::Matter;

/// Lowest accepted simulation rate (steps per second)
pub const MIN_SIMULATION_RATE: f32 = 30.0;
/// Highest accepted simulation rate (steps per second)
pub const MAX_SIMULATION_RATE: f32 = 240.0;

/// Broad-phase layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadPhaseSettings {
    /// Region covered by the octree; colliders outside still work
    pub bounds: AABB,
    /// Octree subdivision
    pub octree: OctreeConfig,
}

impl Default for BroadPhaseSettings {
    fn default() -> Self {
        Self {
            bounds: AABB::new(Vec3::new(-1000.0, -1000.0, -1000.0), Vec3::new(1000.0, 1000.0, 1000.0)),
            octree: OctreeConfig::default(),
        }
    }
}

/// Simulation parameters of one world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Gravity acceleration
    pub gravity: Vec3,
    /// Fixed steps per second of real time
    pub simulation_rate: f32,
    /// Maximum speed of any body, 0 disables
    pub absolute_speed_limit: f32,
    /// Maximum distance a body may travel in one step as a fraction of its
    /// own size, 0 disables
    pub relative_speed_limit: f32,
    /// Real-time stretch of each step (`>= 1`)
    pub slow_down_step: f32,
    /// Simulated-time shrink of each step (`>= 1`)
    pub slow_down_time: f32,
    /// Velocity solver iterations per step
    pub solver_iterations: u32,
    /// Catch-up steps allowed in one update
    pub max_steps_per_update: u32,
    /// Contacts up to this separation are reported as touching
    pub contact_tolerance: f32,
    /// Record collider bounds and contacts into the debug draw buffer
    pub debug_draw: bool,
    // Tables last: TOML needs plain values before tables
    /// Filter for colliders and probes without their own
    pub default_filter: Filter,
    /// Matter for colliders without their own
    pub default_matter: Matter,
    /// Which layers interact
    pub layer_matrix: LayerCollisionMatrix,
    /// Broad-phase layout
    pub broad_phase: BroadPhaseSettings,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            simulation_rate: 60.0,
            absolute_speed_limit: 0.0,
            relative_speed_limit: 0.0,
            slow_down_step: 1.0,
            slow_down_time: 1.0,
            default_filter: Filter::default(),
            default_matter: Matter::default(),
            layer_matrix: LayerCollisionMatrix::default(),
            solver_iterations: 8,
            max_steps_per_update: 8,
            contact_tolerance: 0.05,
            broad_phase: BroadPhaseSettings::default(),
            debug_draw: false,
        }
    }
}

impl Config for WorldSettings {}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

impl WorldSettings {
    /// Copy with every value moved into its valid range
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let mut s = self.clone();

        if !s.gravity.iter().all(|c| c.is_finite()) {
            log::warn!("Non-finite gravity {:?}, using default", s.gravity);
            s.gravity = defaults.gravity;
        }
        let rate = finite_or(s.simulation_rate, defaults.simulation_rate);
        s.simulation_rate = rate.clamp(MIN_SIMULATION_RATE, MAX_SIMULATION_RATE);
        s.absolute_speed_limit = finite_or(s.absolute_speed_limit, 0.0).max(0.0);
        s.relative_speed_limit = finite_or(s.relative_speed_limit, 0.0).max(0.0);
        s.slow_down_step = finite_or(s.slow_down_step, 1.0).max(1.0);
        s.slow_down_time = finite_or(s.slow_down_time, 1.0).max(1.0);
        s.default_matter = s.default_matter.clamped();
        s.solver_iterations = s.solver_iterations.clamp(1, 128);
        s.max_steps_per_update = s.max_steps_per_update.max(1);
        s.contact_tolerance = finite_or(s.contact_tolerance, defaults.contact_tolerance).max(0.0);
        if !s.broad_phase.bounds.is_valid() {
            s.broad_phase.bounds = defaults.broad_phase.bounds;
        }

        if s != *self {
            log::warn!("World settings adjusted into valid ranges");
        }
        s
    }

    /// Real seconds between two steps
    pub fn step_interval(&self) -> f32 {
        self.slow_down_step / self.simulation_rate
    }

    /// Simulated seconds per step
    pub fn step_dt(&self) -> f32 {
        1.0 / (self.simulation_rate * self.slow_down_time)
    }
}
