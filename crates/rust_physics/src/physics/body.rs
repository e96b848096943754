//! Rigid bodies
//!
//! A [`Body`] is the dynamic part of a collider: mass model, damping and the
//! forces queued for the next step. Velocities live on the collider itself
//! so static and kinematic colliders can carry them too.
//!
//! Mass is either derived from density and the collision geometry, or fixed
//! explicitly. Mass properties are kept per unit density so density and
//! geometry changes only need a rescale.

use crate::foundation::math::{Mat3, Quat, Vec3};
use crate::physics::collision::shape::point_mass_inertia;
use crate::physics::collision::MassProperties;

/// Smallest mass a dynamic body is simulated with
pub const MIN_MASS: f32 = 1.0e-4;

/// How a body's mass is determined
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MassMode {
    /// Mass follows the shape volume
    Density(f32),
    /// Fixed mass, independent of shape and scale
    Mass(f32),
}

impl Default for MassMode {
    fn default() -> Self {
        Self::Density(1.0)
    }
}

/// How a force or torque is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForceMode {
    /// Continuous, scaled by mass
    #[default]
    Force,
    /// Continuous, independent of mass
    Acceleration,
    /// Instantaneous, scaled by mass
    Impulse,
    /// Instantaneous, independent of mass
    VelocityChange,
}

/// Body creation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    /// Mass model
    pub mass: MassMode,
    /// Simulated by the solver; otherwise behaves as a static collider
    pub dynamic: bool,
    /// Linear velocity damping per second
    pub damping: f32,
    /// Angular velocity damping per second
    pub angular_damping: f32,
    /// Merge nested colliders into one compound even when not dynamic
    pub force_compound: bool,
    /// Initial linear velocity
    pub velocity: Vec3,
    /// Initial angular velocity
    pub angular_velocity: Vec3,
}

impl Default for BodyDesc {
    fn default() -> Self {
        Self {
            mass: MassMode::default(),
            dynamic: true,
            damping: 0.0,
            angular_damping: 0.05,
            force_compound: false,
            velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    force: Vec3,
    acceleration: Vec3,
    impulse: Vec3,
    velocity_change: Vec3,
}

impl Accumulator {
    fn add(&mut self, value: &Vec3, mode: ForceMode) {
        match mode {
            ForceMode::Force => self.force += value,
            ForceMode::Acceleration => self.acceleration += value,
            ForceMode::Impulse => self.impulse += value,
            ForceMode::VelocityChange => self.velocity_change += value,
        }
    }
}

/// Dynamic state of a collider
#[derive(Debug, Clone)]
pub struct Body {
    mass_mode: MassMode,
    dynamic: bool,
    /// Linear velocity damping per second
    pub damping: f32,
    /// Angular velocity damping per second
    pub angular_damping: f32,
    /// Merge nested colliders into one compound even when not dynamic
    pub force_compound: bool,

    unit_properties: MassProperties,
    mass: f32,
    inverse_mass: f32,
    local_center_of_mass: Vec3,
    local_inverse_inertia: Mat3,

    linear: Accumulator,
    angular: Accumulator,
}

impl Body {
    /// Body with the given parameters and no geometry yet
    pub fn new(desc: &BodyDesc) -> Self {
        let mut body = Self {
            mass_mode: desc.mass,
            dynamic: desc.dynamic,
            damping: desc.damping.max(0.0),
            angular_damping: desc.angular_damping.max(0.0),
            force_compound: desc.force_compound,
            unit_properties: MassProperties::zero(),
            mass: 0.0,
            inverse_mass: 0.0,
            local_center_of_mass: Vec3::zeros(),
            local_inverse_inertia: Mat3::zeros(),
            linear: Accumulator::default(),
            angular: Accumulator::default(),
        };
        body.refresh_mass();
        body
    }

    /// Whether the solver moves this body
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub(crate) fn set_dynamic(&mut self, dynamic: bool) {
        self.dynamic = dynamic;
    }

    /// Current mass model
    pub fn mass_mode(&self) -> MassMode {
        self.mass_mode
    }

    /// Simulated mass
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// `1 / mass`, or 0 for bodies the solver does not move
    pub fn inverse_mass(&self) -> f32 {
        if self.dynamic {
            self.inverse_mass
        } else {
            0.0
        }
    }

    /// Center of mass in the body's local frame
    pub fn local_center_of_mass(&self) -> Vec3 {
        self.local_center_of_mass
    }

    /// Inverse inertia about the center of mass, in world axes
    pub fn inverse_inertia_world(&self, rotation: &Quat) -> Mat3 {
        if !self.dynamic {
            return Mat3::zeros();
        }
        let r = rotation.to_rotation_matrix().into_inner();
        r * self.local_inverse_inertia * r.transpose()
    }

    /// Make mass follow the shape volume
    pub fn set_density(&mut self, density: f32) {
        self.mass_mode = MassMode::Density(density);
        self.refresh_mass();
    }

    /// Fix the mass, decoupling it from shape and scale
    pub fn set_mass(&mut self, mass: f32) {
        self.mass_mode = MassMode::Mass(mass);
        self.refresh_mass();
    }

    /// Replace the unit-density properties of the collision geometry
    pub(crate) fn set_geometry(&mut self, unit_properties: MassProperties) {
        self.unit_properties = unit_properties;
        self.refresh_mass();
    }

    fn refresh_mass(&mut self) {
        let unit = self.unit_properties;
        let props = match self.mass_mode {
            MassMode::Density(density) => MassProperties {
                mass: unit.mass * density,
                center_of_mass: unit.center_of_mass,
                inertia: unit.inertia * density,
            },
            MassMode::Mass(mass) => unit.with_mass(mass),
        };

        let mut mass = props.mass;
        if !(mass.is_finite() && mass >= MIN_MASS) {
            if self.dynamic && unit.mass > 0.0 {
                log::warn!("Body mass {} clamped to {}", mass, MIN_MASS);
            }
            mass = MIN_MASS;
        }

        let about_com = props.inertia - point_mass_inertia(props.mass, &props.center_of_mass);
        self.mass = mass;
        self.inverse_mass = 1.0 / mass;
        self.local_center_of_mass = props.center_of_mass;
        self.local_inverse_inertia = about_com.try_inverse().unwrap_or_else(Mat3::zeros);
    }

    /// Queue a force at the center of mass
    pub fn add_force(&mut self, force: Vec3, mode: ForceMode) {
        self.linear.add(&force, mode);
    }

    /// Queue a torque
    pub fn add_torque(&mut self, torque: Vec3, mode: ForceMode) {
        self.angular.add(&torque, mode);
    }

    /// Queue a force applied at a world position; `center_of_mass` is the
    /// current world center of mass
    pub fn add_force_at_position(&mut self, force: Vec3, position: Vec3, center_of_mass: Vec3, mode: ForceMode) {
        self.linear.add(&force, mode);
        self.angular.add(&(position - center_of_mass).cross(&force), mode);
    }

    /// Velocity change from queued forces over `dt`, then clear the queue
    pub(crate) fn take_velocity_delta(&mut self, dt: f32, rotation: &Quat) -> (Vec3, Vec3) {
        let inverse_inertia = self.inverse_inertia_world(rotation);
        let linear = std::mem::take(&mut self.linear);
        let angular = std::mem::take(&mut self.angular);
        if !self.dynamic {
            return (Vec3::zeros(), Vec3::zeros());
        }

        let dv = (linear.force * self.inverse_mass + linear.acceleration) * dt
            + linear.impulse * self.inverse_mass
            + linear.velocity_change;
        let dw = inverse_inertia * (angular.force * dt + angular.impulse)
            + angular.acceleration * dt
            + angular.velocity_change;
        (dv, dw)
    }

    /// Drop queued forces without applying them
    pub fn clear_forces(&mut self) {
        self.linear = Accumulator::default();
        self.angular = Accumulator::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision::Shape;
    use approx::assert_relative_eq;

    fn unit_cube_body(desc: &BodyDesc) -> Body {
        let mut body = Body::new(desc);
        body.set_geometry(Shape::cuboid(Vec3::new(1.0, 1.0, 1.0)).mass_properties(1.0));
        body
    }

    #[test]
    fn test_density_and_mass_modes() {
        let mut body = unit_cube_body(&BodyDesc { mass: MassMode::Density(2.0), ..BodyDesc::default() });
        assert_relative_eq!(body.mass(), 2.0, epsilon = 1e-5);

        body.set_geometry(Shape::cuboid(Vec3::new(2.0, 1.0, 1.0)).mass_properties(1.0));
        assert_relative_eq!(body.mass(), 4.0, epsilon = 1e-5);

        body.set_mass(10.0);
        body.set_geometry(Shape::cuboid(Vec3::new(1.0, 1.0, 1.0)).mass_properties(1.0));
        assert_relative_eq!(body.mass(), 10.0, epsilon = 1e-5);
        assert_relative_eq!(body.inverse_mass(), 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_mass_is_clamped() {
        let body = unit_cube_body(&BodyDesc { mass: MassMode::Mass(0.0), ..BodyDesc::default() });
        assert_eq!(body.mass(), MIN_MASS);
        assert!(body.inverse_mass().is_finite());
    }

    #[test]
    fn test_force_modes() {
        let mut body = unit_cube_body(&BodyDesc { mass: MassMode::Mass(2.0), ..BodyDesc::default() });
        body.add_force(Vec3::new(4.0, 0.0, 0.0), ForceMode::Force);
        body.add_force(Vec3::new(0.0, 1.0, 0.0), ForceMode::Acceleration);
        body.add_force(Vec3::new(0.0, 0.0, 2.0), ForceMode::Impulse);
        body.add_force(Vec3::new(1.0, 0.0, 0.0), ForceMode::VelocityChange);

        let (dv, _) = body.take_velocity_delta(0.5, &Quat::identity());
        assert_relative_eq!(dv, Vec3::new(1.0 + 1.0, 0.5, 1.0), epsilon = 1e-6);

        let (dv, dw) = body.take_velocity_delta(0.5, &Quat::identity());
        assert_eq!(dv, Vec3::zeros());
        assert_eq!(dw, Vec3::zeros());
    }

    #[test]
    fn test_static_body_ignores_forces() {
        let mut body = unit_cube_body(&BodyDesc { dynamic: false, ..BodyDesc::default() });
        body.add_force(Vec3::new(1.0, 0.0, 0.0), ForceMode::VelocityChange);
        assert_eq!(body.inverse_mass(), 0.0);
        assert_eq!(body.take_velocity_delta(1.0, &Quat::identity()).0, Vec3::zeros());
    }
}
