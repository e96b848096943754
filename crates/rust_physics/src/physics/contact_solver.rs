//! Sequential-impulse contact solver
//!
//! Each touching pair becomes a [`ContactConstraint`] holding up to four
//! points. Every solver iteration applies, per point, two friction impulses
//! clamped by the Coulomb cone and a non-negative normal impulse; then one
//! rolling and one spinning friction impulse per pair. Impulses accumulate
//! across iterations so clamping happens on the running total.
//!
//! Points that are still apart (speculative contacts) only stop the bodies
//! from closing more than their gap in this step. Penetrating points are
//! pushed apart with a Baumgarte velocity bias.

use crate::foundation::collections::ColliderHandle;
use crate::foundation::math::{utils::orthonormal_basis, Mat3, Vec3};

use super::matter::CombinedMatter;

/// Fraction of penetration removed per step
pub const BAUMGARTE: f32 = 0.2;

/// Velocity state of one collider during a step
#[derive(Debug, Clone)]
pub struct SolverBody {
    /// Collider the state belongs to
    pub handle: ColliderHandle,
    /// 0 for colliders the solver does not move
    pub inverse_mass: f32,
    /// World inverse inertia about the center of mass
    pub inverse_inertia: Mat3,
    /// World center of mass
    pub center: Vec3,
    /// Linear velocity of the center of mass
    pub linear: Vec3,
    /// Angular velocity
    pub angular: Vec3,
}

impl SolverBody {
    /// Immovable body with the given velocities
    pub fn fixed(handle: ColliderHandle, center: Vec3, linear: Vec3, angular: Vec3) -> Self {
        Self {
            handle,
            inverse_mass: 0.0,
            inverse_inertia: Mat3::zeros(),
            center,
            linear,
            angular,
        }
    }

    /// Velocity of a world point moving with the body
    pub fn velocity_at(&self, point: &Vec3) -> Vec3 {
        self.linear + self.angular.cross(&(point - self.center))
    }

    /// Apply an impulse at a lever arm from the center of mass
    pub fn apply_impulse(&mut self, impulse: &Vec3, arm: &Vec3) {
        self.linear += impulse * self.inverse_mass;
        self.angular += self.inverse_inertia * arm.cross(impulse);
    }

    /// Apply an angular impulse
    pub fn apply_angular_impulse(&mut self, impulse: &Vec3) {
        self.angular += self.inverse_inertia * impulse;
    }

    /// Whether the solver can change this body's velocity
    pub fn is_movable(&self) -> bool {
        self.inverse_mass > 0.0
    }
}

/// Inverse of the effective mass along `direction` at the given arms
fn effective_mass(a: &SolverBody, b: &SolverBody, arm_a: &Vec3, arm_b: &Vec3, direction: &Vec3) -> f32 {
    let ra = arm_a.cross(direction);
    let rb = arm_b.cross(direction);
    let k = a.inverse_mass
        + b.inverse_mass
        + ra.dot(&(a.inverse_inertia * ra))
        + rb.dot(&(b.inverse_inertia * rb));
    if k > 1.0e-12 {
        1.0 / k
    } else {
        0.0
    }
}

pub(crate) fn angular_mass(a: &SolverBody, b: &SolverBody, axis: &Vec3) -> f32 {
    let k = axis.dot(&((a.inverse_inertia + b.inverse_inertia) * axis));
    if k > 1.0e-12 {
        1.0 / k
    } else {
        0.0
    }
}

/// Input contact point for [`ContactConstraint::new`]
#[derive(Debug, Clone, Copy)]
pub struct ContactInput {
    /// World position
    pub position: Vec3,
    /// Signed separation
    pub separation: f32,
}

#[derive(Debug, Clone)]
struct SolverPoint {
    arm_a: Vec3,
    arm_b: Vec3,
    separation: f32,
    normal_mass: f32,
    tangent_mass: [f32; 2],
    target_velocity: f32,
    normal_impulse: f32,
    tangent_impulse: [f32; 2],
}

/// Touching pair prepared for the velocity solver
#[derive(Debug, Clone)]
pub struct ContactConstraint {
    /// Index of body A
    pub a: usize,
    /// Index of body B
    pub b: usize,
    /// Unit normal from A toward B
    pub normal: Vec3,
    tangents: [Vec3; 2],
    matter: CombinedMatter,
    points: Vec<SolverPoint>,
    rolling_mass: [f32; 2],
    spinning_mass: f32,
    rolling_impulse: [f32; 2],
    spinning_impulse: f32,
}

impl ContactConstraint {
    /// Prepare a pair for solving
    ///
    /// `restitution_threshold` is the approach speed below which contacts do
    /// not bounce.
    pub fn new(
        bodies: &[SolverBody],
        a: usize,
        b: usize,
        normal: Vec3,
        points: &[ContactInput],
        matter: CombinedMatter,
        dt: f32,
        slop: f32,
        restitution_threshold: f32,
    ) -> Self {
        let (body_a, body_b) = (&bodies[a], &bodies[b]);
        let (t1, t2) = orthonormal_basis(&normal);
        let tangents = [t1, t2];

        let points = points
            .iter()
            .map(|p| {
                let arm_a = p.position - body_a.center;
                let arm_b = p.position - body_b.center;
                let relative = body_b.velocity_at(&p.position) - body_a.velocity_at(&p.position);
                let approach = relative.dot(&normal);

                let target_velocity = if p.separation > 0.0 {
                    -p.separation / dt
                } else {
                    let bounce = if approach < -restitution_threshold {
                        -matter.restitution * approach
                    } else {
                        0.0
                    };
                    let push = BAUMGARTE / dt * (-p.separation - slop).max(0.0);
                    bounce.max(push)
                };

                SolverPoint {
                    arm_a,
                    arm_b,
                    separation: p.separation,
                    normal_mass: effective_mass(body_a, body_b, &arm_a, &arm_b, &normal),
                    tangent_mass: [
                        effective_mass(body_a, body_b, &arm_a, &arm_b, &t1),
                        effective_mass(body_a, body_b, &arm_a, &arm_b, &t2),
                    ],
                    target_velocity,
                    normal_impulse: 0.0,
                    tangent_impulse: [0.0; 2],
                }
            })
            .collect();

        Self {
            a,
            b,
            normal,
            tangents,
            matter,
            points,
            rolling_mass: [angular_mass(body_a, body_b, &t1), angular_mass(body_a, body_b, &t2)],
            spinning_mass: angular_mass(body_a, body_b, &normal),
            rolling_impulse: [0.0; 2],
            spinning_impulse: 0.0,
        }
    }

    /// One solver iteration
    pub fn solve(&mut self, bodies: &mut [SolverBody]) {
        if self.a == self.b {
            return;
        }
        let (body_a, body_b) = pair_mut(bodies, self.a, self.b);

        for point in &mut self.points {
            // Friction against the current normal impulse
            for (i, tangent) in self.tangents.iter().enumerate() {
                let relative = body_b.velocity_at(&(body_b.center + point.arm_b))
                    - body_a.velocity_at(&(body_a.center + point.arm_a));
                let lambda = -point.tangent_mass[i] * relative.dot(tangent);
                let limit = self.matter.friction * point.normal_impulse;
                let total = (point.tangent_impulse[i] + lambda).clamp(-limit, limit);
                let applied = total - point.tangent_impulse[i];
                point.tangent_impulse[i] = total;
                let impulse = tangent * applied;
                body_a.apply_impulse(&-impulse, &point.arm_a);
                body_b.apply_impulse(&impulse, &point.arm_b);
            }

            let relative = body_b.velocity_at(&(body_b.center + point.arm_b))
                - body_a.velocity_at(&(body_a.center + point.arm_a));
            let approach = relative.dot(&self.normal);
            let lambda = -point.normal_mass * (approach - point.target_velocity);
            let total = (point.normal_impulse + lambda).max(0.0);
            let applied = total - point.normal_impulse;
            point.normal_impulse = total;
            let impulse = self.normal * applied;
            body_a.apply_impulse(&-impulse, &point.arm_a);
            body_b.apply_impulse(&impulse, &point.arm_b);
        }

        let pressure: f32 = self.points.iter().map(|p| p.normal_impulse).sum();

        if self.matter.rolling_friction > 0.0 {
            for (i, axis) in self.tangents.iter().enumerate() {
                let spin = (body_b.angular - body_a.angular).dot(axis);
                let limit = self.matter.rolling_friction * pressure;
                let total = (self.rolling_impulse[i] - self.rolling_mass[i] * spin).clamp(-limit, limit);
                let applied = total - self.rolling_impulse[i];
                self.rolling_impulse[i] = total;
                body_a.apply_angular_impulse(&(-axis * applied));
                body_b.apply_angular_impulse(&(axis * applied));
            }
        }

        if self.matter.spinning_friction > 0.0 {
            let spin = (body_b.angular - body_a.angular).dot(&self.normal);
            let limit = self.matter.spinning_friction * pressure;
            let total = (self.spinning_impulse - self.spinning_mass * spin).clamp(-limit, limit);
            let applied = total - self.spinning_impulse;
            self.spinning_impulse = total;
            body_a.apply_angular_impulse(&(-self.normal * applied));
            body_b.apply_angular_impulse(&(self.normal * applied));
        }
    }

    /// Accumulated normal impulse per point, in input order
    pub fn normal_impulses(&self) -> Vec<f32> {
        self.points.iter().map(|p| p.normal_impulse).collect()
    }

    /// Deepest separation among the points
    pub fn min_separation(&self) -> f32 {
        self.points.iter().map(|p| p.separation).fold(f32::MAX, f32::min)
    }
}

/// Two distinct mutable elements of a slice
pub(crate) fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::SlotMap;
    use crate::physics::matter::Matter;
    use approx::assert_relative_eq;

    fn bodies() -> Vec<SolverBody> {
        let mut handles: SlotMap<ColliderHandle, ()> = SlotMap::with_key();
        let ground = SolverBody::fixed(handles.insert(()), Vec3::zeros(), Vec3::zeros(), Vec3::zeros());
        let ball = SolverBody {
            handle: handles.insert(()),
            inverse_mass: 1.0,
            inverse_inertia: Mat3::identity() * 2.5,
            center: Vec3::new(0.0, 1.0, 0.0),
            linear: Vec3::new(0.0, -3.0, 0.0),
            angular: Vec3::zeros(),
        };
        vec![ground, ball]
    }

    #[test]
    fn test_inelastic_contact_stops_approach() {
        let mut bodies = bodies();
        let matter = Matter::default().combine(&Matter::default(), true);
        let point = ContactInput { position: Vec3::zeros(), separation: 0.0 };
        let mut contact = ContactConstraint::new(&bodies, 0, 1, Vec3::y(), &[point], matter, 1.0 / 60.0, 0.0, 0.5);
        for _ in 0..4 {
            contact.solve(&mut bodies);
        }
        assert_relative_eq!(bodies[1].linear.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(contact.normal_impulses()[0], 3.0, epsilon = 1e-4);
    }

    #[test]
    fn test_speculative_contact_closes_gap_exactly() {
        let mut bodies = bodies();
        let matter = Matter::default().combine(&Matter::default(), true);
        let dt = 0.1;
        let point = ContactInput { position: Vec3::zeros(), separation: 0.2 };
        let mut contact = ContactConstraint::new(&bodies, 0, 1, Vec3::y(), &[point], matter, dt, 0.0, 0.5);
        contact.solve(&mut bodies);
        // Allowed to close the 0.2 gap in this step and no more
        assert_relative_eq!(bodies[1].linear.y, -2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_restitution_bounces() {
        let mut bodies = bodies();
        let bouncy = Matter::default().with_bounciness(1.0);
        let matter = bouncy.combine(&bouncy, true);
        let point = ContactInput { position: Vec3::zeros(), separation: 0.0 };
        let mut contact = ContactConstraint::new(&bodies, 0, 1, Vec3::y(), &[point], matter, 1.0 / 60.0, 0.0, 0.5);
        contact.solve(&mut bodies);
        assert_relative_eq!(bodies[1].linear.y, 3.0, epsilon = 1e-4);
    }
}
