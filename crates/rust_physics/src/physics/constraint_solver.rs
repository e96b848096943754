//! Velocity-level joint solver
//!
//! Joints are solved alongside contacts in the same sequential-impulse
//! loop. The point part locks the two pivot positions with a 3x3 block, the
//! fixed part locks relative rotation with another, and the hinge part locks
//! the two directions perpendicular to its axis. Position drift is fed back
//! as a Baumgarte velocity bias.
//!
//! Hinge limits are one-sided rows that are always present while enabled:
//! away from the limit they only forbid closing more than the remaining gap
//! in one step, so fast swings stop at the limit instead of tunneling
//! through it. The motor row's accumulated impulse is clamped to
//! `max_impulse`; a motor that cannot reach its target under-drives.

use crate::foundation::math::{utils::{orthonormal_basis, wrap_angle}, Iso, Mat3, Vec3};

use super::constraint::{hinge_angle, ConstraintKind, HingeLimit, HingeMotor, MotorTarget};
use super::contact_solver::{angular_mass, pair_mut, SolverBody};

/// Fraction of joint drift removed per step
pub const JOINT_BAUMGARTE: f32 = 0.2;

fn skew(v: &Vec3) -> Mat3 {
    v.cross_matrix()
}

fn inverse_or_zero(m: &Mat3) -> Mat3 {
    m.try_inverse().unwrap_or_else(Mat3::zeros)
}

#[derive(Debug, Clone)]
struct PointPart {
    arm_a: Vec3,
    arm_b: Vec3,
    bias: Vec3,
    mass: Mat3,
}

#[derive(Debug, Clone)]
struct LimitRow {
    /// +1 for the low limit, -1 for the high limit
    sign: f32,
    target: f32,
    impulse: f32,
}

#[derive(Debug, Clone)]
struct HingePart {
    axis: Vec3,
    perpendicular: [Vec3; 2],
    perpendicular_bias: [f32; 2],
    perpendicular_mass: [f32; 2],
    axis_mass: f32,
    motor: Option<(f32, f32)>,
    motor_impulse: f32,
    limits: Vec<LimitRow>,
}

#[derive(Debug, Clone)]
enum AngularPart {
    Free,
    Locked { bias: Vec3, mass: Mat3 },
    Hinge(Box<HingePart>),
}

/// A joint prepared for the velocity solver
#[derive(Debug, Clone)]
pub struct JointConstraint {
    /// Index of the owner body
    pub a: usize,
    /// Index of the target body (or the world frame body)
    pub b: usize,
    point: PointPart,
    angular: AngularPart,
    /// Hinge angle at preparation time
    pub angle: Option<f32>,
}

/// Twist rate of the owner relative to the target about `axis`
fn twist_rate(a: &SolverBody, b: &SolverBody, axis: &Vec3) -> f32 {
    (a.angular - b.angular).dot(axis)
}

impl JointConstraint {
    /// Prepare a joint given both endpoints' world pivot frames
    pub fn new(
        bodies: &[SolverBody],
        a: usize,
        b: usize,
        kind: &ConstraintKind,
        frames: &(Iso, Iso),
        dt: f32,
    ) -> Self {
        let (body_a, body_b) = (&bodies[a], &bodies[b]);
        let (frame_a, frame_b) = frames;

        let pivot_a = frame_a.translation.vector;
        let pivot_b = frame_b.translation.vector;
        let arm_a = pivot_a - body_a.center;
        let arm_b = pivot_b - body_b.center;
        let (sa, sb) = (skew(&arm_a), skew(&arm_b));
        let k = Mat3::identity() * (body_a.inverse_mass + body_b.inverse_mass)
            - sa * body_a.inverse_inertia * sa
            - sb * body_b.inverse_inertia * sb;
        let point = PointPart {
            arm_a,
            arm_b,
            bias: (pivot_b - pivot_a) * (JOINT_BAUMGARTE / dt),
            mass: inverse_or_zero(&k),
        };

        let mut angle = None;
        let angular = match kind {
            ConstraintKind::Point => AngularPart::Free,
            ConstraintKind::Fixed => {
                let error = (frame_b.rotation * frame_a.rotation.inverse()).scaled_axis();
                AngularPart::Locked {
                    bias: error * (JOINT_BAUMGARTE / dt),
                    mass: inverse_or_zero(&(body_a.inverse_inertia + body_b.inverse_inertia)),
                }
            }
            ConstraintKind::Hinge(settings) => {
                let axis = frame_a.rotation * settings.axis;
                let axis_b = frame_b.rotation * settings.axis;
                let error = axis.cross(&axis_b);
                let (p1, p2) = orthonormal_basis(&axis);
                let theta = hinge_angle(&frame_a.rotation, &frame_b.rotation, &settings.axis);
                angle = Some(theta);
                let rate = twist_rate(body_a, body_b, &axis);

                AngularPart::Hinge(Box::new(HingePart {
                    axis,
                    perpendicular: [p1, p2],
                    perpendicular_bias: [
                        error.dot(&p1) * (JOINT_BAUMGARTE / dt),
                        error.dot(&p2) * (JOINT_BAUMGARTE / dt),
                    ],
                    perpendicular_mass: [angular_mass(body_a, body_b, &p1), angular_mass(body_a, body_b, &p2)],
                    axis_mass: angular_mass(body_a, body_b, &axis),
                    motor: motor_row(&settings.motor, theta, dt),
                    motor_impulse: 0.0,
                    limits: limit_rows(&settings.limit, theta, rate, dt),
                }))
            }
        };

        Self { a, b, point, angular, angle }
    }

    /// One solver iteration
    pub fn solve(&mut self, bodies: &mut [SolverBody]) {
        if self.a == self.b {
            return;
        }
        let (body_a, body_b) = pair_mut(bodies, self.a, self.b);

        match &mut self.angular {
            AngularPart::Free => {}
            AngularPart::Locked { bias, mass } => {
                let relative = body_b.angular - body_a.angular;
                let impulse = *mass * (-relative - *bias);
                body_a.apply_angular_impulse(&-impulse);
                body_b.apply_angular_impulse(&impulse);
            }
            AngularPart::Hinge(hinge) => solve_hinge(hinge, body_a, body_b),
        }

        let p = &self.point;
        let relative = body_b.velocity_at(&(body_b.center + p.arm_b)) - body_a.velocity_at(&(body_a.center + p.arm_a));
        let impulse = p.mass * (-relative - p.bias);
        body_a.apply_impulse(&-impulse, &p.arm_a);
        body_b.apply_impulse(&impulse, &p.arm_b);
    }

    /// Motor impulse accumulated this step
    pub fn motor_impulse(&self) -> f32 {
        match &self.angular {
            AngularPart::Hinge(hinge) => hinge.motor_impulse,
            _ => 0.0,
        }
    }
}

fn motor_row(motor: &HingeMotor, angle: f32, dt: f32) -> Option<(f32, f32)> {
    if !motor.enabled {
        return None;
    }
    let desired_rate = match motor.target {
        MotorTarget::AngularVelocity => motor.target_value,
        MotorTarget::Angle => wrap_angle(motor.target_value - angle) / dt,
    };
    Some((desired_rate, motor.max_impulse))
}

fn limit_rows(limit: &HingeLimit, angle: f32, rate: f32, dt: f32) -> Vec<LimitRow> {
    if !limit.enabled {
        return Vec::new();
    }
    // Gap to each limit and the rate at which it is closing
    [(1.0, angle - limit.low, rate), (-1.0, limit.high - angle, -rate)]
        .into_iter()
        .map(|(sign, gap, closing_rate)| {
            let target = if gap >= 0.0 {
                -gap / dt
            } else {
                let correction = -gap * limit.bias / dt;
                let bounce = -closing_rate * limit.relaxation;
                correction.max(bounce)
            };
            LimitRow { sign, target, impulse: 0.0 }
        })
        .collect()
}

fn solve_hinge(hinge: &mut HingePart, body_a: &mut SolverBody, body_b: &mut SolverBody) {
    for i in 0..2 {
        let direction = hinge.perpendicular[i];
        let relative = (body_b.angular - body_a.angular).dot(&direction);
        let lambda = hinge.perpendicular_mass[i] * (-relative - hinge.perpendicular_bias[i]);
        body_a.apply_angular_impulse(&(-direction * lambda));
        body_b.apply_angular_impulse(&(direction * lambda));
    }

    let axis = hinge.axis;
    if let Some((desired_rate, max_impulse)) = hinge.motor {
        let rate = twist_rate(body_a, body_b, &axis);
        let lambda = hinge.axis_mass * (desired_rate - rate);
        let total = (hinge.motor_impulse + lambda).clamp(-max_impulse, max_impulse);
        let applied = total - hinge.motor_impulse;
        hinge.motor_impulse = total;
        body_a.apply_angular_impulse(&(axis * applied));
        body_b.apply_angular_impulse(&(-axis * applied));
    }

    for row in &mut hinge.limits {
        let rate = twist_rate(body_a, body_b, &axis) * row.sign;
        let lambda = hinge.axis_mass * (row.target - rate);
        let total = (row.impulse + lambda).max(0.0);
        let applied = (total - row.impulse) * row.sign;
        row.impulse = total;
        body_a.apply_angular_impulse(&(axis * applied));
        body_b.apply_angular_impulse(&(-axis * applied));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::{ColliderHandle, SlotMap};
    use crate::foundation::math::{Quat, Translation3};
    use crate::physics::constraint::HingeSettings;
    use approx::assert_relative_eq;

    fn setup(angular: Vec3, linear: Vec3) -> Vec<SolverBody> {
        let mut handles: SlotMap<ColliderHandle, ()> = SlotMap::with_key();
        let body = SolverBody {
            handle: handles.insert(()),
            inverse_mass: 1.0,
            inverse_inertia: Mat3::identity(),
            center: Vec3::zeros(),
            linear,
            angular,
        };
        let world = SolverBody::fixed(handles.insert(()), Vec3::zeros(), Vec3::zeros(), Vec3::zeros());
        vec![body, world]
    }

    fn frames() -> (Iso, Iso) {
        let frame = Iso::from_parts(Translation3::new(0.0, 0.0, 0.0), Quat::identity());
        (frame, frame)
    }

    #[test]
    fn test_point_joint_stops_translation_keeps_spin() {
        let mut bodies = setup(Vec3::new(1.0, 2.0, 3.0), Vec3::new(5.0, 0.0, 0.0));
        let mut joint = JointConstraint::new(&bodies, 0, 1, &ConstraintKind::Point, &frames(), 1.0 / 60.0);
        joint.solve(&mut bodies);
        assert_relative_eq!(bodies[0].linear, Vec3::zeros(), epsilon = 1e-5);
        assert_relative_eq!(bodies[0].angular, Vec3::new(1.0, 2.0, 3.0), epsilon = 1e-5);
    }

    #[test]
    fn test_hinge_keeps_only_axis_rotation() {
        let mut bodies = setup(Vec3::new(1.0, 2.0, 3.0), Vec3::zeros());
        let kind = ConstraintKind::Hinge(HingeSettings::default());
        let mut joint = JointConstraint::new(&bodies, 0, 1, &kind, &frames(), 1.0 / 60.0);
        for _ in 0..4 {
            joint.solve(&mut bodies);
        }
        assert_relative_eq!(bodies[0].angular, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_limit_allows_closing_only_the_gap() {
        let mut settings = HingeSettings::default();
        settings.limit.enabled = true;
        settings.limit.high = 0.1;
        let dt = 0.1;
        let mut bodies = setup(Vec3::new(5.0, 0.0, 0.0), Vec3::zeros());
        let mut joint = JointConstraint::new(&bodies, 0, 1, &ConstraintKind::Hinge(settings), &frames(), dt);
        joint.solve(&mut bodies);
        assert_relative_eq!(bodies[0].angular.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_motor_respects_max_impulse() {
        let mut settings = HingeSettings::default();
        settings.motor = HingeMotor {
            target: MotorTarget::AngularVelocity,
            target_value: 10.0,
            max_impulse: 2.0,
            enabled: true,
        };
        let mut bodies = setup(Vec3::zeros(), Vec3::zeros());
        let mut joint = JointConstraint::new(&bodies, 0, 1, &ConstraintKind::Hinge(settings), &frames(), 1.0 / 60.0);
        for _ in 0..8 {
            joint.solve(&mut bodies);
        }
        assert_relative_eq!(joint.motor_impulse(), 2.0, epsilon = 1e-5);
        assert_relative_eq!(bodies[0].angular.x, 2.0, epsilon = 1e-5);
    }
}
