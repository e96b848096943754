//! Constraints between colliders
//!
//! A constraint belongs to an owner body and optionally a target collider;
//! without a target it holds the owner against the world frame. Its anchor
//! is a pivot frame stored once in each endpoint's local space. Anchors are
//! computed from the endpoints' current poses and are invalidated whenever
//! either endpoint's transform version changes (teleport, reset), so a
//! constraint never drifts because a re-anchor was forgotten.

use crate::foundation::collections::ColliderHandle;
use crate::foundation::math::{constants::PI, utils::wrap_angle, Iso, Quat, Translation3, Vec3};

/// Constraint life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintState {
    /// Created, no anchor computed yet
    Detached,
    /// Anchor computed, not yet solved
    Anchored,
    /// Solved every step
    Active,
    /// The target was destroyed; the constraint has no effect
    Broken,
}

/// Joint limit of a hinge, in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HingeLimit {
    /// Lowest allowed angle
    pub low: f32,
    /// Highest allowed angle
    pub high: f32,
    /// Position correction strength in `[0, 1]`
    pub bias: f32,
    /// Bounce off the limit in `[0, 1]`
    pub relaxation: f32,
    /// Whether the limit is enforced
    pub enabled: bool,
}

impl Default for HingeLimit {
    fn default() -> Self {
        Self {
            low: -PI,
            high: PI,
            bias: 0.3,
            relaxation: 0.0,
            enabled: false,
        }
    }
}

/// What a hinge motor drives toward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorTarget {
    /// A hinge angle in radians
    #[default]
    Angle,
    /// An angular velocity in radians per second
    AngularVelocity,
}

/// Hinge motor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HingeMotor {
    /// Target kind
    pub target: MotorTarget,
    /// Target angle or angular velocity
    pub target_value: f32,
    /// Largest angular impulse the motor applies per step
    pub max_impulse: f32,
    /// Whether the motor runs
    pub enabled: bool,
}

impl Default for HingeMotor {
    fn default() -> Self {
        Self {
            target: MotorTarget::Angle,
            target_value: 0.0,
            max_impulse: 1.0,
            enabled: false,
        }
    }
}

/// Hinge parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HingeSettings {
    /// Rotation axis in the owner's local frame
    pub axis: Vec3,
    /// Angle limit
    pub limit: HingeLimit,
    /// Motor
    pub motor: HingeMotor,
}

impl Default for HingeSettings {
    fn default() -> Self {
        Self {
            axis: Vec3::x(),
            limit: HingeLimit::default(),
            motor: HingeMotor::default(),
        }
    }
}

impl HingeSettings {
    /// Copy with every value moved into its valid range
    #[must_use]
    pub fn clamped(&self) -> Self {
        let mut s = *self;
        s.axis = self.axis.try_normalize(1.0e-12).unwrap_or_else(Vec3::x);

        let low = if s.limit.low.is_finite() { s.limit.low.clamp(-PI, PI) } else { -PI };
        let high = if s.limit.high.is_finite() { s.limit.high.clamp(-PI, PI) } else { PI };
        s.limit.low = low.min(high);
        s.limit.high = low.max(high);
        s.limit.bias = finite_unit(s.limit.bias);
        s.limit.relaxation = finite_unit(s.limit.relaxation);

        s.motor.max_impulse = if s.motor.max_impulse.is_finite() { s.motor.max_impulse.max(0.0) } else { 0.0 };
        if !s.motor.target_value.is_finite() {
            s.motor.target_value = 0.0;
        }

        if s != *self {
            log::warn!("Hinge settings adjusted into valid ranges");
        }
        s
    }
}

fn finite_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Kind of constraint
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintKind {
    /// Locks the relative pose
    Fixed,
    /// One rotational degree of freedom
    Hinge(HingeSettings),
    /// Locks the pivot position, rotation is free
    Point,
}

impl ConstraintKind {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Hinge(_) => "hinge",
            Self::Point => "point",
        }
    }
}

/// Constraint creation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintDesc {
    /// Kind and parameters
    pub kind: ConstraintKind,
    /// Other endpoint; `None` is the world frame
    pub target: Option<ColliderHandle>,
    /// World pivot at anchoring time; defaults to the owner's origin
    pub pivot: Option<Vec3>,
}

impl ConstraintDesc {
    /// Constraint of `kind` against the world frame
    pub fn new(kind: ConstraintKind) -> Self {
        Self { kind, target: None, pivot: None }
    }

    /// Set the target collider
    #[must_use]
    pub fn with_target(mut self, target: ColliderHandle) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the world pivot
    #[must_use]
    pub fn with_pivot(mut self, pivot: Vec3) -> Self {
        self.pivot = Some(pivot);
        self
    }
}

/// Pivot frame in each endpoint's local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// Pivot frame relative to the owner
    pub owner_local: Iso,
    /// Pivot frame relative to the target, or in world space
    pub target_local: Iso,
}

impl Anchor {
    /// Anchor for the current poses
    ///
    /// The pivot frame takes the owner's orientation, so hinge axes given in
    /// owner space stay valid in the frame.
    pub fn compute(owner_pose: &Iso, target_pose: Option<&Iso>, pivot: &Vec3) -> Self {
        let frame = Iso::from_parts(Translation3::from(*pivot), owner_pose.rotation);
        let owner_local = owner_pose.inverse() * frame;
        let target_local = target_pose.map_or(frame, |pose| pose.inverse() * frame);
        Self { owner_local, target_local }
    }

    /// World pivot frames `(owner, target)` for the given poses
    pub fn world_frames(&self, owner_pose: &Iso, target_pose: Option<&Iso>) -> (Iso, Iso) {
        let owner = owner_pose * self.owner_local;
        let target = target_pose.map_or(self.target_local, |pose| pose * self.target_local);
        (owner, target)
    }
}

/// Twist of the owner frame relative to the target frame about `axis`
/// (frame-local), in `[-PI, PI]`
pub fn hinge_angle(owner_frame: &Quat, target_frame: &Quat, axis: &Vec3) -> f32 {
    let relative = target_frame.inverse() * owner_frame;
    let q = relative.quaternion();
    wrap_angle(2.0 * q.imag().dot(axis).atan2(q.w))
}

/// A joint owned by a world
#[derive(Debug, Clone)]
pub struct Constraint {
    pub(crate) owner: ColliderHandle,
    pub(crate) target: Option<ColliderHandle>,
    pub(crate) kind: ConstraintKind,
    pub(crate) pivot: Option<Vec3>,
    pub(crate) anchor: Option<Anchor>,
    pub(crate) state: ConstraintState,
    pub(crate) anchored_versions: (u64, u64),
    pub(crate) motor_impulse: f32,
}

impl Constraint {
    pub(crate) fn new(owner: ColliderHandle, desc: &ConstraintDesc) -> Self {
        let kind = match desc.kind {
            ConstraintKind::Hinge(settings) => ConstraintKind::Hinge(settings.clamped()),
            other => other,
        };
        Self {
            owner,
            target: desc.target,
            kind,
            pivot: desc.pivot,
            anchor: None,
            state: ConstraintState::Detached,
            anchored_versions: (0, 0),
            motor_impulse: 0.0,
        }
    }

    /// Body the constraint belongs to
    pub fn owner(&self) -> ColliderHandle {
        self.owner
    }

    /// Other endpoint, `None` for the world frame
    pub fn target(&self) -> Option<ColliderHandle> {
        self.target
    }

    /// Kind and parameters
    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// Life cycle state
    pub fn state(&self) -> ConstraintState {
        self.state
    }

    /// Current anchor, if computed
    pub fn anchor(&self) -> Option<&Anchor> {
        self.anchor.as_ref()
    }

    /// Motor impulse applied during the last step
    pub fn motor_impulse(&self) -> f32 {
        self.motor_impulse
    }

    pub(crate) fn set_hinge(&mut self, settings: &HingeSettings) -> bool {
        match &mut self.kind {
            ConstraintKind::Hinge(current) => {
                *current = settings.clamped();
                true
            }
            _ => false,
        }
    }

    /// Recompute the anchor from the given poses
    pub(crate) fn reanchor(&mut self, owner_pose: &Iso, target_pose: Option<&Iso>, versions: (u64, u64)) {
        let pivot = self.pivot.unwrap_or(owner_pose.translation.vector);
        self.anchor = Some(Anchor::compute(owner_pose, target_pose, &pivot));
        self.anchored_versions = versions;
        // A pivot only holds for the anchoring it was given for
        self.pivot = None;
        if self.state != ConstraintState::Broken {
            self.state = ConstraintState::Anchored;
        }
    }

    pub(crate) fn needs_anchor(&self, versions: (u64, u64)) -> bool {
        self.anchor.is_none() || self.anchored_versions != versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hinge_clamping() {
        let settings = HingeSettings {
            axis: Vec3::new(0.0, 0.0, 2.0),
            limit: HingeLimit { low: 1.0, high: -1.0, bias: 4.0, relaxation: -1.0, enabled: true },
            motor: HingeMotor { max_impulse: -5.0, ..HingeMotor::default() },
        }
        .clamped();

        assert_relative_eq!(settings.axis, Vec3::z());
        assert_eq!((settings.limit.low, settings.limit.high), (-1.0, 1.0));
        assert_eq!(settings.limit.bias, 1.0);
        assert_eq!(settings.limit.relaxation, 0.0);
        assert_eq!(settings.motor.max_impulse, 0.0);
    }

    #[test]
    fn test_anchor_frames_coincide_at_anchoring() {
        let owner = Iso::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.4, 0.0));
        let target = Iso::new(Vec3::new(-2.0, 0.0, 1.0), Vec3::new(0.3, 0.0, 0.1));
        let anchor = Anchor::compute(&owner, Some(&target), &Vec3::new(0.0, 1.0, 0.0));

        let (a, b) = anchor.world_frames(&owner, Some(&target));
        assert_relative_eq!(a.translation.vector, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(b.translation.vector, a.translation.vector, epsilon = 1e-5);
        assert!(a.rotation.angle_to(&b.rotation) < 1e-5);
    }

    #[test]
    fn test_hinge_angle_measures_twist() {
        let target = Quat::identity();
        let owner = Quat::from_axis_angle(&Vec3::x_axis(), 0.7);
        assert_relative_eq!(hinge_angle(&owner, &target, &Vec3::x()), 0.7, epsilon = 1e-5);
        assert_relative_eq!(hinge_angle(&owner.inverse(), &target, &Vec3::x()), -0.7, epsilon = 1e-5);
    }
}
