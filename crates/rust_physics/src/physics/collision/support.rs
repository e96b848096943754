//! Support mappings for convex geometry
//!
//! A support mapping returns the point of a convex set farthest along a
//! direction. GJK, EPA, shape casts and ray marching only ever talk to shapes
//! through this interface.

use crate::foundation::math::{Iso, Vec3};

use super::primitives::Triangle;
use super::shape::{capsule_half_segment, Shape};

/// Number of samples taken around round rims
const RIM_SAMPLES: usize = 8;

/// Convex set queried by direction
pub trait SupportMap {
    /// Farthest point of the set along `direction` (world space)
    fn support(&self, direction: &Vec3) -> Vec3;
}

/// A shape placed in the world by a rigid pose
#[derive(Debug, Clone, Copy)]
pub struct PosedShape<'a> {
    /// Model-space shape with scale already baked in
    pub shape: &'a Shape,
    /// World pose
    pub pose: Iso,
}

impl<'a> PosedShape<'a> {
    /// Pose `shape` at `pose`
    pub fn new(shape: &'a Shape, pose: Iso) -> Self {
        Self { shape, pose }
    }

    /// Points of the shape that can touch a plane facing `direction`,
    /// in world space
    pub fn feature_points(&self, direction: &Vec3) -> Vec<Vec3> {
        let local = self.pose.inverse_transform_vector(direction);
        local_feature_points(self.shape, &local)
            .into_iter()
            .map(|p| self.pose.transform_point(&p.into()).coords)
            .collect()
    }
}

impl SupportMap for PosedShape<'_> {
    fn support(&self, direction: &Vec3) -> Vec3 {
        let local = self.pose.inverse_transform_vector(direction);
        let p = local_support(self.shape, &local);
        self.pose.transform_point(&p.into()).coords
    }
}

impl SupportMap for Triangle {
    fn support(&self, direction: &Vec3) -> Vec3 {
        let [a, b, c] = self.vertices();
        let (da, db, dc) = (a.dot(direction), b.dot(direction), c.dot(direction));
        if da >= db && da >= dc {
            a
        } else if db >= dc {
            b
        } else {
            c
        }
    }
}

/// A single point, used for point containment and sphere cores
#[derive(Debug, Clone, Copy)]
pub struct PointSupport(pub Vec3);

impl SupportMap for PointSupport {
    fn support(&self, _direction: &Vec3) -> Vec3 {
        self.0
    }
}

/// Support point of a model-space shape
///
/// Concave meshes and levelsets answer with their vertex cloud and bounding
/// box respectively; callers only use those for conservative bounds.
pub fn local_support(shape: &Shape, direction: &Vec3) -> Vec3 {
    let d = direction;
    match shape {
        Shape::Box(b) => {
            let h = b.size * 0.5;
            Vec3::new(h.x.copysign(d.x), h.y.copysign(d.y), h.z.copysign(d.z))
        }
        Shape::Sphere(s) => unit_or_x(d) * s.radius,
        Shape::Capsule(c) => {
            let axis = c.axis.unit();
            let h = capsule_half_segment(c);
            axis * h.copysign(d.dot(&axis)) + unit_or_x(d) * c.radius
        }
        Shape::Cylinder(c) => {
            let axis = c.axis.unit();
            let along = axis * (c.length * 0.5).copysign(d.dot(&axis));
            along + radial_direction(d, &axis) * c.radius
        }
        Shape::Cone(c) => {
            let axis = c.axis.unit();
            let apex = axis * (c.length * 0.5);
            let rim = -apex + radial_direction(d, &axis) * c.radius;
            if apex.dot(d) >= rim.dot(d) {
                apex
            } else {
                rim
            }
        }
        Shape::Mesh(mesh) => mesh
            .support_points()
            .iter()
            .copied()
            .max_by(|a, b| a.dot(d).total_cmp(&b.dot(d)))
            .unwrap_or_else(Vec3::zeros),
        Shape::Levelset(levelset) => {
            let aabb = levelset.local_aabb();
            Vec3::new(
                if d.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if d.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if d.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            )
        }
    }
}

/// Candidate contact points of a model-space shape facing `direction`
fn local_feature_points(shape: &Shape, direction: &Vec3) -> Vec<Vec3> {
    match shape {
        Shape::Box(b) => {
            let h = b.size * 0.5;
            let mut corners = Vec::with_capacity(8);
            for sx in [-1.0, 1.0] {
                for sy in [-1.0, 1.0] {
                    for sz in [-1.0, 1.0] {
                        corners.push(Vec3::new(h.x * sx, h.y * sy, h.z * sz));
                    }
                }
            }
            corners
        }
        Shape::Sphere(_) => vec![local_support(shape, direction)],
        Shape::Capsule(c) => {
            let axis = c.axis.unit();
            let h = capsule_half_segment(c);
            let offset = unit_or_x(direction) * c.radius;
            vec![axis * h + offset, -axis * h + offset]
        }
        Shape::Cylinder(c) => {
            let axis = c.axis.unit();
            let half = axis * (c.length * 0.5);
            let mut points = rim_points(&axis, c.radius, &half);
            points.extend(rim_points(&axis, c.radius, &-half));
            points
        }
        Shape::Cone(c) => {
            let axis = c.axis.unit();
            let apex = axis * (c.length * 0.5);
            let mut points = rim_points(&axis, c.radius, &-apex);
            points.push(apex);
            points
        }
        Shape::Mesh(mesh) => mesh.support_points().to_vec(),
        Shape::Levelset(_) => vec![local_support(shape, direction)],
    }
}

fn rim_points(axis: &Vec3, radius: f32, center: &Vec3) -> Vec<Vec3> {
    let (u, v) = crate::foundation::math::utils::orthonormal_basis(axis);
    (0..RIM_SAMPLES)
        .map(|i| {
            let angle = i as f32 / RIM_SAMPLES as f32 * std::f32::consts::TAU;
            center + (u * angle.cos() + v * angle.sin()) * radius
        })
        .collect()
}

fn unit_or_x(v: &Vec3) -> Vec3 {
    v.try_normalize(1.0e-12).unwrap_or_else(Vec3::x)
}

fn radial_direction(d: &Vec3, axis: &Vec3) -> Vec3 {
    (d - axis * d.dot(axis))
        .try_normalize(1.0e-12)
        .unwrap_or_else(Vec3::zeros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Translation3};
    use crate::physics::collision::shape::Axis;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_support_picks_corner() {
        let shape = Shape::cuboid(Vec3::new(2.0, 4.0, 6.0));
        let p = local_support(&shape, &Vec3::new(1.0, -1.0, 0.5));
        assert_relative_eq!(p, Vec3::new(1.0, -2.0, 3.0));
    }

    #[test]
    fn test_capsule_support_includes_cap() {
        let shape = Shape::capsule(Axis::Y, 4.0, 1.0);
        let p = local_support(&shape, &Vec3::y());
        assert_relative_eq!(p, Vec3::new(0.0, 2.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_cone_support_apex_and_rim() {
        let shape = Shape::cone(Axis::Y, 2.0, 1.0);
        assert_relative_eq!(local_support(&shape, &Vec3::y()), Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(local_support(&shape, &Vec3::x()), Vec3::new(1.0, -1.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_posed_support_respects_rotation() {
        let shape = Shape::cuboid(Vec3::new(2.0, 2.0, 2.0));
        let posed = PosedShape::new(
            &shape,
            Iso::from_parts(
                Translation3::new(5.0, 0.0, 0.0),
                Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_4),
            ),
        );
        let p = posed.support(&Vec3::x());
        assert_relative_eq!(p.x, 5.0 + 2.0_f32.sqrt(), epsilon = 1e-5);
    }
}
