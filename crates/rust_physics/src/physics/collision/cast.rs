//! Ray and shape casts against single posed shapes
//!
//! Rays are tested analytically against spheres, boxes, triangles and baked
//! hulls, and by sphere tracing against the remaining convex kinds and
//! levelsets. A ray that starts inside a shape does not hit it; concave
//! meshes only report front-facing triangles for the same reason.
//!
//! Shape casts use conservative advancement: the cast shape moves along its
//! path in steps no longer than the current GJK distance divided by the
//! fastest approach speed of any of its points.

use crate::foundation::math::{Iso, Vec3};

use super::gjk::{gjk_distance, GjkResult};
use super::levelset::LevelsetShape;
use super::mesh::{ConvexHull, MeshShape};
use super::primitives::{BoundingSphere, Ray, AABB};
use super::shape::Shape;
use super::support::{PointSupport, PosedShape, SupportMap};

const MAX_MARCH_STEPS: usize = 128;

/// Hit of a ray against one shape, in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeRayHit {
    /// Distance along the ray
    pub distance: f32,
    /// Hit position
    pub point: Vec3,
    /// Surface normal at the hit
    pub normal: Vec3,
    /// Triangle index and barycentric coordinates for mesh hits
    pub triangle: Option<(usize, [f32; 3])>,
}

/// Hit of a swept shape against one target shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeCastHit {
    /// Fraction of the sweep at first contact, in `[0, 1]`
    pub fraction: f32,
    /// Contact position on the target
    pub point: Vec3,
    /// Target surface normal, facing the cast shape
    pub normal: Vec3,
}

/// Cast `ray` against `shape` posed at `pose`, up to `max_distance`
pub fn ray_cast(shape: &Shape, pose: &Iso, ray: &Ray, max_distance: f32) -> Option<ShapeRayHit> {
    let local_ray = ray.inverse_transformed(pose);
    let local = match shape {
        Shape::Sphere(s) => BoundingSphere::new(Vec3::zeros(), s.radius)
            .intersect_ray(&local_ray)
            .map(|(distance, point, normal)| ShapeRayHit { distance, point, normal, triangle: None }),
        Shape::Box(b) => ray_box(&AABB::from_center_extents(Vec3::zeros(), b.size * 0.5), &local_ray),
        Shape::Mesh(mesh) => match mesh.hull() {
            Some(hull) if !hull.faces.is_empty() => ray_hull(hull, &local_ray),
            Some(_) => None,
            None => ray_triangles(mesh, &local_ray, max_distance),
        },
        Shape::Levelset(levelset) => ray_levelset(levelset, &local_ray, max_distance),
        Shape::Capsule(_) | Shape::Cylinder(_) | Shape::Cone(_) => {
            return ray_march_convex(&PosedShape::new(shape, *pose), ray, max_distance);
        }
    }?;

    (local.distance <= max_distance).then(|| ShapeRayHit {
        distance: local.distance,
        point: pose.transform_point(&local.point.into()).coords,
        normal: pose.transform_vector(&local.normal),
        triangle: local.triangle,
    })
}

fn ray_box(aabb: &AABB, ray: &Ray) -> Option<ShapeRayHit> {
    let (tmin, tmax) = aabb.ray_interval(ray.origin, ray.direction)?;
    if tmin < 0.0 || tmax < 0.0 {
        return None;
    }
    let point = ray.point_at(tmin);
    let extents = aabb.extents();
    let mut normal = Vec3::zeros();
    let mut best = f32::MAX;
    for axis in 0..3 {
        let gap = extents[axis] - point[axis].abs();
        if gap < best {
            best = gap;
            normal = Vec3::zeros();
            normal[axis] = point[axis].signum();
        }
    }
    Some(ShapeRayHit { distance: tmin, point, normal, triangle: None })
}

fn ray_hull(hull: &ConvexHull, ray: &Ray) -> Option<ShapeRayHit> {
    let mut t_enter = 0.0f32;
    let mut t_exit = f32::MAX;
    let mut normal = None;
    for face in &hull.faces {
        let a = hull.points[face[0]];
        let Some(n) = (hull.points[face[1]] - a)
            .cross(&(hull.points[face[2]] - a))
            .try_normalize(1.0e-20)
        else {
            continue;
        };
        let dist = n.dot(&(ray.origin - a));
        let denom = n.dot(&ray.direction);
        if denom.abs() < 1.0e-12 {
            if dist > 0.0 {
                return None;
            }
            continue;
        }
        let t = -dist / denom;
        if denom < 0.0 {
            if t > t_enter || normal.is_none() {
                t_enter = t_enter.max(t);
                normal = Some(n);
            }
        } else {
            t_exit = t_exit.min(t);
        }
    }
    let normal = normal?;
    // Entered before the origin means the ray started inside
    if t_enter <= 0.0 || t_enter > t_exit {
        return None;
    }
    Some(ShapeRayHit { distance: t_enter, point: ray.point_at(t_enter), normal, triangle: None })
}

fn ray_triangles(mesh: &MeshShape, ray: &Ray, max_distance: f32) -> Option<ShapeRayHit> {
    if mesh.local_aabb().intersect_ray(ray.origin, ray.direction)? > max_distance {
        return None;
    }
    let mut best: Option<ShapeRayHit> = None;
    for (index, triangle) in mesh.triangles().enumerate() {
        let normal = triangle.normal();
        if normal.dot(&ray.direction) >= 0.0 {
            continue;
        }
        let Some((t, u, v)) = triangle.intersect_ray(ray) else {
            continue;
        };
        if best.as_ref().map_or(true, |b| t < b.distance) {
            best = Some(ShapeRayHit {
                distance: t,
                point: ray.point_at(t),
                normal,
                triangle: Some((index, [1.0 - u - v, u, v])),
            });
        }
    }
    best
}

fn ray_levelset(levelset: &LevelsetShape, ray: &Ray, max_distance: f32) -> Option<ShapeRayHit> {
    if levelset.distance(&ray.origin) <= 0.0 {
        return None;
    }
    let (t_enter, t_exit) = levelset.local_aabb().ray_interval(ray.origin, ray.direction)?;
    let mut t = t_enter.max(0.0);
    let end = t_exit.min(max_distance);
    let tolerance = levelset.cell_size() * 1.0e-3;
    for _ in 0..MAX_MARCH_STEPS {
        if t > end {
            return None;
        }
        let p = ray.point_at(t);
        let d = levelset.distance(&p);
        if d <= tolerance {
            return Some(ShapeRayHit { distance: t, point: p, normal: levelset.gradient(&p), triangle: None });
        }
        t += d.max(tolerance);
    }
    None
}

/// Sphere tracing with the exact GJK distance to a convex shape
fn ray_march_convex(shape: &PosedShape<'_>, ray: &Ray, max_distance: f32) -> Option<ShapeRayHit> {
    let tolerance = (shape.shape.bounding_radius() * 1.0e-4).max(1.0e-6);
    let bounds = shape.shape.local_aabb().transformed(&shape.pose);
    let (t_enter, _) = bounds.ray_interval(ray.origin, ray.direction)?;
    let mut t = 0.0f32;
    let mut first = true;
    let mut normal = -ray.direction;

    for _ in 0..MAX_MARCH_STEPS {
        if t > max_distance {
            return None;
        }
        let p = ray.point_at(t);
        match gjk_distance(&PointSupport(p), shape, &(shape.pose.translation.vector - p)) {
            GjkResult::Intersecting { .. } => {
                if first {
                    return None;
                }
                return Some(ShapeRayHit { distance: t, point: p, normal, triangle: None });
            }
            GjkResult::Separated { distance, point_b, .. } => {
                normal = (p - point_b) / distance;
                if distance <= tolerance {
                    return Some(ShapeRayHit { distance: t, point: point_b, normal, triangle: None });
                }
                // Skip straight to the bounding box on the first step
                t = if first { (t + distance).max(t_enter) } else { t + distance };
            }
        }
        first = false;
    }
    None
}

/// Sweep `cast` from `start` to `end` against `target` posed at `target_pose`
///
/// `cast` must be convex. Targets that already overlap the cast shape at the
/// start of the sweep are not hit.
pub fn shape_cast(cast: &Shape, start: &Iso, end: &Iso, target: &Shape, target_pose: &Iso) -> Option<ShapeCastHit> {
    match target {
        Shape::Mesh(mesh) if !mesh.is_convex() => {
            let swept = cast
                .local_aabb()
                .transformed(start)
                .union(&cast.local_aabb().transformed(end))
                .expanded(cast.bounding_radius() * 0.5);
            let local_swept = swept.transformed(&target_pose.inverse());
            mesh.triangles()
                .filter(|tri| tri.aabb().intersects(&local_swept))
                .filter_map(|tri| advance(cast, start, end, &tri.transformed(target_pose)))
                .min_by(|a, b| a.fraction.total_cmp(&b.fraction))
        }
        Shape::Levelset(levelset) => sweep_levelset(cast, start, end, levelset, target_pose),
        _ => advance(cast, start, end, &PosedShape::new(target, *target_pose)),
    }
}

fn interpolate(start: &Iso, end: &Iso, t: f32) -> Iso {
    start.lerp_slerp(end, t)
}

fn advance<T: SupportMap + ?Sized>(cast: &Shape, start: &Iso, end: &Iso, target: &T) -> Option<ShapeCastHit> {
    let translation = end.translation.vector - start.translation.vector;
    let rotation_angle = start.rotation.angle_to(&end.rotation);
    let radius = cast.bounding_radius();
    let tolerance = (radius * 1.0e-4).max(1.0e-6);

    let mut t = 0.0f32;
    for step in 0..MAX_MARCH_STEPS {
        let pose = interpolate(start, end, t);
        let moving = PosedShape::new(cast, pose);
        let seed = target.support(&Vec3::x()) - pose.translation.vector;
        match gjk_distance(&moving, target, &seed) {
            GjkResult::Intersecting { .. } => {
                if step == 0 {
                    return None;
                }
                let normal = -translation.try_normalize(1.0e-12).unwrap_or_else(Vec3::y);
                return Some(ShapeCastHit { fraction: t, point: pose.translation.vector, normal });
            }
            GjkResult::Separated { distance, point_a, point_b } => {
                let toward = (point_b - point_a) / distance;
                if distance <= tolerance {
                    return Some(ShapeCastHit { fraction: t, point: point_b, normal: -toward });
                }
                let approach = translation.dot(&toward) + rotation_angle * radius;
                if approach <= 1.0e-12 {
                    return None;
                }
                t += distance / approach;
                if t > 1.0 {
                    return None;
                }
            }
        }
    }
    None
}

fn sweep_levelset(cast: &Shape, start: &Iso, end: &Iso, levelset: &LevelsetShape, pose: &Iso) -> Option<ShapeCastHit> {
    let translation = end.translation.vector - start.translation.vector;
    let travel = translation.norm() + start.rotation.angle_to(&end.rotation) * cast.bounding_radius();
    if travel <= 1.0e-12 {
        return None;
    }
    let tolerance = levelset.cell_size() * 1.0e-3;
    let local_samples: Vec<Vec3> = sample_directions()
        .iter()
        .map(|d| super::support::local_support(cast, d))
        .collect();

    let mut t = 0.0f32;
    for step in 0..MAX_MARCH_STEPS {
        let current = interpolate(start, end, t);
        let (distance, point) = local_samples
            .iter()
            .map(|p| {
                let world = current.transform_point(&(*p).into()).coords;
                let local = pose.inverse_transform_point(&world.into()).coords;
                (levelset.distance(&local), local)
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))?;
        if distance <= tolerance {
            if step == 0 {
                return None;
            }
            return Some(ShapeCastHit {
                fraction: t,
                point: pose.transform_point(&point.into()).coords,
                normal: pose.transform_vector(&levelset.gradient(&point)),
            });
        }
        t += distance / travel;
        if t > 1.0 {
            return None;
        }
    }
    None
}

fn sample_directions() -> Vec<Vec3> {
    let mut dirs = Vec::with_capacity(26);
    for x in -1i8..=1 {
        for y in -1i8..=1 {
            for z in -1i8..=1 {
                if x != 0 || y != 0 || z != 0 {
                    dirs.push(Vec3::new(f32::from(x), f32::from(y), f32::from(z)));
                }
            }
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Translation3};
    use crate::physics::collision::shape::Axis;
    use approx::assert_relative_eq;

    fn at(x: f32, y: f32, z: f32) -> Iso {
        Iso::from_parts(Translation3::new(x, y, z), Quat::identity())
    }

    #[test]
    fn test_ray_hits_box_face() {
        let shape = Shape::cuboid(Vec3::new(2.0, 2.0, 2.0));
        let ray = Ray::new(Vec3::new(-10.0, 0.3, 0.0), Vec3::x());
        let hit = ray_cast(&shape, &at(0.0, 0.0, 0.0), &ray, 100.0);
        let hit = hit.map_or((f32::NAN, Vec3::zeros()), |h| (h.distance, h.normal));
        assert_relative_eq!(hit.0, 9.0, epsilon = 1e-5);
        assert_relative_eq!(hit.1, -Vec3::x(), epsilon = 1e-5);
    }

    #[test]
    fn test_ray_from_inside_misses() {
        let ray = Ray::new(Vec3::zeros(), Vec3::x());
        for shape in [
            Shape::cuboid(Vec3::new(2.0, 2.0, 2.0)),
            Shape::sphere(1.0),
            Shape::capsule(Axis::Y, 3.0, 1.0),
            Shape::cylinder(Axis::Y, 2.0, 1.0),
        ] {
            assert!(ray_cast(&shape, &at(0.0, 0.0, 0.0), &ray, 100.0).is_none(), "{}", shape.name());
        }
    }

    #[test]
    fn test_ray_marches_capsule() {
        let shape = Shape::capsule(Axis::Y, 4.0, 1.0);
        let ray = Ray::new(Vec3::new(0.0, 10.0, 0.0), -Vec3::y());
        let hit = ray_cast(&shape, &at(0.0, 0.0, 0.0), &ray, 100.0).map_or(f32::NAN, |h| h.distance);
        assert_relative_eq!(hit, 8.0, epsilon = 1e-3);
    }

    #[test]
    fn test_ray_respects_max_distance() {
        let shape = Shape::sphere(1.0);
        let ray = Ray::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::x());
        assert!(ray_cast(&shape, &at(0.0, 0.0, 0.0), &ray, 5.0).is_none());
    }

    #[test]
    fn test_sphere_cast_against_box() {
        let target = Shape::cuboid(Vec3::new(2.0, 2.0, 2.0));
        let cast = Shape::sphere(0.5);
        let hit = shape_cast(&cast, &at(-10.0, 0.0, 0.0), &at(10.0, 0.0, 0.0), &target, &at(0.0, 0.0, 0.0));
        let hit = hit.map_or((f32::NAN, Vec3::zeros()), |h| (h.fraction, h.normal));
        // Sphere surface reaches x = -1 after travelling 8.5 of 20
        assert_relative_eq!(hit.0, 8.5 / 20.0, epsilon = 1e-3);
        assert_relative_eq!(hit.1, -Vec3::x(), epsilon = 1e-2);
    }

    #[test]
    fn test_shape_cast_starting_inside_misses() {
        let target = Shape::cuboid(Vec3::new(2.0, 2.0, 2.0));
        let cast = Shape::sphere(0.5);
        let hit = shape_cast(&cast, &at(0.0, 0.0, 0.0), &at(10.0, 0.0, 0.0), &target, &at(0.0, 0.0, 0.0));
        assert!(hit.is_none());
    }
}
