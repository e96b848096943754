//! Narrow phase contact generation
//!
//! Produces up to four contact points for a pair of posed shapes. Pairs are
//! dispatched on shape kind: sphere/sphere and sphere/capsule are analytic,
//! convex pairs go through GJK/EPA and then grow a manifold from the
//! features facing each other, concave meshes are split into triangles and
//! levelsets are evaluated at surface samples of the other shape.
//!
//! Contacts carry a signed separation. Anything up to `margin` apart is
//! reported so the solver can stop approaching bodies before they overlap.

use crate::foundation::math::{Iso, Vec3};

use super::gjk::{epa, gjk_distance, GjkResult};
use super::levelset::LevelsetShape;
use super::mesh::MeshShape;
use super::primitives::{Triangle, AABB};
use super::shape::{capsule_half_segment, CapsuleShape, Shape};
use super::support::{PointSupport, PosedShape, SupportMap};

/// Most points kept per manifold
pub const MAX_MANIFOLD_POINTS: usize = 4;

/// Contact between two shapes, normal pointing from A toward B
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawContact {
    /// Point on the surface of A
    pub point_a: Vec3,
    /// Point on the surface of B
    pub point_b: Vec3,
    /// Unit normal from A toward B
    pub normal: Vec3,
    /// Signed distance along the normal, negative when overlapping
    pub separation: f32,
}

impl RawContact {
    /// Midpoint between the surface points
    pub fn position(&self) -> Vec3 {
        (self.point_a + self.point_b) * 0.5
    }

    /// Same contact seen from B
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            point_a: self.point_b,
            point_b: self.point_a,
            normal: -self.normal,
            separation: self.separation,
        }
    }
}

/// Convex geometry that can also enumerate candidate contact features
trait ContactFeatures: SupportMap {
    fn feature_points(&self, direction: &Vec3) -> Vec<Vec3>;
    fn feature_tolerance(&self) -> f32;
    fn center(&self) -> Vec3;
}

impl ContactFeatures for PosedShape<'_> {
    fn feature_points(&self, direction: &Vec3) -> Vec<Vec3> {
        PosedShape::feature_points(self, direction)
    }

    fn feature_tolerance(&self) -> f32 {
        (self.shape.bounding_radius() * 0.02).max(1.0e-4)
    }

    fn center(&self) -> Vec3 {
        self.pose.translation.vector
    }
}

impl ContactFeatures for Triangle {
    fn feature_points(&self, _direction: &Vec3) -> Vec<Vec3> {
        self.vertices().to_vec()
    }

    fn feature_tolerance(&self) -> f32 {
        let size = (self.v1 - self.v0).norm().max((self.v2 - self.v0).norm());
        (size * 0.01).max(1.0e-4)
    }

    fn center(&self) -> Vec3 {
        self.centroid()
    }
}

/// Contacts between two posed shapes closer than `margin`
pub fn contacts(a: &Shape, pose_a: &Iso, b: &Shape, pose_b: &Iso, margin: f32) -> Vec<RawContact> {
    let flip = |list: Vec<RawContact>| -> Vec<RawContact> { list.iter().map(RawContact::flipped).collect() };
    match (a, b) {
        (Shape::Sphere(sa), Shape::Sphere(sb)) => {
            sphere_sphere(&pose_a.translation.vector, sa.radius, &pose_b.translation.vector, sb.radius, margin)
                .into_iter()
                .collect()
        }
        (Shape::Sphere(s), Shape::Capsule(c)) => {
            sphere_capsule(&pose_a.translation.vector, s.radius, c, pose_b, margin)
                .into_iter()
                .collect()
        }
        (Shape::Capsule(c), Shape::Sphere(s)) => {
            sphere_capsule(&pose_b.translation.vector, s.radius, c, pose_a, margin)
                .map(|contact| contact.flipped())
                .into_iter()
                .collect()
        }
        _ if !a.is_convex() && !b.is_convex() => {
            log::debug!("No contact generation between {} and {} shapes", a.name(), b.name());
            Vec::new()
        }
        (_, Shape::Mesh(mesh)) if !mesh.is_convex() => {
            convex_triangles(&PosedShape::new(a, *pose_a), mesh, pose_b, margin)
        }
        (Shape::Mesh(mesh), _) if !mesh.is_convex() => {
            flip(convex_triangles(&PosedShape::new(b, *pose_b), mesh, pose_a, margin))
        }
        (_, Shape::Levelset(levelset)) => {
            convex_levelset(&PosedShape::new(a, *pose_a), levelset, pose_b, margin)
        }
        (Shape::Levelset(levelset), _) => {
            flip(convex_levelset(&PosedShape::new(b, *pose_b), levelset, pose_a, margin))
        }
        _ => convex_convex(&PosedShape::new(a, *pose_a), &PosedShape::new(b, *pose_b), margin),
    }
}

fn sphere_sphere(ca: &Vec3, ra: f32, cb: &Vec3, rb: f32, margin: f32) -> Option<RawContact> {
    let delta = cb - ca;
    let distance = delta.norm();
    let separation = distance - ra - rb;
    if separation > margin {
        return None;
    }
    let normal = delta.try_normalize(1.0e-9).unwrap_or_else(Vec3::y);
    Some(RawContact {
        point_a: ca + normal * ra,
        point_b: cb - normal * rb,
        normal,
        separation,
    })
}

fn sphere_capsule(center: &Vec3, radius: f32, capsule: &CapsuleShape, pose: &Iso, margin: f32) -> Option<RawContact> {
    let axis = pose.rotation * capsule.axis.unit();
    let h = capsule_half_segment(capsule);
    let mid = pose.translation.vector;
    let t = (center - mid).dot(&axis).clamp(-h, h);
    let closest = mid + axis * t;
    sphere_sphere(center, radius, &closest, capsule.radius, margin)
}

fn convex_convex<A, B>(a: &A, b: &B, margin: f32) -> Vec<RawContact>
where
    A: ContactFeatures,
    B: ContactFeatures,
{
    let offset = b.center() - a.center();
    let base = match gjk_distance(a, b, &offset) {
        GjkResult::Separated { distance, point_a, point_b } => {
            if distance > margin {
                return Vec::new();
            }
            RawContact {
                point_a,
                point_b,
                normal: (point_b - point_a) / distance,
                separation: distance,
            }
        }
        GjkResult::Intersecting { simplex } => match epa(a, b, &simplex) {
            Some(pen) => RawContact {
                point_a: pen.point_a,
                point_b: pen.point_b,
                normal: pen.normal,
                separation: -pen.depth,
            },
            None => {
                let normal = offset.try_normalize(1.0e-9).unwrap_or_else(Vec3::y);
                RawContact {
                    point_a: a.support(&normal),
                    point_b: b.support(&-normal),
                    normal,
                    separation: 0.0,
                }
            }
        },
    };

    let mut points = manifold_points(a, b, &base);
    if points.is_empty() {
        points.push(base);
    }
    reduce_manifold(points)
}

/// Grow a manifold from the features of A and B facing each other
fn manifold_points<A, B>(a: &A, b: &B, base: &RawContact) -> Vec<RawContact>
where
    A: ContactFeatures,
    B: ContactFeatures,
{
    let n = base.normal;
    let plane_a = a.support(&n).dot(&n);
    let plane_b = b.support(&-n).dot(&n);
    let tol_a = a.feature_tolerance();
    let tol_b = b.feature_tolerance();
    let mut points = Vec::new();

    for p in a.feature_points(&n) {
        if p.dot(&n) < plane_a - tol_a {
            continue;
        }
        let separation = plane_b - p.dot(&n);
        let projected = p + n * separation;
        if contains_point(b, &projected, tol_b) {
            points.push(RawContact {
                point_a: p,
                point_b: projected,
                normal: n,
                separation,
            });
        }
    }

    for p in b.feature_points(&-n) {
        if p.dot(&n) > plane_b + tol_b {
            continue;
        }
        let separation = p.dot(&n) - plane_a;
        let projected = p - n * separation;
        if contains_point(a, &projected, tol_a) {
            let duplicate = points
                .iter()
                .any(|c| (c.point_a - projected).norm() <= tol_a.max(tol_b));
            if !duplicate {
                points.push(RawContact {
                    point_a: projected,
                    point_b: p,
                    normal: n,
                    separation,
                });
            }
        }
    }
    points
}

fn contains_point<S: SupportMap + ?Sized>(shape: &S, point: &Vec3, tolerance: f32) -> bool {
    let probe = PointSupport(*point);
    match gjk_distance(&probe, shape, &Vec3::x()) {
        GjkResult::Separated { distance, .. } => distance <= tolerance,
        GjkResult::Intersecting { .. } => true,
    }
}

/// Keep the deepest point and the ones spanning the largest area
pub fn reduce_manifold(mut points: Vec<RawContact>) -> Vec<RawContact> {
    if points.len() <= MAX_MANIFOLD_POINTS {
        return points;
    }
    let deepest = (0..points.len())
        .min_by(|&i, &j| points[i].separation.total_cmp(&points[j].separation))
        .unwrap_or(0);
    let mut kept = vec![points.swap_remove(deepest)];

    let p0 = kept[0].position();
    if let Some(i) = farthest(&points, |c| (c.position() - p0).norm_squared()) {
        kept.push(points.swap_remove(i));
    }
    let p1 = kept[1].position();
    let line = p1 - p0;
    if let Some(i) = farthest(&points, |c| (c.position() - p0).cross(&line).norm_squared()) {
        kept.push(points.swap_remove(i));
    }
    let centroid = kept.iter().map(RawContact::position).sum::<Vec3>() / kept.len() as f32;
    if let Some(i) = farthest(&points, |c| (c.position() - centroid).norm_squared()) {
        kept.push(points.swap_remove(i));
    }
    kept
}

fn farthest(points: &[RawContact], metric: impl Fn(&RawContact) -> f32) -> Option<usize> {
    (0..points.len()).max_by(|&i, &j| metric(&points[i]).total_cmp(&metric(&points[j])))
}

fn convex_triangles(convex: &PosedShape<'_>, mesh: &MeshShape, mesh_pose: &Iso, margin: f32) -> Vec<RawContact> {
    let world_bounds = convex.shape.local_aabb().transformed(&convex.pose).expanded(margin);
    let local_bounds = world_bounds.transformed(&mesh_pose.inverse());

    let mut found = Vec::new();
    for triangle in mesh.triangles() {
        if !triangle.aabb().intersects(&local_bounds) {
            continue;
        }
        let world = triangle.transformed(mesh_pose);
        found.extend(convex_convex(convex, &world, margin));
    }
    reduce_manifold(found)
}

fn convex_levelset(convex: &PosedShape<'_>, levelset: &LevelsetShape, pose: &Iso, margin: f32) -> Vec<RawContact> {
    let to_local = |p: &Vec3| pose.inverse_transform_point(&(*p).into()).coords;
    let world_bounds: AABB = levelset.local_aabb().transformed(pose).expanded(margin);
    let convex_bounds = convex.shape.local_aabb().transformed(&convex.pose);
    if !world_bounds.intersects(&convex_bounds) {
        return Vec::new();
    }

    let mut found = Vec::new();
    if let Shape::Sphere(sphere) = convex.shape {
        let center = convex.pose.translation.vector;
        let local = to_local(&center);
        let separation = levelset.distance(&local) - sphere.radius;
        if separation <= margin {
            let outward = pose.rotation * levelset.gradient(&local);
            found.push(RawContact {
                point_a: center - outward * sphere.radius,
                point_b: center - outward * (separation + sphere.radius),
                normal: -outward,
                separation,
            });
        }
        return found;
    }

    for p in surface_samples(convex) {
        let local = to_local(&p);
        let separation = levelset.distance(&local);
        if separation > margin {
            continue;
        }
        let outward = pose.rotation * levelset.gradient(&local);
        found.push(RawContact {
            point_a: p,
            point_b: p - outward * separation,
            normal: -outward,
            separation,
        });
    }
    reduce_manifold(found)
}

/// Support points in 26 directions plus every feature point
fn surface_samples(shape: &PosedShape<'_>) -> Vec<Vec3> {
    let mut samples = Vec::new();
    for x in -1i8..=1 {
        for y in -1i8..=1 {
            for z in -1i8..=1 {
                if x == 0 && y == 0 && z == 0 {
                    continue;
                }
                let d = Vec3::new(f32::from(x), f32::from(y), f32::from(z));
                samples.push(shape.support(&d));
                if x.abs() + y.abs() + z.abs() == 1 {
                    samples.extend(shape.feature_points(&d));
                }
            }
        }
    }
    let tolerance = (shape.shape.bounding_radius() * 1.0e-3).max(1.0e-6);
    let mut unique: Vec<Vec3> = Vec::with_capacity(samples.len());
    for p in samples {
        if unique.iter().all(|q| (q - p).norm() > tolerance) {
            unique.push(p);
        }
    }
    unique
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
    fn test_sphere_sphere_single_contact() {
        let s = Shape::sphere(50.0);
        let found = contacts(&s, &at(0.0, -100.0, 0.0), &s, &at(0.0, 1.0, 0.0), 1.5);
        assert_eq!(found.len(), 1);
        assert_relative_eq!(found[0].separation, 1.0, epsilon = 1e-4);
        assert_relative_eq!(found[0].normal, Vec3::y(), epsilon = 1e-6);
        assert_relative_eq!(found[0].position(), Vec3::new(0.0, -49.5, 0.0), epsilon = 1e-4);

        let touching = contacts(&s, &at(0.0, -100.0, 0.0), &s, &at(0.0, 0.0, 0.0), 0.0);
        assert_eq!(touching.len(), 1);
        assert_relative_eq!(touching[0].separation, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_margin_culls_far_pairs() {
        let s = Shape::sphere(1.0);
        assert!(contacts(&s, &at(0.0, 0.0, 0.0), &s, &at(3.0, 0.0, 0.0), 0.5).is_empty());
        assert_eq!(contacts(&s, &at(0.0, 0.0, 0.0), &s, &at(3.0, 0.0, 0.0), 1.5).len(), 1);
    }

    #[test]
    fn test_box_resting_on_box_has_four_points() {
        let ground = Shape::cuboid(Vec3::new(10.0, 1.0, 10.0));
        let crate_box = Shape::cuboid(Vec3::new(1.0, 1.0, 1.0));
        let found = contacts(&crate_box, &at(0.0, 0.99, 0.0), &ground, &at(0.0, 0.0, 0.0), 0.1);
        assert_eq!(found.len(), 4);
        for c in &found {
            assert_relative_eq!(c.normal, -Vec3::y(), epsilon = 1e-3);
            assert_relative_eq!(c.separation, -0.01, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_sphere_on_box_has_one_point() {
        let ground = Shape::cuboid(Vec3::new(10.0, 1.0, 10.0));
        let ball = Shape::sphere(0.5);
        let found = contacts(&ball, &at(1.0, 1.02, 0.0), &ground, &at(0.0, 0.0, 0.0), 0.1);
        assert_eq!(found.len(), 1);
        assert_relative_eq!(found[0].separation, 0.02, epsilon = 1e-3);
        assert_relative_eq!(found[0].normal, -Vec3::y(), epsilon = 1e-3);
    }

    #[test]
    fn test_sphere_capsule_flipped_normal() {
        let ball = Shape::sphere(1.0);
        let capsule = Shape::capsule(Axis::X, 6.0, 1.0);
        let found = contacts(&capsule, &at(0.0, 0.0, 0.0), &ball, &at(2.0, 1.5, 0.0), 0.0);
        assert_eq!(found.len(), 1);
        assert_relative_eq!(found[0].normal, Vec3::y(), epsilon = 1e-5);
        assert_relative_eq!(found[0].separation, -0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_box_on_triangle_mesh_floor() {
        let vertices = [
            Vec3::new(-5.0, 0.0, -5.0),
            Vec3::new(5.0, 0.0, -5.0),
            Vec3::new(5.0, 0.0, 5.0),
            Vec3::new(-5.0, 0.0, 5.0),
        ];
        let floor = MeshShape::from_mesh(&vertices, &[0, 2, 1, 0, 3, 2], false)
            .map(Shape::Mesh)
            .unwrap_or_else(|_| Shape::sphere(1.0));
        let crate_box = Shape::cuboid(Vec3::new(1.0, 1.0, 1.0));
        let found = contacts(&crate_box, &at(0.3, 0.49, 0.2), &floor, &at(0.0, 0.0, 0.0), 0.05);
        assert!(!found.is_empty());
        for c in &found {
            assert_relative_eq!(c.separation, -0.01, epsilon = 2e-3);
            assert_relative_eq!(c.normal.y.abs(), 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_sphere_on_levelset_ground() {
        let ground = LevelsetShape::from_fn(Vec3::new(-4.0, -2.0, -4.0), 0.5, [17, 9, 17], |p| p.y)
            .map(Shape::Levelset)
            .unwrap_or_else(|_| Shape::sphere(1.0));
        let ball = Shape::sphere(1.0);
        let found = contacts(&ball, &at(0.0, 0.9, 0.0), &ground, &at(0.0, 0.0, 0.0), 0.05);
        assert_eq!(found.len(), 1);
        assert_relative_eq!(found[0].separation, -0.1, epsilon = 1e-3);
        assert_relative_eq!(found[0].normal, -Vec3::y(), epsilon = 1e-3);
    }

    #[test]
    fn test_concave_pairs_produce_nothing() {
        let vertices = [Vec3::zeros(), Vec3::x(), Vec3::z()];
        let mesh = MeshShape::from_mesh(&vertices, &[0, 1, 2], false)
            .map(Shape::Mesh)
            .unwrap_or_else(|_| Shape::sphere(1.0));
        assert!(contacts(&mesh, &at(0.0, 0.0, 0.0), &mesh, &at(0.0, 0.0, 0.0), 1.0).is_empty());
    }
}
