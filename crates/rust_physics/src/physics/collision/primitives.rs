//! Primitive collision geometry and intersection algorithms
//!
//! Provides basic geometric primitives (rays, boxes, spheres, triangles) with
//! the intersection tests the broad phase, narrow phase and queries build on.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Iso, Mat3, Vec3};

/// A ray for ray casting and picking
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray (normalized)
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.try_normalize(1.0e-12).unwrap_or_else(Vec3::x),
        }
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Express this ray in the local frame of `iso`
    pub fn inverse_transformed(&self, iso: &Iso) -> Self {
        Self {
            origin: iso.inverse_transform_point(&self.origin.into()).coords,
            direction: iso.inverse_transform_vector(&self.direction),
        }
    }
}

/// Axis-Aligned Bounding Box for broad phase and spatial queries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// An inverted box that any union will replace
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    /// Smallest box containing all `points`
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        points.into_iter().fold(Self::empty(), |aabb, p| aabb.including(p))
    }

    /// Whether min <= max on every axis
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Radius of the sphere circumscribing the box
    pub fn bounding_radius(&self) -> f32 {
        self.extents().norm()
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Whether `other` lies entirely inside this box
    pub fn contains(&self, other: &Self) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Grow to include a point
    #[must_use]
    pub fn including(&self, point: &Vec3) -> Self {
        Self {
            min: self.min.inf(point),
            max: self.max.sup(point),
        }
    }

    /// Smallest box containing both boxes
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Grow by `margin` on every side
    #[must_use]
    pub fn expanded(&self, margin: f32) -> Self {
        let m = Vec3::repeat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Box covering this box at its start and after moving by `displacement`
    #[must_use]
    pub fn swept(&self, displacement: &Vec3) -> Self {
        self.union(&Self::new(self.min + displacement, self.max + displacement))
    }

    /// World box of this local box after applying a rigid pose
    #[must_use]
    pub fn transformed(&self, iso: &Iso) -> Self {
        let rotation: Mat3 = iso.rotation.to_rotation_matrix().into_inner();
        let abs = rotation.abs();
        let center = iso.transform_point(&self.center().into()).coords;
        Self::from_center_extents(center, abs * self.extents())
    }

    /// Test ray intersection with this AABB using slab method
    /// Returns the distance to the entry point if the ray intersects, None otherwise
    /// Based on "An Efficient and Robust Ray–Box Intersection Algorithm"
    pub fn intersect_ray(&self, ray_origin: Vec3, ray_dir: Vec3) -> Option<f32> {
        let (tmin, tmax) = self.ray_interval(ray_origin, ray_dir)?;
        // Entry point distance (or 0 if we're inside the box)
        Some(tmin.max(0.0)).filter(|_| tmax >= 0.0)
    }

    /// Entry and exit parameters of the infinite line through the box
    pub fn ray_interval(&self, ray_origin: Vec3, ray_dir: Vec3) -> Option<(f32, f32)> {
        let mut tmin = f32::NEG_INFINITY;
        let mut tmax = f32::INFINITY;
        for axis in 0..3 {
            let d = ray_dir[axis];
            let o = ray_origin[axis];
            if d.abs() < 1.0e-12 {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let t1 = (self.min[axis] - o) * inv;
            let t2 = (self.max[axis] - o) * inv;
            tmin = tmin.max(t1.min(t2));
            tmax = tmax.min(t1.max(t2));
        }
        (tmax >= tmin).then_some((tmin, tmax))
    }
}

/// A bounding sphere for collision detection
#[derive(Debug, Clone, Copy)]
pub struct BoundingSphere {
    /// The center position of the sphere
    pub center: Vec3,
    /// The radius of the sphere
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a new bounding sphere with the given center and radius
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Signed gap between two spheres (negative when they overlap)
    pub fn separation(&self, other: &Self) -> f32 {
        (self.center - other.center).norm() - (self.radius + other.radius)
    }

    /// Test ray intersection with this sphere
    ///
    /// Returns `(distance, hit_point, normal)` for the entry point. A ray that
    /// starts inside the sphere does not hit it.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, Vec3, Vec3)> {
        // Vector from ray origin to sphere center
        let oc = ray.origin - self.center;

        // Solve: |origin + t*direction - center|^2 = radius^2 with |direction| = 1
        let b = oc.dot(&ray.direction);
        let c = oc.dot(&oc) - self.radius * self.radius;
        if c < 0.0 {
            return None;
        }

        let discriminant = b * b - c;
        if discriminant < 0.0 || b > 0.0 {
            return None;
        }

        let t = (-b - discriminant.sqrt()).max(0.0);
        let hit_point = ray.point_at(t);
        let normal = (hit_point - self.center)
            .try_normalize(1.0e-12)
            .unwrap_or(-ray.direction);

        Some((t, hit_point, normal))
    }
}

/// A triangle for collision detection
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    /// First vertex
    pub v0: Vec3,
    /// Second vertex
    pub v1: Vec3,
    /// Third vertex
    pub v2: Vec3,
}

impl Triangle {
    /// Creates a new triangle
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// Vertices as an array
    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }

    /// Unnormalized normal (right-hand rule), length is twice the area
    pub fn scaled_normal(&self) -> Vec3 {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Calculates the normal of the triangle (right-hand rule)
    pub fn normal(&self) -> Vec3 {
        self.scaled_normal().try_normalize(1.0e-12).unwrap_or_else(Vec3::y)
    }

    /// Calculates the centroid (center point) of the triangle
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Apply a rigid pose to every vertex
    #[must_use]
    pub fn transformed(&self, iso: &Iso) -> Self {
        let t = |v: &Vec3| iso.transform_point(&(*v).into()).coords;
        Self::new(t(&self.v0), t(&self.v1), t(&self.v2))
    }

    /// Bounding box of the triangle
    pub fn aabb(&self) -> AABB {
        AABB::from_points(&self.vertices())
    }

    /// Möller-Trumbore ray-triangle intersection algorithm
    /// Returns (t, u, v) barycentric coordinates if hit, None otherwise
    ///
    /// See: "Fast, Minimum Storage Ray/Triangle Intersection" by Möller & Trumbore
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, f32, f32)> {
        const EPSILON: f32 = 0.000001;

        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction.cross(&edge2);
        let a = edge1.dot(&h);

        // Ray parallel to triangle?
        if a.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * ray.direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(&q);
        (t >= 0.0).then_some((t, u, v))
    }

    /// Get the closest point on the triangle to a given point
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let [a, b, c] = self.closest_point_barycentric(point);
        self.v0 * a + self.v1 * b + self.v2 * c
    }

    /// Barycentric weights of the closest point on the triangle to `point`
    ///
    /// Voronoi region walk from Ericson, "Real-Time Collision Detection" 5.1.5.
    pub fn closest_point_barycentric(&self, point: Vec3) -> [f32; 3] {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let v0_to_point = point - self.v0;
        let d1 = edge1.dot(&v0_to_point);
        let d2 = edge2.dot(&v0_to_point);
        if d1 <= 0.0 && d2 <= 0.0 {
            return [1.0, 0.0, 0.0];
        }

        let v1_to_point = point - self.v1;
        let d3 = edge1.dot(&v1_to_point);
        let d4 = edge2.dot(&v1_to_point);
        if d3 >= 0.0 && d4 <= d3 {
            return [0.0, 1.0, 0.0];
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return [1.0 - v, v, 0.0];
        }

        let v2_to_point = point - self.v2;
        let d5 = edge1.dot(&v2_to_point);
        let d6 = edge2.dot(&v2_to_point);
        if d6 >= 0.0 && d5 <= d6 {
            return [0.0, 0.0, 1.0];
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return [1.0 - w, 0.0, w];
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return [0.0, 1.0 - w, w];
        }

        let denom = va + vb + vc;
        if denom.abs() < 1.0e-20 {
            return [1.0, 0.0, 0.0];
        }
        let v = vb / denom;
        let w = vc / denom;
        [1.0 - v - w, v, w]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Translation3};
    use approx::assert_relative_eq;

    #[test]
    fn test_aabb_contains_point() {
        let aabb = AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(aabb.contains_point(&Vec3::zeros()));
        assert!(!aabb.contains_point(&Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_aabb_ray_slab() {
        let aabb = AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let t = aabb.intersect_ray(Vec3::new(-5.0, 0.0, 0.0), Vec3::x());
        assert_relative_eq!(t.unwrap_or(f32::NAN), 4.0, epsilon = 1e-5);
        assert!(aabb.intersect_ray(Vec3::new(-5.0, 3.0, 0.0), Vec3::x()).is_none());
        assert!(aabb.intersect_ray(Vec3::new(5.0, 0.0, 0.0), Vec3::x()).is_none());
    }

    #[test]
    fn test_aabb_transformed_rotated_box_grows() {
        let aabb = AABB::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        let iso = Iso::from_parts(
            Translation3::new(10.0, 0.0, 0.0),
            Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_4),
        );
        let world = aabb.transformed(&iso);
        assert_relative_eq!(world.center(), Vec3::new(10.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(world.extents().x, 2.0_f32.sqrt(), epsilon = 1e-5);
        assert_relative_eq!(world.extents().y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_ray_from_inside_misses() {
        let sphere = BoundingSphere::new(Vec3::zeros(), 1.0);
        assert!(sphere.intersect_ray(&Ray::new(Vec3::zeros(), Vec3::x())).is_none());

        let hit = sphere.intersect_ray(&Ray::new(Vec3::new(-3.0, 0.0, 0.0), Vec3::x()));
        let (t, point, normal) = hit.unwrap_or((f32::NAN, Vec3::zeros(), Vec3::zeros()));
        assert_relative_eq!(t, 2.0, epsilon = 1e-5);
        assert_relative_eq!(point, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(normal, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_triangle_ray_and_closest_point() {
        let tri = Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        );
        let ray = Ray::new(Vec3::new(0.25, 2.0, 0.25), -Vec3::y());
        let (t, _, _) = tri.intersect_ray(&ray).unwrap_or((f32::NAN, 0.0, 0.0));
        assert_relative_eq!(t, 2.0, epsilon = 1e-5);

        let p = tri.closest_point(Vec3::new(2.0, 1.0, -1.0));
        assert_relative_eq!(p, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
        let p = tri.closest_point(Vec3::new(0.2, 5.0, 0.2));
        assert_relative_eq!(p, Vec3::new(0.2, 0.0, 0.2), epsilon = 1e-5);
    }
}
