//! Triangle mesh collision shapes
//!
//! A mesh keeps its model-space triangles. With the `convex` flag set it also
//! bakes the convex hull of its vertices, and collision treats the mesh as
//! that hull. Concave meshes are only ever collided triangle by triangle;
//! splitting them into convex pieces is left to the caller.

use crate::foundation::math::{Mat3, Vec3};
use crate::physics::error::{PhysicsError, Result};

use super::primitives::{Triangle, AABB};
use super::shape::{MassProperties, MIN_EXTENT};

/// Mesh collision shape in model space
#[derive(Debug, Clone, Default)]
pub struct MeshShape {
    vertices: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
    hull: Option<ConvexHull>,
    aabb: Option<AABB>,
    bounding_radius: f32,
}

/// Convex hull baked from a vertex cloud
#[derive(Debug, Clone, Default)]
pub struct ConvexHull {
    /// Hull vertices
    pub points: Vec<Vec3>,
    /// Outward-wound faces indexing into `points`
    pub faces: Vec<[usize; 3]>,
}

impl MeshShape {
    /// Build a mesh from model-space vertices and a flat index list
    ///
    /// The index count must be a multiple of three and every index must refer
    /// to an existing vertex.
    pub fn from_mesh(vertices: &[Vec3], indices: &[u32], convex: bool) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(PhysicsError::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(PhysicsError::InvalidMesh(format!(
                "index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }
        if vertices.iter().any(|v| !v.iter().all(|c| c.is_finite())) {
            return Err(PhysicsError::InvalidMesh("non-finite vertex".to_string()));
        }

        let triangles = indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        Ok(Self::from_parts(vertices.to_vec(), triangles, convex))
    }

    /// Convex mesh given only by a point cloud
    pub fn convex_hull(points: &[Vec3]) -> Result<Self> {
        let hull = ConvexHull::build(points)
            .ok_or_else(|| PhysicsError::InvalidMesh("point cloud is degenerate".to_string()))?;
        let indices = hull
            .faces
            .iter()
            .map(|f| [f[0] as u32, f[1] as u32, f[2] as u32])
            .collect();
        Ok(Self::from_parts(hull.points.clone(), indices, true))
    }

    fn from_parts(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>, convex: bool) -> Self {
        let hull = if convex {
            let hull = ConvexHull::build(&vertices);
            if hull.is_none() && !vertices.is_empty() {
                log::warn!("Convex mesh with {} vertices is flat; keeping it as a point cloud", vertices.len());
            }
            Some(hull.unwrap_or_else(|| ConvexHull {
                points: vertices.clone(),
                faces: Vec::new(),
            }))
        } else {
            None
        };
        let aabb = (!vertices.is_empty()).then(|| AABB::from_points(&vertices));
        let bounding_radius = vertices.iter().map(Vec3::norm).fold(0.0, f32::max);
        Self {
            vertices,
            indices,
            hull,
            aabb,
            bounding_radius,
        }
    }

    /// Whether collision uses the baked hull
    pub fn is_convex(&self) -> bool {
        self.hull.is_some()
    }

    /// Model-space vertices
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Triangle index triples
    pub fn indices(&self) -> &[[u32; 3]] {
        &self.indices
    }

    /// The baked hull, when convex
    pub fn hull(&self) -> Option<&ConvexHull> {
        self.hull.as_ref()
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Model-space triangle by index
    pub fn triangle(&self, index: usize) -> Triangle {
        let [a, b, c] = self.indices[index];
        Triangle::new(
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        )
    }

    /// Iterate model-space triangles
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.indices.len()).map(move |i| self.triangle(i))
    }

    /// Points used for support mapping
    pub fn support_points(&self) -> &[Vec3] {
        self.hull.as_ref().map_or(&self.vertices, |h| &h.points)
    }

    /// Model-space bounds
    pub fn local_aabb(&self) -> AABB {
        self.aabb
            .unwrap_or_else(|| AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(MIN_EXTENT)))
    }

    /// Distance of the farthest vertex from the origin
    pub fn bounding_radius(&self) -> f32 {
        self.bounding_radius
    }

    /// A mesh needs at least one triangle
    pub fn validate(&self) -> Result<()> {
        if self.indices.is_empty() && self.support_points().len() < 4 {
            Err(PhysicsError::InvalidShape("mesh has no triangles".to_string()))
        } else {
            Ok(())
        }
    }

    /// Copy with every vertex scaled per axis
    pub fn scaled(&self, scale: &Vec3) -> Self {
        let scale_points = |points: &[Vec3]| points.iter().map(|v| v.component_mul(scale)).collect::<Vec<_>>();
        let vertices = scale_points(&self.vertices);
        let hull = self.hull.as_ref().map(|h| ConvexHull {
            points: scale_points(&h.points),
            faces: h.faces.clone(),
        });
        let aabb = (!vertices.is_empty()).then(|| AABB::from_points(&vertices));
        let bounding_radius = vertices.iter().map(Vec3::norm).fold(0.0, f32::max);
        Self {
            vertices,
            indices: self.indices.clone(),
            hull,
            aabb,
            bounding_radius,
        }
    }

    /// Mass properties of the enclosed volume
    ///
    /// Uses the hull for convex meshes and the triangles otherwise, which
    /// must then form a closed surface. Open or flat meshes fall back to
    /// their bounding box.
    pub fn mass_properties(&self, density: f32) -> MassProperties {
        let closed = match &self.hull {
            Some(hull) if !hull.faces.is_empty() => Some(closed_surface_properties(
                hull.faces.iter().map(|f| (hull.points[f[0]], hull.points[f[1]], hull.points[f[2]])),
                density,
            )),
            Some(_) => None,
            None => Some(closed_surface_properties(
                self.triangles().map(|t| (t.v0, t.v1, t.v2)),
                density,
            )),
        };

        match closed {
            Some(props) if props.mass.abs() > 1.0e-9 => props,
            _ => {
                let aabb = self.local_aabb();
                let size = (aabb.max - aabb.min).map(|v| v.max(MIN_EXTENT));
                let mass = size.x * size.y * size.z * density;
                let s2 = size.component_mul(&size);
                let about_center = MassProperties {
                    mass,
                    center_of_mass: Vec3::zeros(),
                    inertia: Mat3::from_diagonal(&Vec3::new(s2.y + s2.z, s2.x + s2.z, s2.x + s2.y)) * (mass / 12.0),
                };
                about_center.transformed(&Mat3::identity(), &aabb.center())
            }
        }
    }
}

/// Volume integrals of a closed, consistently wound surface
///
/// Sums signed tetrahedra against the origin (Blow and Binstock, "How to find
/// the inertia tensor (or other mass properties) of a 3D solid body
/// represented by a triangle mesh"). Inward winding is corrected by sign.
fn closed_surface_properties(
    triangles: impl Iterator<Item = (Vec3, Vec3, Vec3)>,
    density: f32,
) -> MassProperties {
    let canonical = Mat3::new(
        2.0, 1.0, 1.0,
        1.0, 2.0, 1.0,
        1.0, 1.0, 2.0,
    ) / 120.0;

    let mut volume = 0.0;
    let mut first_moment = Vec3::zeros();
    let mut covariance = Mat3::zeros();
    for (a, b, c) in triangles {
        let basis = Mat3::from_columns(&[a, b, c]);
        let det = basis.determinant();
        volume += det / 6.0;
        first_moment += (a + b + c) * (det / 24.0);
        covariance += basis * canonical * basis.transpose() * det;
    }

    let sign = if volume < 0.0 { -1.0 } else { 1.0 };
    let mass = volume * sign * density;
    let covariance = covariance * (sign * density);
    let center_of_mass = if volume.abs() > 1.0e-12 {
        first_moment / volume
    } else {
        Vec3::zeros()
    };

    MassProperties {
        mass,
        center_of_mass,
        inertia: Mat3::identity() * covariance.trace() - covariance,
    }
}

impl ConvexHull {
    /// Incremental convex hull of a point cloud
    ///
    /// Returns `None` when the points do not span a volume.
    pub fn build(points: &[Vec3]) -> Option<Self> {
        if points.len() < 4 {
            return None;
        }
        let aabb = AABB::from_points(points);
        let eps = (aabb.max - aabb.min).amax().max(1.0) * 1.0e-5;

        let i0 = (0..points.len()).min_by(|&a, &b| points[a].x.total_cmp(&points[b].x))?;
        let i1 = farthest(points, |p| (p - points[i0]).norm_squared())?;
        let line = points[i1] - points[i0];
        let i2 = farthest(points, |p| (p - points[i0]).cross(&line).norm_squared())?;
        let plane = line.cross(&(points[i2] - points[i0]));
        let i3 = farthest(points, |p| (p - points[i0]).dot(&plane).abs())?;

        let volume = (points[i3] - points[i0]).dot(&plane);
        if line.norm() <= eps || plane.norm() <= eps * eps || volume.abs() <= eps * eps * eps {
            return None;
        }

        let mut faces: Vec<[usize; 3]> = if volume < 0.0 {
            vec![[i0, i1, i2], [i0, i3, i1], [i1, i3, i2], [i2, i3, i0]]
        } else {
            vec![[i0, i2, i1], [i0, i1, i3], [i1, i2, i3], [i2, i0, i3]]
        };

        let face_plane = |f: &[usize; 3]| {
            let n = (points[f[1]] - points[f[0]]).cross(&(points[f[2]] - points[f[0]]));
            let n = n.try_normalize(1.0e-20).unwrap_or_else(Vec3::zeros);
            (n, n.dot(&points[f[0]]))
        };

        for (index, point) in points.iter().enumerate() {
            if [i0, i1, i2, i3].contains(&index) {
                continue;
            }
            let visible: Vec<bool> = faces
                .iter()
                .map(|f| {
                    let (n, d) = face_plane(f);
                    n.dot(point) - d > eps
                })
                .collect();
            if !visible.iter().any(|&v| v) {
                continue;
            }

            let mut horizon: Vec<(usize, usize)> = Vec::new();
            for (face, _) in faces.iter().zip(&visible).filter(|(_, &v)| v) {
                for (a, b) in [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])] {
                    if let Some(pos) = horizon.iter().position(|&(x, y)| x == b && y == a) {
                        horizon.swap_remove(pos);
                    } else {
                        horizon.push((a, b));
                    }
                }
            }

            let mut kept: Vec<[usize; 3]> = faces
                .iter()
                .zip(&visible)
                .filter(|(_, &v)| !v)
                .map(|(f, _)| *f)
                .collect();
            kept.extend(horizon.into_iter().map(|(a, b)| [a, b, index]));
            faces = kept;
        }

        // Compact to the vertices the faces actually use
        let mut remap = vec![usize::MAX; points.len()];
        let mut hull_points = Vec::new();
        for face in &mut faces {
            for i in face.iter_mut() {
                if remap[*i] == usize::MAX {
                    remap[*i] = hull_points.len();
                    hull_points.push(points[*i]);
                }
                *i = remap[*i];
            }
        }

        Some(Self {
            points: hull_points,
            faces,
        })
    }

    /// Whether `point` is inside or on the hull within `tolerance`
    pub fn contains(&self, point: &Vec3, tolerance: f32) -> bool {
        self.faces.iter().all(|f| {
            let a = self.points[f[0]];
            let n = (self.points[f[1]] - a).cross(&(self.points[f[2]] - a));
            match n.try_normalize(1.0e-20) {
                Some(n) => n.dot(&(point - a)) <= tolerance,
                None => true,
            }
        })
    }
}

fn farthest(points: &[Vec3], metric: impl Fn(&Vec3) -> f32) -> Option<usize> {
    (0..points.len()).max_by(|&a, &b| metric(&points[a]).total_cmp(&metric(&points[b])))
}
