//! GJK distance and EPA penetration depth
//!
//! Both operate on the Minkowski difference `A - B` of two [`SupportMap`]s.
//! GJK finds the closest points of separated sets, EPA expands the final GJK
//! simplex into a polytope to find the minimum translation of overlapping
//! sets. Normals always point from `A` toward `B`.

use crate::foundation::math::Vec3;

use super::primitives::Triangle;
use super::support::SupportMap;

const MAX_ITERATIONS: usize = 64;
const RELATIVE_TOLERANCE: f32 = 1.0e-5;
const ABSOLUTE_TOLERANCE_SQ: f32 = 1.0e-10;

/// Vertex of the Minkowski difference with the source points that made it
#[derive(Debug, Clone, Copy)]
pub struct SupportPoint {
    /// `a - b`
    pub v: Vec3,
    /// Point on A
    pub a: Vec3,
    /// Point on B
    pub b: Vec3,
}

/// Outcome of a GJK distance query
#[derive(Debug, Clone)]
pub enum GjkResult {
    /// The sets are disjoint
    Separated {
        /// Distance between the sets
        distance: f32,
        /// Closest point on A
        point_a: Vec3,
        /// Closest point on B
        point_b: Vec3,
    },
    /// The sets overlap or touch; the simplex seeds EPA
    Intersecting {
        /// Final simplex, enclosing or touching the origin
        simplex: Vec<SupportPoint>,
    },
}

/// Minimum translation separating two overlapping sets
#[derive(Debug, Clone, Copy)]
pub struct Penetration {
    /// Penetration depth (positive)
    pub depth: f32,
    /// Unit direction from A toward B
    pub normal: Vec3,
    /// Deepest point of A inside B
    pub point_a: Vec3,
    /// Deepest point of B inside A
    pub point_b: Vec3,
}

fn minkowski_support<A, B>(a: &A, b: &B, direction: &Vec3) -> SupportPoint
where
    A: SupportMap + ?Sized,
    B: SupportMap + ?Sized,
{
    let pa = a.support(direction);
    let pb = b.support(&-direction);
    SupportPoint { v: pa - pb, a: pa, b: pb }
}

/// Closest points between two convex sets
///
/// `initial_direction` only seeds the search; the center offset between
/// the shapes is a good choice.
pub fn gjk_distance<A, B>(a: &A, b: &B, initial_direction: &Vec3) -> GjkResult
where
    A: SupportMap + ?Sized,
    B: SupportMap + ?Sized,
{
    let seed = initial_direction.try_normalize(1.0e-12).unwrap_or_else(Vec3::x);
    let mut simplex = vec![minkowski_support(a, b, &seed)];
    let mut weights = vec![1.0];
    let mut v = simplex[0].v;
    let mut best_sq = f32::MAX;

    for _ in 0..MAX_ITERATIONS {
        let v_sq = v.norm_squared();
        if v_sq <= ABSOLUTE_TOLERANCE_SQ {
            return GjkResult::Intersecting { simplex };
        }

        let w = minkowski_support(a, b, &-v);
        let duplicate = simplex.iter().any(|s| (s.v - w.v).norm_squared() <= ABSOLUTE_TOLERANCE_SQ);
        if duplicate || v_sq - v.dot(&w.v) <= RELATIVE_TOLERANCE * v_sq {
            return separated(&simplex, &weights);
        }

        simplex.push(w);
        match closest_on_simplex(&simplex) {
            Some((reduced, reduced_weights)) => {
                simplex = reduced;
                weights = reduced_weights;
            }
            None => return GjkResult::Intersecting { simplex },
        }

        v = simplex.iter().zip(&weights).map(|(s, w)| s.v * *w).sum();
        let v_sq = v.norm_squared();
        if v_sq >= best_sq {
            // No progress, numerical floor reached
            return separated(&simplex, &weights);
        }
        best_sq = v_sq;
    }

    separated(&simplex, &weights)
}

fn separated(simplex: &[SupportPoint], weights: &[f32]) -> GjkResult {
    let point_a: Vec3 = simplex.iter().zip(weights).map(|(s, w)| s.a * *w).sum();
    let point_b: Vec3 = simplex.iter().zip(weights).map(|(s, w)| s.b * *w).sum();
    let distance = (point_a - point_b).norm();
    if distance * distance <= ABSOLUTE_TOLERANCE_SQ {
        return GjkResult::Intersecting {
            simplex: simplex.to_vec(),
        };
    }
    GjkResult::Separated {
        distance,
        point_a,
        point_b,
    }
}

/// Reduce the simplex to the smallest face containing the point closest to
/// the origin. Returns `None` when the origin is inside a tetrahedron.
fn closest_on_simplex(simplex: &[SupportPoint]) -> Option<(Vec<SupportPoint>, Vec<f32>)> {
    match simplex.len() {
        1 => Some((simplex.to_vec(), vec![1.0])),
        2 => {
            let (a, b) = (simplex[0], simplex[1]);
            let ab = b.v - a.v;
            let len_sq = ab.norm_squared();
            let t = if len_sq > 1.0e-20 { -a.v.dot(&ab) / len_sq } else { 0.0 };
            if t <= 0.0 {
                Some((vec![a], vec![1.0]))
            } else if t >= 1.0 {
                Some((vec![b], vec![1.0]))
            } else {
                Some((vec![a, b], vec![1.0 - t, t]))
            }
        }
        3 => Some(reduce_triangle(simplex[0], simplex[1], simplex[2])),
        _ => {
            let faces = [(0, 1, 2, 3), (0, 1, 3, 2), (0, 2, 3, 1), (1, 2, 3, 0)];
            let mut best: Option<(f32, Vec<SupportPoint>, Vec<f32>)> = None;
            let mut any_outside = false;
            for (i, j, k, l) in faces {
                let (a, b, c, d) = (simplex[i], simplex[j], simplex[k], simplex[l]);
                let n = (b.v - a.v).cross(&(c.v - a.v));
                let side_origin = -n.dot(&a.v);
                let side_opposite = n.dot(&(d.v - a.v));
                let flat = side_opposite.abs() <= 1.0e-12;
                if !flat && side_origin * side_opposite >= 0.0 {
                    continue;
                }
                any_outside = true;
                let (points, weights) = reduce_triangle(a, b, c);
                let p: Vec3 = points.iter().zip(&weights).map(|(s, w)| s.v * *w).sum();
                let dist = p.norm_squared();
                if best.as_ref().map_or(true, |(bd, _, _)| dist < *bd) {
                    best = Some((dist, points, weights));
                }
            }
            if !any_outside {
                return None;
            }
            best.map(|(_, points, weights)| (points, weights))
        }
    }
}

fn reduce_triangle(a: SupportPoint, b: SupportPoint, c: SupportPoint) -> (Vec<SupportPoint>, Vec<f32>) {
    let bary = Triangle::new(a.v, b.v, c.v).closest_point_barycentric(Vec3::zeros());
    let mut points = Vec::with_capacity(3);
    let mut weights = Vec::with_capacity(3);
    for (p, w) in [a, b, c].into_iter().zip(bary) {
        if w > 0.0 {
            points.push(p);
            weights.push(w);
        }
    }
    if points.is_empty() {
        points.push(a);
        weights.push(1.0);
    }
    (points, weights)
}

#[derive(Debug, Clone, Copy)]
struct EpaFace {
    indices: [usize; 3],
    normal: Vec3,
    distance: f32,
}

/// Expanding polytope penetration query seeded by a GJK simplex
///
/// Returns `None` when the sets only touch along a flat region and no
/// volume can be built.
pub fn epa<A, B>(a: &A, b: &B, simplex: &[SupportPoint]) -> Option<Penetration>
where
    A: SupportMap + ?Sized,
    B: SupportMap + ?Sized,
{
    let mut vertices = build_tetrahedron(a, b, simplex)?;
    let interior: Vec3 = vertices.iter().map(|s| s.v).sum::<Vec3>() / 4.0;
    let scale = vertices.iter().map(|s| s.v.norm()).fold(1.0e-6, f32::max);
    let eps = scale * 1.0e-5;

    let mut faces: Vec<EpaFace> = [[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]]
        .iter()
        .filter_map(|&[i, j, k]| make_face(&vertices, i, j, k, &interior))
        .collect();
    if faces.len() < 4 {
        return None;
    }

    let mut closest = faces[0];
    for _ in 0..MAX_ITERATIONS {
        closest = *faces
            .iter()
            .min_by(|x, y| x.distance.total_cmp(&y.distance))?;

        let w = minkowski_support(a, b, &closest.normal);
        if w.v.dot(&closest.normal) - closest.distance <= eps {
            break;
        }

        let new_index = vertices.len();
        vertices.push(w);

        let mut horizon: Vec<(usize, usize)> = Vec::new();
        faces.retain(|face| {
            let visible = face.normal.dot(&(w.v - vertices[face.indices[0]].v)) > eps;
            if visible {
                for e in 0..3 {
                    let edge = (face.indices[e], face.indices[(e + 1) % 3]);
                    if let Some(pos) = horizon.iter().position(|&h| h == (edge.1, edge.0)) {
                        horizon.swap_remove(pos);
                    } else {
                        horizon.push(edge);
                    }
                }
            }
            !visible
        });

        for (i, j) in horizon {
            if let Some(face) = make_face(&vertices, i, j, new_index, &interior) {
                faces.push(face);
            }
        }
        if faces.is_empty() {
            break;
        }
    }

    let [i, j, k] = closest.indices;
    let (p0, p1, p2) = (vertices[i], vertices[j], vertices[k]);
    let projected = closest.normal * closest.distance;
    let bary = Triangle::new(p0.v, p1.v, p2.v).closest_point_barycentric(projected);
    Some(Penetration {
        depth: closest.distance.max(0.0),
        normal: closest.normal,
        point_a: p0.a * bary[0] + p1.a * bary[1] + p2.a * bary[2],
        point_b: p0.b * bary[0] + p1.b * bary[1] + p2.b * bary[2],
    })
}

fn make_face(vertices: &[SupportPoint], i: usize, j: usize, k: usize, interior: &Vec3) -> Option<EpaFace> {
    let (a, b, c) = (vertices[i].v, vertices[j].v, vertices[k].v);
    let normal = (b - a).cross(&(c - a)).try_normalize(1.0e-12)?;
    let (indices, normal) = if normal.dot(&(interior - a)) > 0.0 {
        ([i, k, j], -normal)
    } else {
        ([i, j, k], normal)
    };
    Some(EpaFace {
        indices,
        normal,
        distance: normal.dot(&a),
    })
}

/// Grow a GJK simplex of any size into a non-degenerate tetrahedron
fn build_tetrahedron<A, B>(a: &A, b: &B, simplex: &[SupportPoint]) -> Option<Vec<SupportPoint>>
where
    A: SupportMap + ?Sized,
    B: SupportMap + ?Sized,
{
    let axes = [Vec3::x(), -Vec3::x(), Vec3::y(), -Vec3::y(), Vec3::z(), -Vec3::z()];
    let mut points: Vec<SupportPoint> = simplex.iter().take(4).copied().collect();
    if points.is_empty() {
        points.push(minkowski_support(a, b, &axes[0]));
    }
    let eps = 1.0e-6;

    if points.len() == 1 {
        let origin = points[0].v;
        let next = axes
            .iter()
            .map(|d| minkowski_support(a, b, d))
            .find(|s| (s.v - origin).norm() > eps)?;
        points.push(next);
    }

    if points.len() == 2 {
        let line = points[1].v - points[0].v;
        let (u, v) = crate::foundation::math::utils::orthonormal_basis(&line.normalize());
        let base = points[0].v;
        let next = [u, -u, v, -v]
            .iter()
            .map(|d| minkowski_support(a, b, d))
            .find(|s| (s.v - base).cross(&line).norm() > eps * line.norm())?;
        points.push(next);
    }

    if points.len() == 3 {
        let n = (points[1].v - points[0].v).cross(&(points[2].v - points[0].v));
        let n = n.try_normalize(1.0e-12)?;
        let base = points[0].v;
        let next = [n, -n]
            .iter()
            .map(|d| minkowski_support(a, b, d))
            .find(|s| (s.v - base).dot(&n).abs() > eps)?;
        points.push(next);
    }

    let volume = (points[1].v - points[0].v)
        .cross(&(points[2].v - points[0].v))
        .dot(&(points[3].v - points[0].v));
    (volume.abs() > 1.0e-12).then_some(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Iso, Translation3};
    use crate::physics::collision::shape::Shape;
    use crate::physics::collision::support::PosedShape;
    use approx::assert_relative_eq;

    fn at(x: f32, y: f32, z: f32) -> Iso {
        Iso::from_parts(Translation3::new(x, y, z), crate::foundation::math::Quat::identity())
    }

    #[test]
    fn test_separated_boxes_distance() {
        let shape = Shape::cuboid(Vec3::new(2.0, 2.0, 2.0));
        let a = PosedShape::new(&shape, at(0.0, 0.0, 0.0));
        let b = PosedShape::new(&shape, at(5.0, 0.5, 0.0));
        match gjk_distance(&a, &b, &Vec3::x()) {
            GjkResult::Separated { distance, point_a, point_b } => {
                assert_relative_eq!(distance, 3.0, epsilon = 1e-4);
                assert_relative_eq!(point_a.x, 1.0, epsilon = 1e-4);
                assert_relative_eq!(point_b.x, 4.0, epsilon = 1e-4);
            }
            GjkResult::Intersecting { .. } => panic!("boxes should be separated"),
        }
    }

    #[test]
    fn test_separated_spheres_distance() {
        let shape = Shape::sphere(1.0);
        let a = PosedShape::new(&shape, at(0.0, 0.0, 0.0));
        let b = PosedShape::new(&shape, at(0.0, 5.0, 0.0));
        match gjk_distance(&a, &b, &Vec3::y()) {
            GjkResult::Separated { distance, .. } => assert_relative_eq!(distance, 3.0, epsilon = 1e-3),
            GjkResult::Intersecting { .. } => panic!("spheres should be separated"),
        }
    }

    #[test]
    fn test_overlapping_boxes_penetration() {
        let shape = Shape::cuboid(Vec3::new(2.0, 2.0, 2.0));
        let a = PosedShape::new(&shape, at(0.0, 0.0, 0.0));
        let b = PosedShape::new(&shape, at(1.5, 0.2, 0.1));
        let simplex = match gjk_distance(&a, &b, &Vec3::x()) {
            GjkResult::Intersecting { simplex } => simplex,
            GjkResult::Separated { .. } => panic!("boxes should overlap"),
        };
        let pen = epa(&a, &b, &simplex).unwrap_or(Penetration {
            depth: f32::NAN,
            normal: Vec3::zeros(),
            point_a: Vec3::zeros(),
            point_b: Vec3::zeros(),
        });
        assert_relative_eq!(pen.depth, 0.5, epsilon = 1e-3);
        assert_relative_eq!(pen.normal, Vec3::x(), epsilon = 1e-3);
    }
}
