//! Collision shape library
//!
//! Shapes are stored in model space and posed by their collider's transform
//! during collision tests. Scale is baked into a copy of the shape with
//! [`Shape::scaled`] whenever the collider's scale changes, so the narrow
//! phase only ever sees rigid poses.
//!
//! Length conventions: `size` is the full box extent, `length` is the full
//! extent along the shape axis (capsule caps included). Cones point toward
//! the positive axis with their base at `-length / 2`.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{constants::PI, Mat3, Vec3};
use crate::physics::error::{PhysicsError, Result};

use super::levelset::LevelsetShape;
use super::mesh::MeshShape;
use super::primitives::AABB;

/// Smallest extent a shape dimension is clamped to
pub const MIN_EXTENT: f32 = 1.0e-4;

/// Principal axis for capsules, cylinders and cones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Axis {
    /// Local X
    X,
    /// Local Y
    #[default]
    Y,
    /// Local Z
    Z,
}

impl Axis {
    /// Index of the axis component
    pub fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// Unit vector along the axis
    pub fn unit(self) -> Vec3 {
        let mut v = Vec3::zeros();
        v[self.index()] = 1.0;
        v
    }
}

/// Discriminant of [`Shape`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// [`BoxShape`]
    Box,
    /// [`SphereShape`]
    Sphere,
    /// [`CapsuleShape`]
    Capsule,
    /// [`CylinderShape`]
    Cylinder,
    /// [`ConeShape`]
    Cone,
    /// [`MeshShape`]
    Mesh,
    /// [`LevelsetShape`]
    Levelset,
}

/// Box given by its full size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxShape {
    /// Full extents along each local axis
    pub size: Vec3,
}

/// Sphere centered on the local origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphereShape {
    /// Radius
    pub radius: f32,
}

/// Segment swept by a sphere
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapsuleShape {
    /// Axis of the inner segment
    pub axis: Axis,
    /// Full length including both caps
    pub length: f32,
    /// Cap and body radius
    pub radius: f32,
}

/// Flat-ended cylinder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CylinderShape {
    /// Axis of revolution
    pub axis: Axis,
    /// Full length
    pub length: f32,
    /// Radius
    pub radius: f32,
}

/// Cone with its apex on the positive axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConeShape {
    /// Axis of revolution
    pub axis: Axis,
    /// Distance from base to apex
    pub length: f32,
    /// Base radius
    pub radius: f32,
}

/// Collision shape (stored in MODEL SPACE)
#[derive(Debug, Clone)]
pub enum Shape {
    /// Box
    Box(BoxShape),
    /// Sphere
    Sphere(SphereShape),
    /// Capsule
    Capsule(CapsuleShape),
    /// Cylinder
    Cylinder(CylinderShape),
    /// Cone
    Cone(ConeShape),
    /// Triangle mesh, optionally treated as its convex hull
    Mesh(MeshShape),
    /// Signed distance grid
    Levelset(LevelsetShape),
}

/// Mass, center of mass and inertia (about the local origin) of a shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    /// Total mass
    pub mass: f32,
    /// Center of mass in local space
    pub center_of_mass: Vec3,
    /// Inertia tensor about the local origin
    pub inertia: Mat3,
}

impl MassProperties {
    /// Zero mass and inertia
    pub fn zero() -> Self {
        Self {
            mass: 0.0,
            center_of_mass: Vec3::zeros(),
            inertia: Mat3::zeros(),
        }
    }

    /// Sum of two bodies' properties, both taken about the same origin
    #[must_use]
    pub fn combined(&self, other: &Self) -> Self {
        let mass = self.mass + other.mass;
        let center_of_mass = if mass > 0.0 {
            (self.center_of_mass * self.mass + other.center_of_mass * other.mass) / mass
        } else {
            Vec3::zeros()
        };
        Self {
            mass,
            center_of_mass,
            inertia: self.inertia + other.inertia,
        }
    }

    /// Properties uniformly rescaled to a new total mass
    #[must_use]
    pub fn with_mass(&self, mass: f32) -> Self {
        let factor = if self.mass > 0.0 { mass / self.mass } else { 0.0 };
        Self {
            mass,
            center_of_mass: self.center_of_mass,
            inertia: self.inertia * factor,
        }
    }

    /// Re-express these properties after moving the body by `rotation` and
    /// `offset` relative to the reference origin (parallel axis theorem)
    #[must_use]
    pub fn transformed(&self, rotation: &Mat3, offset: &Vec3) -> Self {
        let about_com = self.inertia - point_mass_inertia(self.mass, &self.center_of_mass);
        let center_of_mass = rotation * self.center_of_mass + offset;
        Self {
            mass: self.mass,
            center_of_mass,
            inertia: rotation * about_com * rotation.transpose()
                + point_mass_inertia(self.mass, &center_of_mass),
        }
    }
}

/// Inertia of a point mass at `position` about the origin
pub(crate) fn point_mass_inertia(mass: f32, position: &Vec3) -> Mat3 {
    (Mat3::identity() * position.norm_squared() - position * position.transpose()) * mass
}

/// Default box: unit cube
pub fn create_box_shape() -> Shape {
    Shape::Box(BoxShape { size: Vec3::new(1.0, 1.0, 1.0) })
}

/// Default sphere: radius 0.5
pub fn create_sphere_shape() -> Shape {
    Shape::Sphere(SphereShape { radius: 0.5 })
}

/// Default capsule: Y axis, length 2, radius 0.5
pub fn create_capsule_shape() -> Shape {
    Shape::Capsule(CapsuleShape { axis: Axis::Y, length: 2.0, radius: 0.5 })
}

/// Default cylinder: Y axis, length 1, radius 0.5
pub fn create_cylinder_shape() -> Shape {
    Shape::Cylinder(CylinderShape { axis: Axis::Y, length: 1.0, radius: 0.5 })
}

/// Default cone: Y axis, length 1, radius 0.5
pub fn create_cone_shape() -> Shape {
    Shape::Cone(ConeShape { axis: Axis::Y, length: 1.0, radius: 0.5 })
}

/// Default mesh: empty concave mesh
pub fn create_mesh_shape() -> Shape {
    Shape::Mesh(MeshShape::default())
}

/// Default levelset: a single cell grid that is everywhere outside
pub fn create_levelset_shape() -> Shape {
    Shape::Levelset(LevelsetShape::default())
}

impl Shape {
    /// Box with the given full size
    pub fn cuboid(size: Vec3) -> Self {
        Self::Box(BoxShape { size })
    }

    /// Sphere with the given radius
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere(SphereShape { radius })
    }

    /// Capsule along `axis`
    pub fn capsule(axis: Axis, length: f32, radius: f32) -> Self {
        Self::Capsule(CapsuleShape { axis, length, radius })
    }

    /// Cylinder along `axis`
    pub fn cylinder(axis: Axis, length: f32, radius: f32) -> Self {
        Self::Cylinder(CylinderShape { axis, length, radius })
    }

    /// Cone along `axis`
    pub fn cone(axis: Axis, length: f32, radius: f32) -> Self {
        Self::Cone(ConeShape { axis, length, radius })
    }

    /// Kind discriminant
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Box(_) => ShapeKind::Box,
            Self::Sphere(_) => ShapeKind::Sphere,
            Self::Capsule(_) => ShapeKind::Capsule,
            Self::Cylinder(_) => ShapeKind::Cylinder,
            Self::Cone(_) => ShapeKind::Cone,
            Self::Mesh(_) => ShapeKind::Mesh,
            Self::Levelset(_) => ShapeKind::Levelset,
        }
    }

    /// Human readable kind name
    pub fn name(&self) -> &'static str {
        match self.kind() {
            ShapeKind::Box => "box",
            ShapeKind::Sphere => "sphere",
            ShapeKind::Capsule => "capsule",
            ShapeKind::Cylinder => "cylinder",
            ShapeKind::Cone => "cone",
            ShapeKind::Mesh => "mesh",
            ShapeKind::Levelset => "levelset",
        }
    }

    /// Whether the shape can be handled through its support mapping
    pub fn is_convex(&self) -> bool {
        match self {
            Self::Mesh(mesh) => mesh.is_convex(),
            Self::Levelset(_) => false,
            _ => true,
        }
    }

    /// Check the structure of mesh and levelset data
    ///
    /// Primitive dimensions are never an error; see [`Shape::sanitized`].
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Mesh(mesh) => mesh.validate(),
            Self::Levelset(levelset) => levelset.validate(),
            _ => Ok(()),
        }
    }

    /// Copy with every primitive dimension moved to at least [`MIN_EXTENT`]
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let name = self.name();
        let clamp = |field: &str, v: f32| {
            if v.is_finite() && v >= MIN_EXTENT {
                v
            } else {
                log::warn!("Clamping {} {} from {} to {}", name, field, v, MIN_EXTENT);
                MIN_EXTENT
            }
        };
        match self {
            Self::Box(b) => Self::Box(BoxShape {
                size: Vec3::new(clamp("size.x", b.size.x), clamp("size.y", b.size.y), clamp("size.z", b.size.z)),
            }),
            Self::Sphere(s) => Self::sphere(clamp("radius", s.radius)),
            Self::Capsule(c) => Self::capsule(c.axis, clamp("length", c.length), clamp("radius", c.radius)),
            Self::Cylinder(c) => Self::cylinder(c.axis, clamp("length", c.length), clamp("radius", c.radius)),
            Self::Cone(c) => Self::cone(c.axis, clamp("length", c.length), clamp("radius", c.radius)),
            Self::Mesh(_) | Self::Levelset(_) => self.clone(),
        }
    }

    /// Bounds in model space
    pub fn local_aabb(&self) -> AABB {
        match self {
            Self::Box(b) => AABB::from_center_extents(Vec3::zeros(), b.size * 0.5),
            Self::Sphere(s) => AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(s.radius)),
            Self::Capsule(c) => {
                let mut extents = Vec3::repeat(c.radius);
                extents[c.axis.index()] = (c.length * 0.5).max(c.radius);
                AABB::from_center_extents(Vec3::zeros(), extents)
            }
            Self::Cylinder(CylinderShape { axis, length, radius })
            | Self::Cone(ConeShape { axis, length, radius }) => {
                let mut extents = Vec3::repeat(*radius);
                extents[axis.index()] = length * 0.5;
                AABB::from_center_extents(Vec3::zeros(), extents)
            }
            Self::Mesh(mesh) => mesh.local_aabb(),
            Self::Levelset(levelset) => levelset.local_aabb(),
        }
    }

    /// Radius of a sphere about the local origin enclosing the shape
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Self::Sphere(s) => s.radius,
            Self::Capsule(c) => (c.length * 0.5).max(c.radius),
            Self::Mesh(mesh) => mesh.bounding_radius(),
            _ => {
                let aabb = self.local_aabb();
                aabb.min.norm().max(aabb.max.norm())
            }
        }
    }

    /// Enclosed volume
    pub fn volume(&self) -> f32 {
        match self {
            Self::Box(b) => b.size.x * b.size.y * b.size.z,
            Self::Sphere(s) => 4.0 / 3.0 * PI * s.radius.powi(3),
            Self::Capsule(c) => {
                let h = capsule_half_segment(c);
                PI * c.radius * c.radius * 2.0 * h + 4.0 / 3.0 * PI * c.radius.powi(3)
            }
            Self::Cylinder(c) => PI * c.radius * c.radius * c.length,
            Self::Cone(c) => PI * c.radius * c.radius * c.length / 3.0,
            Self::Mesh(mesh) => mesh.mass_properties(1.0).mass,
            Self::Levelset(levelset) => levelset.mass_properties(1.0).mass,
        }
    }

    /// Mass properties for a uniform density, inertia about the local origin
    pub fn mass_properties(&self, density: f32) -> MassProperties {
        let mass = self.volume() * density;
        let diagonal = |axis: Axis, i_axis: f32, i_perp: f32| {
            let mut d = Vec3::repeat(i_perp);
            d[axis.index()] = i_axis;
            Mat3::from_diagonal(&d)
        };
        match self {
            Self::Box(b) => {
                let s2 = b.size.component_mul(&b.size);
                MassProperties {
                    mass,
                    center_of_mass: Vec3::zeros(),
                    inertia: Mat3::from_diagonal(&Vec3::new(s2.y + s2.z, s2.x + s2.z, s2.x + s2.y)) * (mass / 12.0),
                }
            }
            Self::Sphere(s) => MassProperties {
                mass,
                center_of_mass: Vec3::zeros(),
                inertia: Mat3::identity() * (0.4 * mass * s.radius * s.radius),
            },
            Self::Capsule(c) => {
                let r = c.radius;
                let height = 2.0 * capsule_half_segment(c);
                let cylinder_mass = density * PI * r * r * height;
                let caps_mass = density * 4.0 / 3.0 * PI * r.powi(3);
                let i_axis = cylinder_mass * r * r * 0.5 + caps_mass * 0.4 * r * r;
                let i_perp = cylinder_mass * (height * height / 12.0 + r * r / 4.0)
                    + caps_mass * (0.4 * r * r + height * height / 4.0 + 3.0 * height * r / 8.0);
                MassProperties {
                    mass,
                    center_of_mass: Vec3::zeros(),
                    inertia: diagonal(c.axis, i_axis, i_perp),
                }
            }
            Self::Cylinder(c) => {
                let r2 = c.radius * c.radius;
                MassProperties {
                    mass,
                    center_of_mass: Vec3::zeros(),
                    inertia: diagonal(
                        c.axis,
                        0.5 * mass * r2,
                        mass * (3.0 * r2 + c.length * c.length) / 12.0,
                    ),
                }
            }
            Self::Cone(c) => {
                let r2 = c.radius * c.radius;
                let l2 = c.length * c.length;
                MassProperties {
                    mass,
                    center_of_mass: -c.axis.unit() * (c.length * 0.25),
                    inertia: diagonal(c.axis, 0.3 * mass * r2, mass * (0.15 * r2 + 0.1 * l2)),
                }
            }
            Self::Mesh(mesh) => mesh.mass_properties(density),
            Self::Levelset(levelset) => levelset.mass_properties(density),
        }
    }

    /// Copy of this shape with a local scale baked into its parameters
    ///
    /// Round shapes take the largest scale of their radial axes, so a
    /// non-uniformly scaled sphere stays a sphere.
    pub fn scaled(&self, scale: &Vec3) -> Self {
        let s = scale.abs();
        if (s - Vec3::repeat(1.0)).amax() < 1.0e-6 {
            return self.clone();
        }
        let radial = |axis: Axis| {
            let mut r = s;
            r[axis.index()] = 0.0;
            r.max()
        };
        let clamp = |v: f32| v.max(MIN_EXTENT);
        match self {
            Self::Box(b) => Self::Box(BoxShape { size: b.size.component_mul(&s).map(clamp) }),
            Self::Sphere(sp) => Self::sphere(clamp(sp.radius * s.max())),
            Self::Capsule(c) => Self::capsule(
                c.axis,
                clamp(c.length * s[c.axis.index()]),
                clamp(c.radius * radial(c.axis)),
            ),
            Self::Cylinder(c) => Self::cylinder(
                c.axis,
                clamp(c.length * s[c.axis.index()]),
                clamp(c.radius * radial(c.axis)),
            ),
            Self::Cone(c) => Self::cone(
                c.axis,
                clamp(c.length * s[c.axis.index()]),
                clamp(c.radius * radial(c.axis)),
            ),
            Self::Mesh(mesh) => Self::Mesh(mesh.scaled(&s)),
            Self::Levelset(levelset) => Self::Levelset(levelset.scaled(s.max())),
        }
    }
}

/// Half length of a capsule's inner segment
pub(crate) fn capsule_half_segment(capsule: &CapsuleShape) -> f32 {
    (capsule.length * 0.5 - capsule.radius).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_factories_are_valid() {
        for shape in [
            create_box_shape(),
            create_sphere_shape(),
            create_capsule_shape(),
            create_cylinder_shape(),
            create_cone_shape(),
        ] {
            assert!(shape.validate().is_ok(), "{} should be valid", shape.name());
            assert!(shape.volume() > 0.0);
        }
    }

    #[test]
    fn test_box_mass_properties() {
        let shape = Shape::cuboid(Vec3::new(2.0, 4.0, 6.0));
        let props = shape.mass_properties(0.5);
        assert_relative_eq!(props.mass, 24.0, epsilon = 1e-4);
        assert_relative_eq!(props.inertia[(0, 0)], 24.0 / 12.0 * (16.0 + 36.0), epsilon = 1e-3);
        assert_relative_eq!(props.inertia[(1, 1)], 24.0 / 12.0 * (4.0 + 36.0), epsilon = 1e-3);
    }

    #[test]
    fn test_capsule_volume_matches_sphere_plus_cylinder() {
        let capsule = Shape::capsule(Axis::Z, 4.0, 1.0);
        let expected = PI * 2.0 + 4.0 / 3.0 * PI;
        assert_relative_eq!(capsule.volume(), expected, epsilon = 1e-4);
        let aabb = capsule.local_aabb();
        assert_relative_eq!(aabb.max, Vec3::new(1.0, 1.0, 2.0), epsilon = 1e-6);
    }

    #[test]
    fn test_scaled_bakes_non_uniform_scale() {
        let scaled = create_box_shape().scaled(&Vec3::new(2.0, -3.0, 1.0));
        match scaled {
            Shape::Box(b) => assert_relative_eq!(b.size, Vec3::new(2.0, 3.0, 1.0), epsilon = 1e-6),
            other => panic!("unexpected shape {other:?}"),
        }

        let sphere = Shape::sphere(1.0).scaled(&Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(sphere.bounding_radius(), 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_dimensions_are_clamped() {
        assert!(Shape::sphere(0.0).validate().is_ok());
        let Shape::Sphere(sphere) = Shape::sphere(0.0).sanitized() else {
            panic!("sanitizing keeps the kind");
        };
        assert_relative_eq!(sphere.radius, MIN_EXTENT);

        let Shape::Capsule(capsule) = Shape::capsule(Axis::X, -1.0, 1.0).sanitized() else {
            panic!("sanitizing keeps the kind");
        };
        assert_relative_eq!(capsule.length, MIN_EXTENT);
        assert_relative_eq!(capsule.radius, 1.0);

        let flat = Shape::cuboid(Vec3::new(2.0, 0.0, f32::NAN)).sanitized();
        let Shape::Box(cuboid) = &flat else {
            panic!("sanitizing keeps the kind");
        };
        assert_relative_eq!(cuboid.size, Vec3::new(2.0, MIN_EXTENT, MIN_EXTENT));
        assert!(flat.volume() > 0.0);
    }

    #[test]
    fn test_parallel_axis_shift() {
        let props = Shape::sphere(1.0).mass_properties(1.0);
        let shifted = props.transformed(&Mat3::identity(), &Vec3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(shifted.inertia[(0, 0)], props.inertia[(0, 0)], epsilon = 1e-4);
        assert_relative_eq!(shifted.inertia[(1, 1)], props.inertia[(1, 1)] + props.mass * 4.0, epsilon = 1e-4);
    }
}
