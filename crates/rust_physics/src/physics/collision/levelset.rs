//! Signed distance grid ("levelset") shapes
//!
//! Values are sampled at grid points `origin + (i, j, k) * cell_size`,
//! negative inside the surface. Lookups between grid points are trilinear;
//! lookups outside the grid add the distance to the grid boundary.

use std::sync::Arc;

use crate::foundation::math::{Mat3, Vec3};
use crate::physics::error::{PhysicsError, Result};

use super::primitives::AABB;
use super::shape::{point_mass_inertia, MassProperties};

/// Signed distance field shape
#[derive(Debug, Clone)]
pub struct LevelsetShape {
    origin: Vec3,
    cell_size: f32,
    dims: [usize; 3],
    values: Arc<[f32]>,
}

impl Default for LevelsetShape {
    fn default() -> Self {
        Self {
            origin: Vec3::repeat(-0.5),
            cell_size: 1.0,
            dims: [2, 2, 2],
            values: Arc::from(vec![1.0; 8]),
        }
    }
}

impl LevelsetShape {
    /// Wrap precomputed grid values, x varying fastest
    pub fn new(origin: Vec3, cell_size: f32, dims: [usize; 3], values: Vec<f32>) -> Result<Self> {
        let shape = Self {
            origin,
            cell_size,
            dims,
            values: Arc::from(values),
        };
        shape.validate()?;
        Ok(shape)
    }

    /// Sample `distance` at every grid point
    pub fn from_fn(
        origin: Vec3,
        cell_size: f32,
        dims: [usize; 3],
        distance: impl Fn(&Vec3) -> f32,
    ) -> Result<Self> {
        let mut values = Vec::with_capacity(dims[0] * dims[1] * dims[2]);
        for k in 0..dims[2] {
            for j in 0..dims[1] {
                for i in 0..dims[0] {
                    let p = origin + Vec3::new(i as f32, j as f32, k as f32) * cell_size;
                    values.push(distance(&p));
                }
            }
        }
        Self::new(origin, cell_size, dims, values)
    }

    /// Grid dimensions in points
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Spacing between grid points
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Grid needs two points per axis and one value per point
    pub fn validate(&self) -> Result<()> {
        if self.dims.iter().any(|&d| d < 2) {
            return Err(PhysicsError::InvalidShape(format!(
                "levelset needs at least 2 points per axis, got {:?}",
                self.dims
            )));
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(PhysicsError::InvalidShape(format!(
                "levelset cell size must be positive, got {}",
                self.cell_size
            )));
        }
        let expected = self.dims[0] * self.dims[1] * self.dims[2];
        if self.values.len() != expected {
            return Err(PhysicsError::InvalidShape(format!(
                "levelset expects {expected} values, got {}",
                self.values.len()
            )));
        }
        Ok(())
    }

    fn value(&self, i: usize, j: usize, k: usize) -> f32 {
        self.values
            .get(i + self.dims[0] * (j + self.dims[1] * k))
            .copied()
            .unwrap_or(f32::MAX)
    }

    fn grid_point(&self, i: usize, j: usize, k: usize) -> Vec3 {
        self.origin + Vec3::new(i as f32, j as f32, k as f32) * self.cell_size
    }

    /// Bounds of the grid
    pub fn local_aabb(&self) -> AABB {
        let span = Vec3::new(
            (self.dims[0] - 1) as f32,
            (self.dims[1] - 1) as f32,
            (self.dims[2] - 1) as f32,
        ) * self.cell_size;
        AABB::new(self.origin, self.origin + span)
    }

    /// Signed distance at a local point
    pub fn distance(&self, point: &Vec3) -> f32 {
        let bounds = self.local_aabb();
        let clamped = point.sup(&bounds.min).inf(&bounds.max);
        let outside = (point - clamped).norm();

        let grid = (clamped - self.origin) / self.cell_size;
        let mut base = [0usize; 3];
        let mut frac = [0.0f32; 3];
        for axis in 0..3 {
            let max_base = self.dims[axis] - 2;
            let cell = (grid[axis].floor().max(0.0) as usize).min(max_base);
            base[axis] = cell;
            frac[axis] = (grid[axis] - cell as f32).clamp(0.0, 1.0);
        }

        let [i, j, k] = base;
        let [fx, fy, fz] = frac;
        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let c00 = lerp(self.value(i, j, k), self.value(i + 1, j, k), fx);
        let c10 = lerp(self.value(i, j + 1, k), self.value(i + 1, j + 1, k), fx);
        let c01 = lerp(self.value(i, j, k + 1), self.value(i + 1, j, k + 1), fx);
        let c11 = lerp(self.value(i, j + 1, k + 1), self.value(i + 1, j + 1, k + 1), fx);
        let c0 = lerp(c00, c10, fy);
        let c1 = lerp(c01, c11, fy);
        lerp(c0, c1, fz) + outside
    }

    /// Outward surface direction at a local point (central differences)
    pub fn gradient(&self, point: &Vec3) -> Vec3 {
        let h = self.cell_size * 0.5;
        let mut g = Vec3::zeros();
        for axis in 0..3 {
            let mut offset = Vec3::zeros();
            offset[axis] = h;
            g[axis] = self.distance(&(point + offset)) - self.distance(&(point - offset));
        }
        g.try_normalize(1.0e-12).unwrap_or_else(Vec3::y)
    }

    /// Copy with a uniform scale applied to positions and distances
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            origin: self.origin * factor,
            cell_size: self.cell_size * factor,
            dims: self.dims,
            values: self.values.iter().map(|v| v * factor).collect(),
        }
    }

    /// Mass properties from the grid points lying inside the surface
    pub fn mass_properties(&self, density: f32) -> MassProperties {
        let cell_mass = self.cell_size.powi(3) * density;
        let cell_inertia = Mat3::identity() * (cell_mass * self.cell_size * self.cell_size / 6.0);
        let mut props = MassProperties::zero();
        for k in 0..self.dims[2] {
            for j in 0..self.dims[1] {
                for i in 0..self.dims[0] {
                    if self.value(i, j, k) < 0.0 {
                        let p = self.grid_point(i, j, k);
                        props = props.combined(&MassProperties {
                            mass: cell_mass,
                            center_of_mass: p,
                            inertia: cell_inertia + point_mass_inertia(cell_mass, &p),
                        });
                    }
                }
            }
        }
        props
    }
}
