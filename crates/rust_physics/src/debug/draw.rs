//! Debug drawing primitives
//!
//! The physics core does not render. Worlds and probes with debug drawing
//! enabled record simple shapes into a [`DebugDrawBuffer`]; the host drains
//! it once per frame and draws whatever it likes.

use crate::foundation::math::{Vec3, Vec4};
use crate::physics::collision::AABB;

/// Color of collider bounds
pub const BOUNDS_COLOR: [f32; 4] = [0.2, 0.8, 0.2, 1.0];
/// Color of contact points and normals
pub const CONTACT_COLOR: [f32; 4] = [1.0, 0.2, 0.2, 1.0];
/// Color of query rays
pub const RAY_COLOR: [f32; 4] = [0.9, 0.9, 0.2, 1.0];
/// Color of query hits
pub const HIT_COLOR: [f32; 4] = [0.2, 0.6, 1.0, 1.0];

/// Debug shape primitives that can be rendered for visualization
#[derive(Clone, Debug, PartialEq)]
pub enum DebugShape {
    /// Line segment from start to end
    Line {
        /// Start point
        start: Vec3,
        /// End point
        end: Vec3,
        /// RGBA color
        color: Vec4,
    },

    /// Sphere at center with radius
    Sphere {
        /// Center
        center: Vec3,
        /// Radius
        radius: f32,
        /// RGBA color
        color: Vec4,
    },

    /// Axis-aligned box
    Box {
        /// Bounds
        bounds: AABB,
        /// RGBA color
        color: Vec4,
    },

    /// Point at position
    Point {
        /// Position
        position: Vec3,
        /// RGBA color
        color: Vec4,
        /// Size in world units
        size: f32,
    },
}

/// Shapes recorded since the last drain
#[derive(Debug, Default)]
pub struct DebugDrawBuffer {
    shapes: Vec<DebugShape>,
}

impl DebugDrawBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a line segment
    pub fn draw_line(&mut self, start: Vec3, end: Vec3, color: Vec4) {
        self.shapes.push(DebugShape::Line { start, end, color });
    }

    /// Record a sphere
    pub fn draw_sphere(&mut self, center: Vec3, radius: f32, color: Vec4) {
        self.shapes.push(DebugShape::Sphere { center, radius, color });
    }

    /// Record a box
    pub fn draw_aabb(&mut self, bounds: AABB, color: Vec4) {
        self.shapes.push(DebugShape::Box { bounds, color });
    }

    /// Record a point
    pub fn draw_point(&mut self, position: Vec3, color: Vec4, size: f32) {
        self.shapes.push(DebugShape::Point { position, color, size });
    }

    /// Record a contact as a point plus its normal
    pub fn draw_contact(&mut self, position: Vec3, normal: Vec3, length: f32) {
        let color = Vec4::from(CONTACT_COLOR);
        self.draw_point(position, color, length * 0.1);
        self.draw_line(position, position + normal * length, color);
    }

    /// Recorded shapes
    pub fn shapes(&self) -> &[DebugShape] {
        &self.shapes
    }

    /// Get the number of recorded shapes
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Take every recorded shape, leaving the buffer empty
    pub fn drain(&mut self) -> Vec<DebugShape> {
        std::mem::take(&mut self.shapes)
    }

    /// Drop all shapes
    pub fn clear(&mut self) {
        self.shapes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_buffer() {
        let mut buffer = DebugDrawBuffer::new();
        buffer.draw_contact(Vec3::zeros(), Vec3::y(), 1.0);
        buffer.draw_aabb(AABB::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)), Vec4::from(BOUNDS_COLOR));
        assert_eq!(buffer.shape_count(), 3);

        let shapes = buffer.drain();
        assert_eq!(shapes.len(), 3);
        assert_eq!(buffer.shape_count(), 0);
        assert!(matches!(shapes[1], DebugShape::Line { end, .. } if end == Vec3::y()));
    }
}
