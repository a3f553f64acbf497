//! Axis-aligned bounding boxes
//!
//! Every entity is a rectangle centred on its position. Screen convention:
//! y grows downward, so `top < bottom`.
//!
//! Malformed geometry (NaN/infinite coordinates, negative size) is rejected
//! here and nowhere else: `Aabb::from_center_size` returns `None`, and every
//! caller treats `None` as "already removed".

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A non-rotated rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Aabb {
    /// Build a box from its edges. Returns `None` for non-finite or inverted edges.
    pub fn new(left: f32, right: f32, top: f32, bottom: f32) -> Option<Self> {
        let finite = left.is_finite() && right.is_finite() && top.is_finite() && bottom.is_finite();
        if !finite || left > right || top > bottom {
            return None;
        }
        Some(Self {
            left,
            right,
            top,
            bottom,
        })
    }

    /// Box centred on `center` with full extents `size`
    pub fn from_center_size(center: Vec2, size: Vec2) -> Option<Self> {
        if !center.is_finite() || !size.is_finite() || size.x < 0.0 || size.y < 0.0 {
            return None;
        }
        let half = size * 0.5;
        Self::new(
            center.x - half.x,
            center.x + half.x,
            center.y - half.y,
            center.y + half.y,
        )
    }

    /// Strict overlap test. Boxes that only share an edge do not intersect.
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.left < other.right
            && self.right > other.left
            && self.top < other.bottom
            && self.bottom > other.top
    }

    /// True if `other` lies entirely within this box (edges inclusive)
    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        other.left >= self.left
            && other.right <= self.right
            && other.top >= self.top
            && other.bottom <= self.bottom
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.left + self.right) * 0.5,
            (self.top + self.bottom) * 0.5,
        )
    }

    /// Grow the box by `margin` on every side
    pub fn expanded(&self, margin: f32) -> Aabb {
        Aabb {
            left: self.left - margin,
            right: self.right + margin,
            top: self.top - margin,
            bottom: self.bottom + margin,
        }
    }
}

/// The visible play area plus a culling margin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Playfield {
    /// Visible area, origin at the top-left corner
    pub area: Aabb,
    /// Entities entirely outside `area` expanded by this margin are culled
    pub margin: f32,
}

impl Playfield {
    pub fn new(width: f32, height: f32, margin: f32) -> Self {
        Self {
            area: Aabb {
                left: 0.0,
                right: width.max(0.0),
                top: 0.0,
                bottom: height.max(0.0),
            },
            margin: margin.max(0.0),
        }
    }

    /// True once a box has fully left the playfield (including the margin)
    pub fn is_outside(&self, bounds: &Aabb) -> bool {
        !self.area.expanded(self.margin).intersects(bounds)
    }

    /// Clamp a point into the visible area
    pub fn clamp_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(self.area.left, self.area.right),
            p.y.clamp(self.area.top, self.area.bottom),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bx(left: f32, right: f32, top: f32, bottom: f32) -> Aabb {
        Aabb::new(left, right, top, bottom).unwrap()
    }

    #[test]
    fn test_from_center_size() {
        let b = Aabb::from_center_size(Vec2::new(10.0, 20.0), Vec2::new(4.0, 6.0)).unwrap();
        assert_eq!(b, bx(8.0, 12.0, 17.0, 23.0));
        assert_eq!(b.center(), Vec2::new(10.0, 20.0));
        assert_eq!(b.width(), 4.0);
        assert_eq!(b.height(), 6.0);
    }

    #[test]
    fn test_malformed_geometry_rejected() {
        assert!(Aabb::from_center_size(Vec2::new(f32::NAN, 0.0), Vec2::ONE).is_none());
        assert!(Aabb::from_center_size(Vec2::ZERO, Vec2::new(f32::INFINITY, 1.0)).is_none());
        assert!(Aabb::from_center_size(Vec2::ZERO, Vec2::new(-1.0, 1.0)).is_none());
        assert!(Aabb::new(5.0, 1.0, 0.0, 1.0).is_none());
    }

    #[test]
    fn test_shared_edge_does_not_intersect() {
        let a = bx(0.0, 10.0, 0.0, 10.0);
        let right = bx(10.0, 20.0, 0.0, 10.0);
        let below = bx(0.0, 10.0, 10.0, 20.0);
        assert!(!a.intersects(&right));
        assert!(!a.intersects(&below));
        // Corner touch
        assert!(!a.intersects(&bx(10.0, 20.0, 10.0, 20.0)));
        // Any overlap counts
        assert!(a.intersects(&bx(9.99, 20.0, 0.0, 10.0)));
    }

    #[test]
    fn test_zero_size_box_inside_other() {
        let a = bx(0.0, 10.0, 0.0, 10.0);
        let point = Aabb::from_center_size(Vec2::new(5.0, 5.0), Vec2::ZERO).unwrap();
        assert!(a.intersects(&point));
        assert!(a.contains(&point));
    }

    #[test]
    fn test_playfield_culling() {
        let field = Playfield::new(100.0, 100.0, 10.0);
        let inside = bx(40.0, 60.0, 40.0, 60.0);
        let in_margin = bx(-8.0, -2.0, 50.0, 55.0);
        let gone = bx(-30.0, -12.0, 50.0, 55.0);
        assert!(!field.is_outside(&inside));
        assert!(!field.is_outside(&in_margin));
        assert!(field.is_outside(&gone));
        assert_eq!(field.clamp_point(Vec2::new(-5.0, 150.0)), Vec2::new(0.0, 100.0));
    }
}
