//! Bounding rectangles.
//!
//! A rectangle is stored as its four corner points so that a transformed
//! rectangle stays exact under rotation and shear; `align` collapses it
//! back to an axis-aligned hull.

use serde::{Deserialize, Serialize};

use crate::{Mat3, Vec2, EPSILON};

/// A quadrilateral bounding region (tl, tr, br, bl corners).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRect {
    tl: Vec2,
    tr: Vec2,
    br: Vec2,
    bl: Vec2,
}

impl BoundingRect {
    /// Axis-aligned rectangle from origin and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            tl: Vec2::new(x, y),
            tr: Vec2::new(x + width, y),
            br: Vec2::new(x + width, y + height),
            bl: Vec2::new(x, y + height),
        }
    }

    pub fn from_corners(tl: Vec2, tr: Vec2, br: Vec2, bl: Vec2) -> Self {
        Self { tl, tr, br, bl }
    }

    /// The degenerate zero-area rectangle at the origin.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Smallest axis-aligned rectangle enclosing all the given
    /// rectangles. An empty slice yields the zero rectangle.
    pub fn aligned_enclosing(rects: &[BoundingRect]) -> Self {
        let Some(first) = rects.first() else {
            return Self::zero();
        };

        let mut x0 = first.tl.x;
        let mut y0 = first.tl.y;
        let mut x1 = first.tl.x;
        let mut y1 = first.tl.y;
        for rect in rects {
            for corner in [rect.tl, rect.tr, rect.br, rect.bl] {
                x0 = x0.min(corner.x);
                y0 = y0.min(corner.y);
                x1 = x1.max(corner.x);
                y1 = y1.max(corner.y);
            }
        }
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Transform all four corners by the given matrix.
    pub fn transform(&self, transform: &Mat3) -> Self {
        Self {
            tl: transform.transform_point(self.tl),
            tr: transform.transform_point(self.tr),
            br: transform.transform_point(self.br),
            bl: transform.transform_point(self.bl),
        }
    }

    /// Axis-aligned hull of this (possibly rotated) rectangle.
    pub fn align(&self) -> Self {
        let xs = [self.tl.x, self.tr.x, self.br.x, self.bl.x];
        let ys = [self.tl.y, self.tr.y, self.br.y, self.bl.y];
        let x = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let y = ys.iter().copied().fold(f64::INFINITY, f64::min);
        let width = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max) - x;
        let height = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max) - y;
        Self::new(x, y, width, height)
    }

    /// Whether this rectangle is axis-aligned.
    pub fn is_aligned(&self) -> bool {
        (self.tl.y - self.tr.y).abs() < EPSILON && (self.tl.x - self.bl.x).abs() < EPSILON
    }

    /// Strict point containment. Only defined for aligned rectangles;
    /// a rotated rectangle reports `false`.
    pub fn contains_point(&self, point: Vec2) -> bool {
        if !self.is_aligned() {
            return false;
        }
        point.x > self.tl.x && point.x < self.tr.x && point.y > self.tl.y && point.y < self.bl.y
    }

    /// Strict containment of another rectangle. Only defined when both
    /// rectangles are aligned.
    pub fn contains_rect(&self, other: &BoundingRect) -> bool {
        if !self.is_aligned() || !other.is_aligned() {
            return false;
        }
        other.tl.x > self.tl.x
            && other.tr.x < self.tr.x
            && other.tl.y > self.tl.y
            && other.bl.y < self.bl.y
    }

    pub fn tl(&self) -> Vec2 {
        self.tl
    }

    pub fn tr(&self) -> Vec2 {
        self.tr
    }

    pub fn br(&self) -> Vec2 {
        self.br
    }

    pub fn bl(&self) -> Vec2 {
        self.bl
    }

    /// x origin of the aligned hull.
    pub fn x(&self) -> f64 {
        self.align().tl.x
    }

    /// y origin of the aligned hull.
    pub fn y(&self) -> f64 {
        self.align().tl.y
    }

    pub fn width(&self) -> f64 {
        let aligned = self.align();
        aligned.tr.x - aligned.tl.x
    }

    pub fn height(&self) -> f64 {
        let aligned = self.align();
        aligned.bl.y - aligned.tl.y
    }
}

impl std::fmt::Display for BoundingRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BoundingRect(tl: {} tr: {} br: {} bl: {})",
            self.tl, self.tr, self.br, self.bl
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx_eq;

    #[test]
    fn test_new_builds_corners() {
        let r = BoundingRect::new(1.0, 2.0, 10.0, 20.0);
        assert_eq!(r.tl(), Vec2::new(1.0, 2.0));
        assert_eq!(r.br(), Vec2::new(11.0, 22.0));
        assert!(r.is_aligned());
    }

    #[test]
    fn test_transform_then_align() {
        let r = BoundingRect::new(0.0, 0.0, 2.0, 2.0)
            .transform(&Mat3::rotate(std::f64::consts::FRAC_PI_4));
        assert!(!r.is_aligned());
        let aligned = r.align();
        let diag = 2.0 * std::f64::consts::SQRT_2;
        assert!(approx_eq(aligned.width(), diag));
        assert!(approx_eq(aligned.height(), diag));
    }

    #[test]
    fn test_aligned_enclosing_union() {
        let a = BoundingRect::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingRect::new(20.0, 0.0, 10.0, 10.0);
        let u = BoundingRect::aligned_enclosing(&[a, b]);
        assert!(approx_eq(u.x(), 0.0));
        assert!(approx_eq(u.y(), 0.0));
        assert!(approx_eq(u.width(), 30.0));
        assert!(approx_eq(u.height(), 10.0));
    }

    #[test]
    fn test_aligned_enclosing_empty_is_zero() {
        let u = BoundingRect::aligned_enclosing(&[]);
        assert!(approx_eq(u.width(), 0.0));
        assert!(approx_eq(u.height(), 0.0));
    }

    #[test]
    fn test_contains_point() {
        let r = BoundingRect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains_point(Vec2::new(5.0, 5.0)));
        assert!(!r.contains_point(Vec2::new(15.0, 5.0)));
        // Boundary is exclusive.
        assert!(!r.contains_point(Vec2::new(0.0, 5.0)));
    }

    #[test]
    fn test_contains_rect() {
        let outer = BoundingRect::new(0.0, 0.0, 10.0, 10.0);
        let inner = BoundingRect::new(2.0, 2.0, 4.0, 4.0);
        assert!(outer.contains_rect(&inner));
        assert!(!inner.contains_rect(&outer));
    }
}
