//! Plane geometry primitives shared by the reducer and the transform cache.
//!
//! Rotations are expressed in degrees, clockwise in screen space (y grows
//! downwards), and applied with the standard rotation matrix:
//!
//! ```text
//! x' = x·cos θ − y·sin θ
//! y' = x·sin θ + y·cos θ
//! ```
//!
//! Every element rotates about its own origin (its stored `position`), so the
//! same matrix composes parent and child transforms.

use core::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Tolerance used when comparing derived floating-point geometry.
pub const EPSILON: f64 = 1e-9;

/// Return whether two floats are equal within `tolerance`.
pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

/// A 2D point or vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate (grows downwards).
    pub y: f64,
}

impl Point {
    /// The origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rotate this vector about the origin by `degrees`.
    pub fn rotated(self, degrees: f64) -> Self {
        if degrees == 0.0 {
            return self;
        }
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            x: self.x.mul_add(cos, -(self.y * sin)),
            y: self.x.mul_add(sin, self.y * cos),
        }
    }

    /// Rotate this point about `pivot` by `degrees`.
    pub fn rotated_about(self, pivot: Self, degrees: f64) -> Self {
        pivot + (self - pivot).rotated(degrees)
    }

    /// Scale each component independently.
    pub fn scaled(self, sx: f64, sy: f64) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
        }
    }

    /// Whether both components are finite.
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Component-wise approximate equality.
    pub fn approx_eq(self, other: Self, tolerance: f64) -> bool {
        approx_eq(self.x, other.x, tolerance) && approx_eq(self.y, other.y, tolerance)
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Neg for Point {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

// ---------------------------------------------------------------------------
// Size
// ---------------------------------------------------------------------------

/// Width and height of an element's box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Size {
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl Size {
    /// Create a size.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Negative extents clamp to zero.
    pub fn clamped(self) -> Self {
        Self {
            width: self.width.max(0.0),
            height: self.height.max(0.0),
        }
    }

    /// Whether both extents are finite.
    pub fn is_finite(self) -> bool {
        self.width.is_finite() && self.height.is_finite()
    }

    /// The largest corner radius this box can carry: half the shorter side.
    pub fn max_corner_radius(self) -> f64 {
        self.width.min(self.height).max(0.0) / 2.0
    }

    /// Scale each extent independently.
    pub fn scaled(self, sx: f64, sy: f64) -> Self {
        Self {
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Position and rotation of an element, either local (relative to its
/// parent) or absolute (in page space).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Transform {
    /// Horizontal position of the element's origin.
    pub x: f64,
    /// Vertical position of the element's origin.
    pub y: f64,
    /// Rotation in degrees.
    pub rotation: f64,
}

impl Transform {
    /// The page-space identity transform.
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
    };

    /// Create a transform from a position and a rotation.
    pub const fn new(position: Point, rotation: f64) -> Self {
        Self {
            x: position.x,
            y: position.y,
            rotation,
        }
    }

    /// The position component.
    pub const fn position(self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }

    /// Compose a child's local transform onto this (parent) absolute
    /// transform, yielding the child's absolute transform.
    pub fn compose(self, local_position: Point, local_rotation: f64) -> Self {
        let offset = local_position.rotated(self.rotation);
        Self::new(self.position() + offset, self.rotation + local_rotation)
    }

    /// Express an absolute transform relative to this (parent) absolute
    /// transform. Exact inverse of [`Transform::compose`].
    pub fn relative(self, absolute: Self) -> (Point, f64) {
        let offset = (absolute.position() - self.position()).rotated(-self.rotation);
        (offset, absolute.rotation - self.rotation)
    }

    /// Component-wise approximate equality.
    pub fn approx_eq(self, other: Self, tolerance: f64) -> bool {
        approx_eq(self.x, other.x, tolerance)
            && approx_eq(self.y, other.y, tolerance)
            && approx_eq(self.rotation, other.rotation, tolerance)
    }
}

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// Axis-aligned bounding rectangle in page space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Rect {
    /// Top-left corner.
    pub min: Point,
    /// Bottom-right corner.
    pub max: Point,
}

impl Rect {
    /// Bounding box of a set of points. `None` when empty.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut rect = Self {
            min: first,
            max: first,
        };
        for p in iter {
            rect.min.x = rect.min.x.min(p.x);
            rect.min.y = rect.min.y.min(p.y);
            rect.max.x = rect.max.x.max(p.x);
            rect.max.y = rect.max.y.max(p.y);
        }
        Some(rect)
    }

    /// Centre of the rectangle.
    pub fn center(self) -> Point {
        Point::new(
            self.min.x + (self.max.x - self.min.x) / 2.0,
            self.min.y + (self.max.y - self.min.y) / 2.0,
        )
    }

    /// Width and height.
    pub fn size(self) -> Size {
        Size::new(self.max.x - self.min.x, self.max.y - self.min.y)
    }
}

/// The four corners of a box of `size` placed at `transform` (origin corner
/// first, then clockwise).
pub fn corners(transform: Transform, size: Size) -> [Point; 4] {
    let origin = transform.position();
    [
        origin,
        origin + Point::new(size.width, 0.0).rotated(transform.rotation),
        origin + Point::new(size.width, size.height).rotated(transform.rotation),
        origin + Point::new(0.0, size.height).rotated(transform.rotation),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    #[test]
    fn rotation_by_ninety_degrees_swaps_axes() {
        let p = Point::new(10.0, 0.0).rotated(90.0);
        assert!(p.approx_eq(Point::new(0.0, 10.0), TOL));
    }

    #[test]
    fn rotation_by_zero_is_identity() {
        let p = Point::new(3.5, -7.25);
        assert_eq!(p.rotated(0.0), p);
    }

    #[test]
    fn rotation_about_pivot() {
        let p = Point::new(20.0, 10.0).rotated_about(Point::new(10.0, 10.0), 180.0);
        assert!(p.approx_eq(Point::new(0.0, 10.0), TOL));
    }

    #[test]
    fn compose_then_relative_is_identity() {
        let parent = Transform::new(Point::new(100.0, 40.0), 33.0);
        let local = Point::new(-12.5, 70.0);
        let absolute = parent.compose(local, 12.0);
        let (back, rotation) = parent.relative(absolute);
        assert!(back.approx_eq(local, 1e-9));
        assert!(approx_eq(rotation, 12.0, 1e-9));
    }

    #[test]
    fn compose_under_forty_five_degrees() {
        let parent = Transform::new(Point::ZERO, 45.0);
        let child = parent.compose(Point::new(50.0, 50.0), 0.0);
        // (50,50) rotated by 45 degrees lies on the y axis at 50·√2.
        assert!(approx_eq(child.x, 0.0, 1e-9));
        assert!(approx_eq(child.y, 50.0 * 2.0_f64.sqrt(), 1e-9));
        assert!(approx_eq(child.rotation, 45.0, TOL));
    }

    #[test]
    fn size_clamps_negative_extents() {
        let size = Size::new(-5.0, 12.0).clamped();
        assert!(approx_eq(size.width, 0.0, TOL));
        assert!(approx_eq(size.height, 12.0, TOL));
    }

    #[test]
    fn max_corner_radius_uses_shorter_side() {
        assert!(approx_eq(Size::new(100.0, 40.0).max_corner_radius(), 20.0, TOL));
    }

    #[test]
    fn bounding_rect_of_rotated_square() {
        let c = corners(Transform::new(Point::ZERO, 90.0), Size::new(10.0, 10.0));
        let rect = Rect::from_points(c);
        assert!(rect.is_some());
        if let Some(rect) = rect {
            assert!(rect.min.approx_eq(Point::new(-10.0, 0.0), 1e-9));
            assert!(rect.max.approx_eq(Point::new(0.0, 10.0), 1e-9));
            assert!(rect.center().approx_eq(Point::new(-5.0, 5.0), 1e-9));
        }
    }

    #[test]
    fn empty_rect_is_none() {
        assert!(Rect::from_points(Vec::new()).is_none());
    }
}
