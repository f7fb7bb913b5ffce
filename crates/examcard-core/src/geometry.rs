use serde::{Deserialize, Serialize};

/// Bounding box with top-left origin coordinate system.
///
/// Coordinates follow the page convention used throughout the crate:
/// - `x0`: left edge
/// - `top`: top edge (distance from top of page)
/// - `x1`: right edge
/// - `bottom`: bottom edge (distance from top of page)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl BBox {
    pub fn new(x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self {
            x0,
            top,
            x1,
            bottom,
        }
    }

    /// Width of the bounding box.
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    /// Height of the bounding box.
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Area of the box, zero for degenerate boxes.
    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Center point `(x, y)`.
    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.top + self.bottom) / 2.0)
    }

    /// Half-open containment test: left/top edges inclusive, right/bottom exclusive.
    ///
    /// Two boxes sharing an edge therefore never both contain a point on it.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.top && y < self.bottom
    }

    /// Compute the union of two bounding boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Intersection of two boxes, or `None` when they share no area.
    pub fn intersection(&self, other: &BBox) -> Option<BBox> {
        let x0 = self.x0.max(other.x0);
        let top = self.top.max(other.top);
        let x1 = self.x1.min(other.x1);
        let bottom = self.bottom.min(other.bottom);
        (x1 > x0 && bottom > top).then(|| BBox::new(x0, top, x1, bottom))
    }

    /// Whether the two boxes share a positive area.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.intersection(other).is_some()
    }

    /// Fraction of this box's area that lies inside `other` (0.0..=1.0).
    pub fn overlap_fraction(&self, other: &BBox) -> f64 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        self.intersection(other)
            .map_or(0.0, |overlap| overlap.area() / area)
    }

    /// Whether the vertical bands `[top, bottom]` of both boxes overlap.
    pub fn overlaps_vertically(&self, other: &BBox) -> bool {
        self.top < other.bottom && other.top < self.bottom
    }
}

/// A point in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Affine transformation matrix `[a b c d e f]` as used by the `cm` and `Tm`
/// operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ctm {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Ctm {
    fn default() -> Self {
        Self::identity()
    }
}

impl Ctm {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// Pure translation matrix.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Matrix product `self × other` (apply `self` first, then `other`).
    pub fn concat(&self, other: &Ctm) -> Ctm {
        Ctm {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform_point(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }

    /// Axis-aligned box covering the image of the unit square, flipped to
    /// top-left origin with `page_height`.
    pub fn unit_square_bbox(&self, page_height: f64) -> BBox {
        let corners = [
            self.transform_point(Point::new(0.0, 0.0)),
            self.transform_point(Point::new(1.0, 0.0)),
            self.transform_point(Point::new(0.0, 1.0)),
            self.transform_point(Point::new(1.0, 1.0)),
        ];
        let x0 = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let x1 = corners
            .iter()
            .map(|p| p.x)
            .fold(f64::NEG_INFINITY, f64::max);
        let y0 = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let y1 = corners
            .iter()
            .map(|p| p.y)
            .fold(f64::NEG_INFINITY, f64::max);
        BBox::new(x0, page_height - y1, x1, page_height - y0)
    }
}
