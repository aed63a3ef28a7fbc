//! Line and edge primitives in the plane frame and in world space.

use nalgebra::{Point2, Point3, Vector2};

use crate::plane::Plane3D;
use crate::tolerance::{self, Real};

/// An infinite 2D line `normal · p = offset`.
///
/// A line built from an edge `a → b` has its normal pointing to the right of
/// the direction of travel. For a counter-clockwise outer loop the positive
/// side is therefore outside the region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line2D {
    normal: Vector2<Real>,
    offset: Real,
}

impl Line2D {
    /// Returns `None` for a degenerate (zero-length) edge.
    pub fn from_points(a: &Point2<Real>, b: &Point2<Real>) -> Option<Self> {
        let dir = b - a;
        let len = dir.norm();
        if len < Real::EPSILON {
            return None;
        }
        let normal = Vector2::new(dir.y, -dir.x) / len;
        Some(Self {
            normal,
            offset: normal.dot(&a.coords),
        })
    }

    #[inline]
    pub fn normal(&self) -> Vector2<Real> {
        self.normal
    }

    /// Direction of travel of the edge the line was built from.
    #[inline]
    pub fn direction(&self) -> Vector2<Real> {
        Vector2::new(-self.normal.y, self.normal.x)
    }

    #[inline]
    pub fn signed_distance(&self, p: &Point2<Real>) -> Real {
        self.normal.dot(&p.coords) - self.offset
    }

    /// The same line pushed `distance` along its normal.
    pub fn offset_by(&self, distance: Real) -> Self {
        Self {
            normal: self.normal,
            offset: self.offset + distance,
        }
    }

    /// Crossing point of two lines, `None` when they are parallel.
    pub fn intersect(&self, other: &Line2D) -> Option<Point2<Real>> {
        let det = self.normal.x * other.normal.y - self.normal.y * other.normal.x;
        if det.abs() < Real::EPSILON {
            return None;
        }
        let x = (self.offset * other.normal.y - self.normal.y * other.offset) / det;
        let y = (self.normal.x * other.offset - self.offset * other.normal.x) / det;
        Some(Point2::new(x, y))
    }

    pub fn project(&self, p: &Point2<Real>) -> Point2<Real> {
        p - self.normal * self.signed_distance(p)
    }
}

/// Result of intersecting two 2D segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeIntersection {
    None,
    /// The segments cross or touch at a single point.
    Point(Point2<Real>),
    /// The segments are collinear and share a stretch.
    Overlap(Edge2D),
}

/// Result of removing one collinear segment from another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeSubtraction {
    /// The segments are not collinear.
    Invalid,
    /// Nothing is left.
    None,
    One(Edge2D),
    Two(Edge2D, Edge2D),
}

/// A directed 2D segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge2D {
    pub v: [Point2<Real>; 2],
}

impl Edge2D {
    pub fn new(a: Point2<Real>, b: Point2<Real>) -> Self {
        Self { v: [a, b] }
    }

    #[inline]
    pub fn direction(&self) -> Vector2<Real> {
        self.v[1] - self.v[0]
    }

    #[inline]
    pub fn length(&self) -> Real {
        self.direction().norm()
    }

    #[inline]
    pub fn is_point(&self) -> bool {
        tolerance::points2_equivalent(&self.v[0], &self.v[1])
    }

    pub fn inverted(&self) -> Self {
        Self::new(self.v[1], self.v[0])
    }

    pub fn line(&self) -> Option<Line2D> {
        Line2D::from_points(&self.v[0], &self.v[1])
    }

    pub fn midpoint(&self) -> Point2<Real> {
        nalgebra::center(&self.v[0], &self.v[1])
    }

    /// Same endpoints in the same order, within epsilon.
    pub fn is_equivalent(&self, other: &Edge2D) -> bool {
        tolerance::points2_equivalent(&self.v[0], &other.v[0])
            && tolerance::points2_equivalent(&self.v[1], &other.v[1])
    }

    /// Both endpoints lie on the other edge's line.
    pub fn is_collinear(&self, other: &Edge2D) -> bool {
        match other.line() {
            Some(line) => {
                tolerance::is_zero(line.signed_distance(&self.v[0]))
                    && tolerance::is_zero(line.signed_distance(&self.v[1]))
            }
            None => false,
        }
    }

    /// Whether `p` lies on the segment, endpoints included.
    pub fn contains_point(&self, p: &Point2<Real>) -> bool {
        let eps = tolerance::epsilon();
        let dir = self.direction();
        let len = dir.norm();
        if len < Real::EPSILON {
            return tolerance::points2_equivalent(&self.v[0], p);
        }
        let unit = dir / len;
        let rel = p - self.v[0];
        let along = rel.dot(&unit);
        let across = rel.x * unit.y - rel.y * unit.x;
        across.abs() < eps && along > -eps && along < len + eps
    }

    /// Segment/segment intersection with collinear overlap detection.
    pub fn intersect(&self, other: &Edge2D) -> EdgeIntersection {
        let eps = tolerance::epsilon();
        if self.is_collinear(other) {
            let Some(unit) = self.direction().try_normalize(Real::EPSILON) else {
                return EdgeIntersection::None;
            };
            let t = |p: &Point2<Real>| (p - self.v[0]).dot(&unit);
            let (a0, a1): (Real, Real) = (0.0, self.length());
            let (b0, b1) = min_max(t(&other.v[0]), t(&other.v[1]));
            let lo = a0.max(b0);
            let hi = a1.min(b1);
            if hi - lo > eps {
                return EdgeIntersection::Overlap(Edge2D::new(
                    self.v[0] + unit * lo,
                    self.v[0] + unit * hi,
                ));
            }
            if hi - lo > -eps {
                return EdgeIntersection::Point(self.v[0] + unit * lo);
            }
            return EdgeIntersection::None;
        }

        let d = self.direction();
        let e = other.direction();
        let denom = d.x * e.y - d.y * e.x;
        if denom.abs() < Real::EPSILON {
            return EdgeIntersection::None;
        }
        let w = other.v[0] - self.v[0];
        let s = (w.x * e.y - w.y * e.x) / denom;
        let u = (w.x * d.y - w.y * d.x) / denom;
        let s_eps = eps / d.norm().max(Real::EPSILON);
        let u_eps = eps / e.norm().max(Real::EPSILON);
        if s < -s_eps || s > 1.0 + s_eps || u < -u_eps || u > 1.0 + u_eps {
            return EdgeIntersection::None;
        }
        EdgeIntersection::Point(self.v[0] + d * s.clamp(0.0, 1.0))
    }

    /// Crossing in the strict sense: the segments intersect at a point that
    /// is interior to both of them.
    pub fn crosses(&self, other: &Edge2D) -> bool {
        match self.intersect(other) {
            EdgeIntersection::Point(p) => {
                let at_end = |edge: &Edge2D| {
                    tolerance::points2_equivalent(&edge.v[0], &p)
                        || tolerance::points2_equivalent(&edge.v[1], &p)
                };
                !at_end(self) && !at_end(other)
            }
            EdgeIntersection::Overlap(_) => true,
            EdgeIntersection::None => false,
        }
    }

    /// Removes the stretch covered by `other` from this edge.
    ///
    /// The remaining pieces keep this edge's direction.
    pub fn subtract(&self, other: &Edge2D) -> EdgeSubtraction {
        if !self.is_collinear(other) {
            return EdgeSubtraction::Invalid;
        }
        let eps = tolerance::epsilon();
        let Some(unit) = self.direction().try_normalize(Real::EPSILON) else {
            return EdgeSubtraction::Invalid;
        };
        let len = self.length();
        let t = |p: &Point2<Real>| (p - self.v[0]).dot(&unit);
        let (b0, b1) = min_max(t(&other.v[0]), t(&other.v[1]));
        let at = |s: Real| self.v[0] + unit * s;

        if b1 <= eps || b0 >= len - eps {
            return EdgeSubtraction::One(*self);
        }
        let head = (b0 > eps).then(|| Edge2D::new(self.v[0], at(b0)));
        let tail = (b1 < len - eps).then(|| Edge2D::new(at(b1), self.v[1]));
        match (head, tail) {
            (Some(h), Some(t)) => EdgeSubtraction::Two(h, t),
            (Some(h), None) => EdgeSubtraction::One(h),
            (None, Some(t)) => EdgeSubtraction::One(t),
            (None, None) => EdgeSubtraction::None,
        }
    }
}

fn min_max(a: Real, b: Real) -> (Real, Real) {
    if a <= b { (a, b) } else { (b, a) }
}

/// A directed 3D segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge3D {
    pub v: [Point3<Real>; 2],
}

impl Edge3D {
    pub fn new(a: Point3<Real>, b: Point3<Real>) -> Self {
        Self { v: [a, b] }
    }

    pub fn inverted(&self) -> Self {
        Self::new(self.v[1], self.v[0])
    }

    #[inline]
    pub fn is_point(&self) -> bool {
        tolerance::points_equivalent(&self.v[0], &self.v[1])
    }

    pub fn length(&self) -> Real {
        (self.v[1] - self.v[0]).norm()
    }

    /// Point at parameter `t`, `0` being the tail.
    pub fn lerp(&self, t: Real) -> Point3<Real> {
        self.v[0] + (self.v[1] - self.v[0]) * t
    }

    pub fn is_equivalent(&self, other: &Edge3D) -> bool {
        tolerance::points_equivalent(&self.v[0], &other.v[0])
            && tolerance::points_equivalent(&self.v[1], &other.v[1])
    }

    pub fn to_plane(&self, plane: &Plane3D) -> Edge2D {
        Edge2D::new(plane.world_to_plane(&self.v[0]), plane.world_to_plane(&self.v[1]))
    }
}
