//! Plane representation, its 2D parameterization and the predicates the kernel relies on.

use nalgebra::{Point2, Point3, Vector3};

use crate::tolerance::{self, Real};

/// Which side of a plane a point lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    /// Point is in front of the plane (positive side of normal)
    Front,
    /// Point is behind the plane (negative side of normal)
    Back,
    /// Point lies on the plane (within epsilon tolerance)
    OnPlane,
}

/// Classification of a polygon relative to a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// All vertices are in front of the plane
    Front,
    /// All vertices are behind the plane
    Back,
    /// All vertices are on the plane (coplanar)
    Coplanar,
    /// Vertices are on both sides (spans the plane)
    Spanning,
}

/// A plane in 3D space, represented as `normal · point = offset`.
///
/// Every plane carries an implicit right-handed 2D frame `(u, v)` with
/// `u × v = normal`. Loops that turn counter-clockwise around the normal
/// have positive signed area in that frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane3D {
    normal: Vector3<Real>,
    offset: Real,
}

impl Plane3D {
    /// Creates a new plane from a normal vector and offset.
    /// The normal will be normalized automatically.
    ///
    /// # Panics
    /// Panics if the normal vector has zero length.
    pub fn new(normal: Vector3<Real>, offset: Real) -> Self {
        let norm = normal.norm();
        assert!(norm > Real::EPSILON, "Plane normal cannot be zero");
        Self {
            normal: normal / norm,
            offset: offset / norm,
        }
    }

    /// Creates a plane from a point on the plane and a normal vector.
    ///
    /// # Panics
    /// Panics if the normal vector has zero length.
    pub fn from_point_and_normal(point: Point3<Real>, normal: Vector3<Real>) -> Self {
        let norm = normal.norm();
        assert!(norm > Real::EPSILON, "Plane normal cannot be zero");
        let unit_normal = normal / norm;
        Self {
            normal: unit_normal,
            offset: unit_normal.dot(&point.coords),
        }
    }

    /// Creates a plane from three points, following the right-hand rule `(b - a) × (c - a)`.
    ///
    /// Returns `None` when the points are collinear.
    pub fn from_three_points(a: Point3<Real>, b: Point3<Real>, c: Point3<Real>) -> Option<Self> {
        let normal = (b - a).cross(&(c - a));
        (normal.norm() > Real::EPSILON).then(|| Self::from_point_and_normal(a, normal))
    }

    /// Fits a plane through a closed loop of points with Newell's method.
    ///
    /// The normal follows the loop's winding. Returns `None` for loops with
    /// no area.
    pub fn from_loop(points: &[Point3<Real>]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let mut normal = Vector3::zeros();
        let mut centroid = Vector3::zeros();
        for (i, p) in points.iter().enumerate() {
            let q = points[(i + 1) % points.len()];
            normal.x += (p.y - q.y) * (p.z + q.z);
            normal.y += (p.z - q.z) * (p.x + q.x);
            normal.z += (p.x - q.x) * (p.y + q.y);
            centroid += p.coords;
        }
        if normal.norm() <= Real::EPSILON {
            return None;
        }
        let centroid = Point3::from(centroid / points.len() as Real);
        Some(Self::from_point_and_normal(centroid, normal))
    }

    /// Returns the unit normal vector of the plane.
    #[inline]
    pub fn normal(&self) -> Vector3<Real> {
        self.normal
    }

    /// Returns the signed distance from the origin to the plane along the normal.
    #[inline]
    pub fn offset(&self) -> Real {
        self.offset
    }

    /// Computes the signed distance from a point to the plane.
    /// - Positive: point is in front (same side as normal)
    /// - Negative: point is behind (opposite side from normal)
    #[inline]
    pub fn signed_distance(&self, point: &Point3<Real>) -> Real {
        self.normal.dot(&point.coords) - self.offset
    }

    /// Classifies which side of the plane a point lies on using the kernel epsilon.
    #[inline]
    pub fn classify_point(&self, point: &Point3<Real>) -> PlaneSide {
        self.classify_point_with_epsilon(point, tolerance::epsilon())
    }

    /// Classifies which side of the plane a point lies on, with a custom epsilon.
    pub fn classify_point_with_epsilon(&self, point: &Point3<Real>, epsilon: Real) -> PlaneSide {
        let dist = self.signed_distance(point);
        if dist > epsilon {
            PlaneSide::Front
        } else if dist < -epsilon {
            PlaneSide::Back
        } else {
            PlaneSide::OnPlane
        }
    }

    /// Returns a new plane facing the opposite direction.
    #[inline]
    pub fn inverted(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// Same normal and offset within epsilon.
    pub fn is_equivalent(&self, other: &Plane3D) -> bool {
        let eps = tolerance::epsilon();
        (self.normal - other.normal).amax() < eps && (self.offset - other.offset).abs() < eps
    }

    /// Equivalent to the other plane once one of them is inverted.
    #[inline]
    pub fn is_inverted(&self, other: &Plane3D) -> bool {
        self.is_equivalent(&other.inverted())
    }

    #[inline]
    pub fn is_same_facing(&self, other: &Plane3D) -> bool {
        self.normal.dot(&other.normal) > 0.0
    }

    /// The in-plane axes `(u, v)` of the 2D frame.
    pub fn basis(&self) -> (Vector3<Real>, Vector3<Real>) {
        let n = self.normal;
        let (ax, ay, az) = (n.x.abs(), n.y.abs(), n.z.abs());
        let seed = if ax <= ay && ax <= az {
            Vector3::x()
        } else if ay <= az {
            Vector3::y()
        } else {
            Vector3::z()
        };
        let u = (seed - n * n.dot(&seed)).normalize();
        let v = n.cross(&u);
        (u, v)
    }

    /// Projects a world point into the plane's 2D frame.
    pub fn world_to_plane(&self, point: &Point3<Real>) -> Point2<Real> {
        let (u, v) = self.basis();
        Point2::new(u.dot(&point.coords), v.dot(&point.coords))
    }

    /// Lifts a 2D frame point back onto the plane.
    pub fn plane_to_world(&self, point: &Point2<Real>) -> Point3<Real> {
        let (u, v) = self.basis();
        Point3::from(self.normal * self.offset + u * point.x + v * point.y)
    }

    /// Projects a point onto the plane (finds the closest point on the plane).
    #[inline]
    pub fn project_point(&self, point: &Point3<Real>) -> Point3<Real> {
        point - self.normal * self.signed_distance(point)
    }

    /// Intersects the infinite ray `origin + t * direction` with the plane.
    ///
    /// Returns `None` when the ray is parallel to the plane.
    pub fn hit_test(&self, origin: &Point3<Real>, direction: &Vector3<Real>) -> Option<(Real, Point3<Real>)> {
        let denom = self.normal.dot(direction);
        if denom.abs() < Real::EPSILON {
            return None;
        }
        let t = -self.signed_distance(origin) / denom;
        Some((t, origin + direction * t))
    }

    /// Computes the intersection of a line segment with the plane.
    ///
    /// Returns `Some((t, point))` with `t` in `[0, 1]`, or `None` if the
    /// segment is parallel or misses the plane.
    pub fn intersect_segment(
        &self,
        start: &Point3<Real>,
        end: &Point3<Real>,
    ) -> Option<(Real, Point3<Real>)> {
        let (t, point) = self.hit_test(start, &(end - start))?;
        (0.0..=1.0).contains(&t).then_some((t, point))
    }

    /// Line shared by two non-parallel planes, as `(point, unit direction)`.
    pub fn intersect_plane(&self, other: &Plane3D) -> Option<(Point3<Real>, Vector3<Real>)> {
        let direction = self.normal.cross(&other.normal);
        let len_sq = direction.norm_squared();
        if len_sq < tolerance::epsilon() * tolerance::epsilon() {
            return None;
        }
        let point = (other.normal.cross(&direction) * self.offset
            + direction.cross(&self.normal) * other.offset)
            / len_sq;
        Some((Point3::from(point), direction / len_sq.sqrt()))
    }
}
