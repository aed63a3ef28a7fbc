//! Scalar type and the shared geometric tolerance.

use core::str::FromStr;
use std::sync::OnceLock;

use nalgebra::{Point2, Point3};

/// Scalar used for every coordinate in the kernel.
pub type Real = f64;

/// Hard cap on loop walks and sweep retries. Exceeding it is reported as an error.
pub const LOOP_ITERATION_LIMIT: usize = 10_000;

/// Scale factors with a smaller magnitude than this leave a polygon untouched.
pub const MIN_SCALE_FACTOR: Real = 0.001;

/// Slack added to bounding boxes before model-level overlap tests.
pub const BOUND_BOX_SLACK: Real = 0.01;

const DEFAULT_EPSILON: Real = 1e-5;

/// Lazily-initialized tolerance used across the crate.
///
/// It can be overridden at build time with the `BRUSH_CSG_EPSILON` env var,
/// or once at runtime with [`set_epsilon`].
static EPSILON_CELL: OnceLock<Real> = OnceLock::new();

/// Returns the distance under which two values are regarded as equal.
pub fn epsilon() -> Real {
    *EPSILON_CELL.get_or_init(|| {
        if let Some(value) = option_env!("BRUSH_CSG_EPSILON") {
            if let Ok(parsed) = Real::from_str(value) {
                return parsed.max(Real::EPSILON);
            }
        }
        DEFAULT_EPSILON
    })
}

/// Sets the tolerance once. Calls after the first read are ignored.
pub fn set_epsilon(value: Real) {
    let _ = EPSILON_CELL.set(value.max(Real::EPSILON));
}

#[inline]
pub fn is_equivalent(a: Real, b: Real) -> bool {
    (a - b).abs() < epsilon()
}

#[inline]
pub fn is_zero(a: Real) -> bool {
    a.abs() < epsilon()
}

/// Component-wise equivalence of two 3D points.
#[inline]
pub fn points_equivalent(p: &Point3<Real>, q: &Point3<Real>) -> bool {
    is_equivalent(p.x, q.x) && is_equivalent(p.y, q.y) && is_equivalent(p.z, q.z)
}

#[inline]
pub fn points2_equivalent(p: &Point2<Real>, q: &Point2<Real>) -> bool {
    is_equivalent(p.x, q.x) && is_equivalent(p.y, q.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsilon_is_positive() {
        assert!(epsilon() > 0.0);
    }

    #[test]
    fn near_points_are_equivalent() {
        let p = Point3::new(1.0, 2.0, 3.0);
        let q = Point3::new(1.0 + epsilon() * 0.5, 2.0, 3.0);
        let r = Point3::new(1.0 + epsilon() * 2.0, 2.0, 3.0);
        assert!(points_equivalent(&p, &q));
        assert!(!points_equivalent(&p, &r));
    }
}
