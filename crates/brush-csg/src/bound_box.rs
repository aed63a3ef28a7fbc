//! Axis-aligned bounding boxes.

use nalgebra::{Point3, Vector3};

use crate::tolerance::Real;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundBox {
    pub min: Point3<Real>,
    pub max: Point3<Real>,
}

impl BoundBox {
    /// Smallest box around `points`, `None` when there are none.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3<Real>>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bbox = Self { min: first, max: first };
        for p in iter {
            bbox.add_point(p);
        }
        Some(bbox)
    }

    pub fn add_point(&mut self, p: &Point3<Real>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn merged(&self, other: &BoundBox) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Grows the box by `amount` on every side.
    pub fn expanded(&self, amount: Real) -> Self {
        let delta = Vector3::repeat(amount);
        Self {
            min: self.min - delta,
            max: self.max + delta,
        }
    }

    pub fn intersects(&self, other: &BoundBox) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    pub fn center(&self) -> Point3<Real> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Half of the diagonal length.
    pub fn radius(&self) -> Real {
        (self.max - self.min).norm() * 0.5
    }
}
