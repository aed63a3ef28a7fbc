//! Containment and overlap tests between coplanar polygons.

use nalgebra::Point3;

use crate::bsp2d::{IntersectionType, PointClassification};
use crate::tolerance::Real;

use super::Polygon;

impl Polygon {
    /// Classifies a point on the polygon's plane.
    pub fn classify_point(&self, point: &Point3<Real>) -> PointClassification {
        self.bsp_tree()
            .map_or(PointClassification::Outside, |tree| tree.classify_vertex(point))
    }

    /// Inside or on the border.
    pub fn include_point(&self, point: &Point3<Real>) -> bool {
        self.classify_point(point) != PointClassification::Outside
    }

    /// Same outline on the same plane, whichever way either one faces.
    pub fn is_identical(&self, other: &Polygon) -> bool {
        if self.edges.len() != other.edges.len() {
            return false;
        }
        if !self.plane.is_equivalent(&other.plane) && !self.plane.is_inverted(&other.plane) {
            return false;
        }
        let theirs = other.edges_3d();
        self.edges_3d().iter().all(|mine| {
            theirs
                .iter()
                .any(|e| e.is_equivalent(mine) || e.is_equivalent(&mine.inverted()))
        })
    }

    /// No edge of `other` reaches outside this polygon.
    pub fn include_all_edges(&self, other: &Polygon) -> bool {
        if self.is_identical(other) {
            return true;
        }
        let Some(tree) = self.bsp_tree() else {
            return false;
        };
        other.edges_3d().iter().all(|e| tree.is_inside(e, false))
    }

    /// This polygon covers `other` entirely.
    ///
    /// Every edge of `other` stays within this polygon and none of this
    /// polygon's edges pass through the interior of `other`.
    pub fn include(&self, other: &Polygon) -> bool {
        if self.is_identical(other) {
            return true;
        }
        if !self.include_all_edges(other) {
            return false;
        }
        let Some(tree) = other.bsp_tree() else {
            return false;
        };
        self.edges_3d()
            .iter()
            .all(|e| tree.partitions(e).negative.is_empty())
    }

    /// How `other` meets this polygon, seen from this polygon's tree.
    ///
    /// Contact at isolated points does not count as touching. Use
    /// [`Polygon::intersection_type`] for the symmetric answer.
    pub fn has_intersection(&self, other: &Polygon) -> IntersectionType {
        if !self.is_valid() || !other.is_valid() || self.is_open() || other.is_open() {
            return IntersectionType::None;
        }
        if !self.plane.is_equivalent(&other.plane) && !self.plane.is_inverted(&other.plane) {
            return IntersectionType::None;
        }
        if self.is_identical(other) {
            return IntersectionType::Intersection;
        }
        let Some(tree) = self.bsp_tree() else {
            return IntersectionType::None;
        };

        if other
            .vertices
            .iter()
            .any(|v| tree.classify_vertex(&v.pos) == PointClassification::Inside)
        {
            return IntersectionType::Intersection;
        }

        let mut result = IntersectionType::None;
        for edge in other.edges_3d() {
            match tree.has_intersection(&edge) {
                IntersectionType::Intersection => return IntersectionType::Intersection,
                IntersectionType::JustTouch => result = IntersectionType::JustTouch,
                IntersectionType::None => {}
            }
        }
        result
    }

    /// The stronger of the two one-sided answers.
    pub fn intersection_type(a: &Polygon, b: &Polygon) -> IntersectionType {
        a.has_intersection(b).max(b.has_intersection(a))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_shapes::*;
    use super::*;

    #[test]
    fn point_queries() {
        let square = make_square(0.0, 0.0, 2.0);
        assert_eq!(square.classify_point(&Point3::new(1.0, 1.0, 0.0)), PointClassification::Inside);
        assert_eq!(square.classify_point(&Point3::new(2.0, 1.0, 0.0)), PointClassification::Border);
        assert!(!square.include_point(&Point3::new(3.0, 1.0, 0.0)));

        let ring = square_with_hole(4.0, 2.0);
        assert!(!ring.include_point(&Point3::new(2.0, 2.0, 0.0)));
        assert!(ring.include_point(&Point3::new(0.5, 0.5, 0.0)));
    }

    #[test]
    fn identical_ignores_start_vertex() {
        let a = make_square(0.0, 0.0, 1.0);
        let b = Polygon::new(vec![
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ])
        .unwrap();
        assert!(a.is_identical(&b));
        assert!(!a.is_identical(&make_square(0.0, 0.0, 2.0)));
    }

    #[test]
    fn containment() {
        let big = make_square(0.0, 0.0, 4.0);
        let small = make_square(1.0, 1.0, 1.0);
        let corner = make_square(0.0, 0.0, 1.0);
        let straddling = make_square(3.0, 3.0, 2.0);

        assert!(big.include(&small));
        assert!(big.include(&corner));
        assert!(!small.include(&big));
        assert!(!big.include(&straddling));
        assert!(big.include_all_edges(&corner));
    }

    #[test]
    fn intersection_kinds() {
        let a = make_square(0.0, 0.0, 1.0);
        let overlapping = make_square(0.5, 0.5, 1.0);
        let adjacent = make_square(1.0, 0.0, 1.0);
        let corner = make_square(1.0, 1.0, 1.0);
        let far = make_square(5.0, 5.0, 1.0);
        let enclosing = make_square(-1.0, -1.0, 3.0);

        assert_eq!(Polygon::intersection_type(&a, &overlapping), IntersectionType::Intersection);
        assert_eq!(Polygon::intersection_type(&a, &adjacent), IntersectionType::JustTouch);
        assert_eq!(Polygon::intersection_type(&a, &corner), IntersectionType::None);
        assert_eq!(Polygon::intersection_type(&a, &far), IntersectionType::None);
        assert_eq!(Polygon::intersection_type(&a, &enclosing), IntersectionType::Intersection);
        assert_eq!(Polygon::intersection_type(&a, &a.clone()), IntersectionType::Intersection);
    }

    #[test]
    fn flipped_twin_is_identical_and_overlapping() {
        let a = make_square(0.0, 0.0, 1.0);
        let twin = a.clone().flipped();
        assert!(a.is_identical(&twin));
        assert!(twin.is_identical(&a));
        assert_eq!(Polygon::intersection_type(&a, &twin), IntersectionType::Intersection);
        assert_eq!(Polygon::intersection_type(&twin, &a), IntersectionType::Intersection);
    }
}
