//! 2D BSP tree container and construction.

use nalgebra::Point3;
use tracing::{debug, instrument};

use crate::edge::Edge3D;
use crate::plane::Plane3D;
use crate::tolerance::{self, Real};

use super::node::BspNode2D;
use super::{EdgePartitions, IntersectionType, PointClassification};

/// A BSP tree over the edges of one coplanar region.
///
/// Each node splits the plane by the line through one boundary edge. The
/// positive side of every line is outside the region, so a query that falls
/// off a missing positive child is outside and one that falls off a missing
/// negative child is inside.
///
/// ```ignore
/// let tree = BspTree2D::build(plane, edges);
/// match tree.classify_vertex(&point) {
///     PointClassification::Inside => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone)]
pub struct BspTree2D {
    plane: Plane3D,
    root: Option<BspNode2D>,
}

impl BspTree2D {
    /// Builds a tree from boundary edges lying on `plane`.
    ///
    /// Point-like edges are ignored. The first remaining edge becomes the
    /// root splitter.
    #[instrument(skip_all, fields(edges = edges.len()))]
    pub fn build(plane: Plane3D, edges: Vec<Edge3D>) -> Self {
        let edges: Vec<Edge3D> = edges.into_iter().filter(|e| !e.is_point()).collect();
        let root = build_node(&plane, edges);
        let tree = Self { plane, root };
        debug!(depth = tree.depth(), "built 2d bsp");
        tree
    }

    #[inline]
    pub fn plane(&self) -> &Plane3D {
        &self.plane
    }

    #[inline]
    pub fn root(&self) -> Option<&BspNode2D> {
        self.root.as_ref()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn edge_count(&self) -> usize {
        self.root.as_ref().map_or(0, |n| n.edge_count())
    }

    /// Returns the maximum depth of the tree (0 for empty tree).
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, |n| n.depth())
    }

    /// Classifies a point on the tree's plane against the region.
    pub fn classify_vertex(&self, point: &Point3<Real>) -> PointClassification {
        match &self.root {
            Some(root) => root.classify_point(&self.plane, &self.plane.world_to_plane(point)),
            None => PointClassification::Outside,
        }
    }

    /// Splits `edge` into the fragments outside, inside and on the boundary.
    pub fn partitions(&self, edge: &Edge3D) -> EdgePartitions {
        let mut out = EdgePartitions::default();
        match &self.root {
            Some(root) => root.partition(&self.plane, *edge, &mut out),
            None => {
                if !edge.is_point() {
                    out.positive.push(*edge);
                }
            }
        }
        out
    }

    pub fn has_intersection(&self, edge: &Edge3D) -> IntersectionType {
        let parts = self.partitions(edge);
        if !parts.negative.is_empty() {
            IntersectionType::Intersection
        } else if !parts.co_same.is_empty() || !parts.co_diff.is_empty() {
            IntersectionType::JustTouch
        } else {
            IntersectionType::None
        }
    }

    /// Whether no part of `edge` lies outside the region.
    ///
    /// With `treat_co_diff_as_outside`, boundary stretches running against
    /// the region's own edges also count as outside.
    pub fn is_inside(&self, edge: &Edge3D, treat_co_diff_as_outside: bool) -> bool {
        let parts = self.partitions(edge);
        parts.positive.is_empty() && (!treat_co_diff_as_outside || parts.co_diff.is_empty())
    }
}

/// Recursively builds a node from edges lying on `plane`.
fn build_node(plane: &Plane3D, mut edges: Vec<Edge3D>) -> Option<BspNode2D> {
    if edges.is_empty() {
        return None;
    }

    let splitter = edges.remove(0);
    let line = splitter.to_plane(plane).line()?;
    let eps = tolerance::epsilon();

    let mut coincident = vec![splitter];
    let mut positive = Vec::new();
    let mut negative = Vec::new();

    for edge in edges {
        let flat = edge.to_plane(plane);
        let d0 = line.signed_distance(&flat.v[0]);
        let d1 = line.signed_distance(&flat.v[1]);

        if d0.abs() < eps && d1.abs() < eps {
            // A reversed copy of the splitter is a double-back; keep it out of the coincident set.
            if edge.is_equivalent(&splitter.inverted()) {
                positive.push(edge);
            } else {
                coincident.push(edge);
            }
        } else if d0 > -eps && d1 > -eps {
            positive.push(edge);
        } else if d0 < eps && d1 < eps {
            negative.push(edge);
        } else {
            let mid = edge.lerp(d0 / (d0 - d1));
            let head = Edge3D::new(edge.v[0], mid);
            let tail = Edge3D::new(mid, edge.v[1]);
            let (pos_part, neg_part) = if d0 > 0.0 { (head, tail) } else { (tail, head) };
            if !pos_part.is_point() {
                positive.push(pos_part);
            }
            if !neg_part.is_point() {
                negative.push(neg_part);
            }
        }
    }

    let mut node = BspNode2D::new(line, coincident);
    node.set_positive(build_node(plane, positive));
    node.set_negative(build_node(plane, negative));
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use proptest::prelude::*;

    fn floor() -> Plane3D {
        Plane3D::new(Vector3::z(), 0.0)
    }

    fn p(x: Real, y: Real) -> Point3<Real> {
        Point3::new(x, y, 0.0)
    }

    fn edge(a: [Real; 2], b: [Real; 2]) -> Edge3D {
        Edge3D::new(p(a[0], a[1]), p(b[0], b[1]))
    }

    fn loop_edges(points: &[[Real; 2]]) -> Vec<Edge3D> {
        (0..points.len())
            .map(|i| edge(points[i], points[(i + 1) % points.len()]))
            .collect()
    }

    fn unit_square_tree() -> BspTree2D {
        BspTree2D::build(floor(), loop_edges(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]))
    }

    fn l_shape() -> Vec<[Real; 2]> {
        vec![[0.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 1.0], [1.0, 2.0], [0.0, 2.0]]
    }

    /// Even-odd ray crossing test used as a reference.
    fn ray_crossing_inside(points: &[[Real; 2]], x: Real, y: Real) -> bool {
        let mut inside = false;
        let n = points.len();
        for i in 0..n {
            let [xi, yi] = points[i];
            let [xj, yj] = points[(i + n - 1) % n];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
        }
        inside
    }

    fn distance_to_boundary(points: &[[Real; 2]], x: Real, y: Real) -> Real {
        let n = points.len();
        (0..n)
            .map(|i| {
                let a = nalgebra::Vector2::new(points[i][0], points[i][1]);
                let b = nalgebra::Vector2::new(points[(i + 1) % n][0], points[(i + 1) % n][1]);
                let q = nalgebra::Vector2::new(x, y);
                let t = ((q - a).dot(&(b - a)) / (b - a).norm_squared()).clamp(0.0, 1.0);
                (a + (b - a) * t - q).norm()
            })
            .fold(Real::MAX, Real::min)
    }

    #[test]
    fn empty_tree_is_outside_everywhere() {
        let tree = BspTree2D::build(floor(), vec![]);
        assert!(tree.is_empty());
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.classify_vertex(&p(0.0, 0.0)), PointClassification::Outside);
    }

    #[test]
    fn square_tree_stores_every_edge() {
        let tree = unit_square_tree();
        assert_eq!(tree.edge_count(), 4);
        assert_eq!(tree.depth(), 4);
    }

    #[test]
    fn classify_square_points() {
        let tree = unit_square_tree();
        assert_eq!(tree.classify_vertex(&p(0.5, 0.5)), PointClassification::Inside);
        assert_eq!(tree.classify_vertex(&p(1.5, 0.5)), PointClassification::Outside);
        assert_eq!(tree.classify_vertex(&p(0.5, 0.0)), PointClassification::Border);
        assert_eq!(tree.classify_vertex(&p(1.0, 1.0)), PointClassification::Border);
        // On the bottom line's extension, but not on the boundary.
        assert_eq!(tree.classify_vertex(&p(2.0, 0.0)), PointClassification::Outside);
    }

    #[test]
    fn has_intersection_cases() {
        let tree = unit_square_tree();
        assert_eq!(tree.has_intersection(&edge([2.0, 0.0], [3.0, 0.0])), IntersectionType::None);
        assert_eq!(tree.has_intersection(&edge([0.0, 0.0], [1.0, 0.0])), IntersectionType::JustTouch);
        assert_eq!(tree.has_intersection(&edge([-1.0, 0.5], [2.0, 0.5])), IntersectionType::Intersection);
        assert_eq!(tree.has_intersection(&edge([1.0, 1.0], [2.0, 2.0])), IntersectionType::None);
    }

    #[test]
    fn is_inside_respects_co_diff_flag() {
        let tree = unit_square_tree();
        let reversed_bottom = edge([1.0, 0.0], [0.0, 0.0]);
        assert!(tree.is_inside(&reversed_bottom, false));
        assert!(!tree.is_inside(&reversed_bottom, true));
        assert!(tree.is_inside(&edge([0.2, 0.2], [0.8, 0.8]), true));
        assert!(!tree.is_inside(&edge([0.5, 0.5], [1.5, 0.5]), false));
    }

    #[test]
    fn partitions_of_crossing_edge() {
        let tree = unit_square_tree();
        let parts = tree.partitions(&edge([-1.0, 0.5], [2.0, 0.5]));
        let inside: Real = parts.negative.iter().map(|e| e.length()).sum();
        let outside: Real = parts.positive.iter().map(|e| e.length()).sum();
        assert!((inside - 1.0).abs() < 1e-9);
        assert!((outside - 2.0).abs() < 1e-9);
    }

    #[test]
    fn reversed_splitter_goes_positive() {
        let tree = BspTree2D::build(floor(), vec![edge([0.0, 0.0], [1.0, 0.0]), edge([1.0, 0.0], [0.0, 0.0])]);
        let root = tree.root().unwrap();
        assert_eq!(root.coincident().len(), 1);
        assert!(root.positive().is_some());
    }

    #[test]
    fn concave_classification() {
        let tree = BspTree2D::build(floor(), loop_edges(&l_shape()));
        assert_eq!(tree.classify_vertex(&p(0.5, 1.5)), PointClassification::Inside);
        assert_eq!(tree.classify_vertex(&p(1.5, 1.5)), PointClassification::Outside);
        assert_eq!(tree.classify_vertex(&p(1.5, 0.5)), PointClassification::Inside);
    }

    proptest! {
        #[test]
        fn classification_agrees_with_ray_crossing(x in -0.5f64..2.5, y in -0.5f64..2.5) {
            let shape = l_shape();
            prop_assume!(distance_to_boundary(&shape, x, y) > 1e-3);
            let tree = BspTree2D::build(floor(), loop_edges(&shape));
            let expected = if ray_crossing_inside(&shape, x, y) {
                PointClassification::Inside
            } else {
                PointClassification::Outside
            };
            prop_assert_eq!(tree.classify_vertex(&p(x, y)), expected);
        }
    }
}
