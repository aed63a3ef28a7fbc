//! 3D BSP tree container and construction.

use nalgebra::Point3;
use tracing::{debug, instrument, warn};

use crate::bsp2d::PointClassification;
use crate::cuttable::Cuttable;
use crate::error::{CsgError, Result};
use crate::polygon::Polygon;
use crate::tolerance::Real;

use super::node::BspNode3D;
use super::selector::{FirstPolygon, SplitterSelector};
use super::PolygonPartitions;

/// A BSP tree over the faces of one solid.
///
/// Trees are built once from a polygon list using a [`SplitterSelector`]:
///
/// ```ignore
/// let tree = BspTree3D::build(polygons, &FirstPolygon);
/// if !tree.is_valid() {
///     // some face could not be split cleanly
/// }
/// ```
///
/// A face that produces no fragment when split marks the tree invalid. The
/// build still finishes so the tree stays usable for approximate queries.
#[derive(Debug, Clone)]
pub struct BspTree3D {
    root: Option<BspNode3D>,
    valid: bool,
}

impl Default for BspTree3D {
    fn default() -> Self {
        Self::new()
    }
}

impl BspTree3D {
    /// Creates an empty BSP tree.
    pub fn new() -> Self {
        Self { root: None, valid: true }
    }

    /// Builds a tree from a collection of polygons.
    ///
    /// Open and invalid polygons are skipped. Polygons spanning a splitting
    /// plane are split using the [`Cuttable`] trait.
    #[instrument(skip_all, fields(polygons = polygons.len()))]
    pub fn build<S: SplitterSelector>(polygons: Vec<Polygon>, selector: &S) -> Self {
        let mut valid = true;
        let root = build_node(polygons, selector, &mut valid);
        let tree = Self { root, valid };
        debug!(depth = tree.depth(), valid = tree.valid, "built 3d bsp");
        tree
    }

    /// Builds a tree using the default selector ([`FirstPolygon`]).
    pub fn from_polygons(polygons: Vec<Polygon>) -> Self {
        Self::build(polygons, &FirstPolygon)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// `false` when some face was lost while splitting during the build.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[inline]
    pub fn root(&self) -> Option<&BspNode3D> {
        self.root.as_ref()
    }

    pub fn polygon_count(&self) -> usize {
        self.root.as_ref().map_or(0, |n| n.polygon_count())
    }

    /// Returns the maximum depth of the tree (0 for empty tree).
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, |n| n.depth())
    }

    /// Collects all polygons stored in the tree. The order is not guaranteed.
    pub fn collect_polygons(&self) -> Vec<Polygon> {
        let mut result = Vec::with_capacity(self.polygon_count());
        if let Some(root) = &self.root {
            root.collect_polygons(&mut result);
        }
        result
    }

    /// Sorts the fragments of `polygon` by where they lie relative to the solid.
    ///
    /// Everything is positive against an empty tree.
    pub fn partitions(&self, polygon: &Polygon) -> Result<PolygonPartitions> {
        if !polygon.is_valid() {
            return Err(CsgError::InvalidPolygon);
        }
        let mut out = PolygonPartitions::default();
        match &self.root {
            Some(root) => root.partition(polygon.clone_preserving_guid(), &mut out)?,
            None => out.positive.push(polygon.clone_preserving_guid()),
        }
        Ok(out)
    }

    pub fn classify_point(&self, point: &Point3<Real>) -> PointClassification {
        self.root
            .as_ref()
            .map_or(PointClassification::Outside, |root| root.classify_point(point))
    }

    /// Strictly inside the solid.
    pub fn is_inside(&self, point: &Point3<Real>) -> bool {
        self.classify_point(point) == PointClassification::Inside
    }
}

/// Recursively builds a node from a list of polygons.
fn build_node<S: SplitterSelector>(mut polygons: Vec<Polygon>, selector: &S, valid: &mut bool) -> Option<BspNode3D> {
    polygons.retain(|p| p.is_valid() && !p.is_open());
    let index = selector.select(&polygons)?;

    let splitter = polygons.remove(index);
    let plane = *splitter.plane();
    let mut node = BspNode3D::new(plane);
    node.add_coplanar(splitter);

    let mut front_list = Vec::new();
    let mut back_list = Vec::new();
    for polygon in polygons {
        if node.is_coplanar(&polygon) {
            node.add_coplanar(polygon);
            continue;
        }
        match polygon.cut(&plane) {
            Ok(parts) if !parts.is_empty() => {
                front_list.extend(parts.front);
                back_list.extend(parts.back);
            }
            Ok(_) => {
                *valid = false;
                warn!(guid = %polygon.guid(), "face vanished while splitting");
            }
            Err(err) => {
                *valid = false;
                warn!(guid = %polygon.guid(), %err, "face could not be split");
            }
        }
    }

    node.set_front(build_node(front_list, selector, valid));
    node.set_back(build_node(back_list, selector, valid));
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp3d::test_solids::cube;
    use crate::polygon::test_shapes::{area, rect};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn empty_tree() {
        let tree = BspTree3D::new();
        assert!(tree.is_empty());
        assert!(tree.is_valid());
        assert_eq!(tree.polygon_count(), 0);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.classify_point(&Point3::origin()), PointClassification::Outside);

        let square = rect(0.0, 0.0, 1.0, 1.0);
        let parts = tree.partitions(&square).unwrap();
        assert_eq!(parts.positive.len(), 1);
    }

    #[test]
    fn cube_is_a_chain_of_back_nodes() {
        let tree = BspTree3D::from_polygons(cube([0.0; 3], 2.0));
        assert!(tree.is_valid());
        assert_eq!(tree.polygon_count(), 6);
        assert_eq!(tree.depth(), 6);
        assert_eq!(tree.collect_polygons().len(), 6);
    }

    #[test]
    fn point_classification() {
        let tree = BspTree3D::from_polygons(cube([0.0; 3], 2.0));
        assert!(tree.is_inside(&Point3::new(1.0, 1.0, 1.0)));
        assert_eq!(tree.classify_point(&Point3::new(3.0, 1.0, 1.0)), PointClassification::Outside);
        assert_eq!(tree.classify_point(&Point3::new(1.0, 1.0, 2.0)), PointClassification::Border);
        assert_eq!(tree.classify_point(&Point3::new(-1.0, 1.0, 2.0)), PointClassification::Outside);
    }

    #[test]
    fn crossing_polygon_is_split_into_inside_and_outside() {
        let tree = BspTree3D::from_polygons(cube([0.0; 3], 2.0));
        let mut slab = rect(-1.0, -1.0, 1.0, 1.0);
        slab.translate(&Vector3::new(0.0, 0.0, 1.0));

        let parts = tree.partitions(&slab).unwrap();
        assert_relative_eq!(area(&parts.positive), 3.0, epsilon = 1e-9);
        assert_relative_eq!(area(&parts.negative), 1.0, epsilon = 1e-9);
        assert!(parts.co_same.is_empty() && parts.co_diff.is_empty());
    }

    #[test]
    fn faces_on_the_surface_are_coincident() {
        let tree = BspTree3D::from_polygons(cube([0.0; 3], 2.0));
        let mut patch = rect(0.5, 0.5, 1.5, 1.5);
        patch.translate(&Vector3::new(0.0, 0.0, 2.0));

        let parts = tree.partitions(&patch).unwrap();
        assert_relative_eq!(area(&parts.co_same), 1.0, epsilon = 1e-9);
        assert!(parts.positive.is_empty() && parts.negative.is_empty());

        let parts = tree.partitions(&patch.flipped()).unwrap();
        assert_relative_eq!(area(&parts.co_diff), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn whole_face_and_its_flipped_twin() {
        let faces = cube([0.0; 3], 2.0);
        let top = faces[1].clone();
        let tree = BspTree3D::from_polygons(faces);

        let parts = tree.partitions(&top).unwrap();
        assert_eq!(parts.co_same.len(), 1);
        assert_relative_eq!(area(&parts.co_same), 4.0, epsilon = 1e-9);
        assert!(parts.positive.is_empty() && parts.co_diff.is_empty());

        let parts = tree.partitions(&top.flipped()).unwrap();
        assert_eq!(parts.co_diff.len(), 1);
        assert_relative_eq!(area(&parts.co_diff), 4.0, epsilon = 1e-9);
        assert!(parts.positive.is_empty() && parts.negative.is_empty() && parts.co_same.is_empty());
    }

    #[test]
    fn coplanar_overhang_continues_outside() {
        let tree = BspTree3D::from_polygons(cube([0.0; 3], 2.0));
        let mut patch = rect(1.0, 0.0, 3.0, 2.0);
        patch.translate(&Vector3::new(0.0, 0.0, 2.0));

        let parts = tree.partitions(&patch).unwrap();
        assert_relative_eq!(area(&parts.co_same), 2.0, epsilon = 1e-9);
        assert_relative_eq!(area(&parts.positive), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn invalid_polygon_is_rejected() {
        let tree = BspTree3D::from_polygons(cube([0.0; 3], 1.0));
        let empty = Polygon::empty(*rect(0.0, 0.0, 1.0, 1.0).plane());
        assert_eq!(tree.partitions(&empty).unwrap_err(), CsgError::InvalidPolygon);
    }
}
