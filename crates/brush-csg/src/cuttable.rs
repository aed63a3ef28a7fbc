//! Splitting polygons by arbitrary planes.

use nalgebra::Point3;
use tracing::debug;

use crate::bsp2d::PointClassification;
use crate::edge::Edge3D;
use crate::error::{CsgError, Result};
use crate::plane::Plane3D;
use crate::polygon::{Polygon, SeparationMode, optimize};
use crate::tolerance::{self, Real};
use crate::vertex::{IndexEdge, Vertex, add_vertex};

/// Pieces of a polygon on either side of a cutting plane.
#[derive(Debug, Clone, Default)]
pub struct PlaneClipResult {
    pub front: Vec<Polygon>,
    pub back: Vec<Polygon>,
    /// Boundary edges rebuilt along the cut line, running the way the back
    /// pieces traverse them.
    pub cut_edges: Vec<Edge3D>,
}

impl PlaneClipResult {
    fn whole(polygon: &Polygon, front: bool) -> Self {
        let mut result = Self::default();
        if front {
            result.front.push(polygon.clone_preserving_guid());
        } else {
            result.back.push(polygon.clone_preserving_guid());
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.front.is_empty() && self.back.is_empty()
    }
}

/// Trait for geometry that can be cut by a plane.
pub trait Cuttable {
    /// Cuts the geometry by a plane.
    ///
    /// # Return values by position
    ///
    /// - **Front**: the whole geometry in `front`
    /// - **Back**: the whole geometry in `back`
    /// - **Coplanar**: `front` when it faces the same way as the plane, else `back`
    /// - **Spanning**: pieces on both sides, closed along the cut line
    fn cut(&self, plane: &Plane3D) -> Result<PlaneClipResult>;
}

impl Cuttable for Polygon {
    fn cut(&self, plane: &Plane3D) -> Result<PlaneClipResult> {
        if !self.is_valid() {
            return Err(CsgError::InvalidPolygon);
        }

        let eps = tolerance::epsilon();
        let distances: Vec<Real> = self
            .vertices()
            .iter()
            .map(|v| {
                let d = plane.signed_distance(&v.pos);
                if d.abs() < eps { 0.0 } else { d }
            })
            .collect();

        let has_front = distances.iter().any(|&d| d > 0.0);
        let has_back = distances.iter().any(|&d| d < 0.0);
        match (has_front, has_back) {
            (false, false) => return Ok(PlaneClipResult::whole(self, self.plane().is_same_facing(plane))),
            (true, false) => return Ok(PlaneClipResult::whole(self, true)),
            (false, true) => return Ok(PlaneClipResult::whole(self, false)),
            (true, true) => {}
        }

        if self.is_open() {
            Ok(split_open(self, &distances))
        } else {
            split_closed(self, plane, &distances)
        }
    }
}

impl Polygon {
    /// Splits the polygon by `plane`. See [`Cuttable::cut`].
    pub fn clip_by_plane(&self, plane: &Plane3D) -> Result<PlaneClipResult> {
        self.cut(plane)
    }
}

/// Vertices and edges of one side under construction.
#[derive(Default)]
struct Side {
    vertices: Vec<Vertex>,
    edges: Vec<IndexEdge>,
}

impl Side {
    fn push(&mut self, a: Point3<Real>, b: Point3<Real>) {
        let i = add_vertex(&mut self.vertices, Vertex::new(a));
        let j = add_vertex(&mut self.vertices, Vertex::new(b));
        let e = IndexEdge(i, j);
        if i != j && !self.edges.contains(&e) {
            self.edges.push(e);
        }
    }

    fn into_polygons(self, source: &Polygon) -> Result<Vec<Polygon>> {
        let Side {
            mut vertices,
            mut edges,
        } = self;
        if edges.len() < 3 {
            return Ok(Vec::new());
        }
        optimize(&mut vertices, &mut edges)?;
        let part = source.with_geometry(vertices, edges);
        if !part.is_valid() {
            return Ok(Vec::new());
        }
        part.separated_polygons(SeparationMode::Together)
    }
}

fn crossing(a: &Point3<Real>, b: &Point3<Real>, da: Real, db: Real) -> Point3<Real> {
    a + (b - a) * (da / (da - db))
}

fn split_open(polygon: &Polygon, distances: &[Real]) -> PlaneClipResult {
    let mut front = Side::default();
    let mut back = Side::default();

    for e in polygon.edges() {
        let (a, b) = (polygon.position(e.0), polygon.position(e.1));
        let (da, db) = (distances[e.0], distances[e.1]);
        if da >= 0.0 && db >= 0.0 {
            front.push(a, b);
        } else if da <= 0.0 && db <= 0.0 {
            back.push(a, b);
        } else {
            let p = crossing(&a, &b, da, db);
            if da > 0.0 {
                front.push(a, p);
                back.push(p, b);
            } else {
                back.push(a, p);
                front.push(p, b);
            }
        }
    }

    let mut result = PlaneClipResult::default();
    for (side, out) in [(front, &mut result.front), (back, &mut result.back)] {
        if !side.edges.is_empty() {
            out.push(polygon.with_geometry(side.vertices, side.edges));
        }
    }
    result
}

/// Splits a closed polygon and rebuilds its boundary along the cut line.
///
/// The cut line runs along `polygon normal × plane normal`. Boundary
/// stretches on it are added forward to the back side and backward to the
/// front side wherever the polygon's interior lies between two consecutive
/// cut points.
fn split_closed(polygon: &Polygon, plane: &Plane3D, distances: &[Real]) -> Result<PlaneClipResult> {
    let along = polygon
        .plane()
        .normal()
        .cross(&plane.normal())
        .try_normalize(Real::EPSILON)
        .ok_or(CsgError::ClipFailed)?;

    let mut front = Side::default();
    let mut back = Side::default();
    let mut cut_points: Vec<Point3<Real>> = Vec::new();

    for e in polygon.edges() {
        let (a, b) = (polygon.position(e.0), polygon.position(e.1));
        let (da, db) = (distances[e.0], distances[e.1]);

        if da == 0.0 && db == 0.0 {
            if (b - a).dot(&along) > 0.0 {
                back.push(a, b);
            } else {
                front.push(a, b);
            }
            cut_points.extend([a, b]);
        } else if da >= 0.0 && db >= 0.0 {
            front.push(a, b);
            cut_points.extend([(da == 0.0).then_some(a), (db == 0.0).then_some(b)].into_iter().flatten());
        } else if da <= 0.0 && db <= 0.0 {
            back.push(a, b);
            cut_points.extend([(da == 0.0).then_some(a), (db == 0.0).then_some(b)].into_iter().flatten());
        } else {
            let p = crossing(&a, &b, da, db);
            if da > 0.0 {
                front.push(a, p);
                back.push(p, b);
            } else {
                back.push(a, p);
                front.push(p, b);
            }
            cut_points.push(p);
        }
    }

    let origin = cut_points.first().copied().unwrap_or_else(Point3::origin);
    cut_points.sort_by(|p, q| (p - origin).dot(&along).total_cmp(&(q - origin).dot(&along)));
    cut_points.dedup_by(|p, q| tolerance::points_equivalent(p, q));

    let mut cut_edges = Vec::new();
    for pair in cut_points.windows(2) {
        let (p, q) = (pair[0], pair[1]);
        let mid = nalgebra::center(&p, &q);
        if polygon.classify_point(&mid) == PointClassification::Inside {
            back.push(p, q);
            front.push(q, p);
            cut_edges.push(Edge3D::new(p, q));
        }
    }

    let result = PlaneClipResult {
        front: front.into_polygons(polygon)?,
        back: back.into_polygons(polygon)?,
        cut_edges,
    };
    debug!(
        front = result.front.len(),
        back = result.back.len(),
        cut = result.cut_edges.len(),
        "clipped polygon by plane"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::test_shapes::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn x_plane(x: Real) -> Plane3D {
        Plane3D::new(Vector3::x(), x)
    }

    #[test]
    fn square_split_in_half() {
        let square = make_square(0.0, 0.0, 2.0);
        let parts = square.clip_by_plane(&x_plane(1.0)).unwrap();

        assert_eq!(parts.front.len(), 1);
        assert_eq!(parts.back.len(), 1);
        assert_relative_eq!(parts.front[0].signed_area(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(parts.back[0].signed_area(), 2.0, epsilon = 1e-9);
        assert_eq!(parts.cut_edges.len(), 1);
        assert_relative_eq!(parts.cut_edges[0].length(), 2.0, epsilon = 1e-9);

        let front_box = parts.front[0].bound_box().unwrap();
        assert_relative_eq!(front_box.min.x, 1.0, epsilon = 1e-9);
        assert!(parts.front[0].plane().is_equivalent(square.plane()));
    }

    #[test]
    fn ring_cut_through_its_hole() {
        let ring = square_with_hole(4.0, 2.0);
        let parts = ring.clip_by_plane(&x_plane(2.0)).unwrap();

        assert_eq!(parts.front.len(), 1);
        assert_eq!(parts.back.len(), 1);
        assert_relative_eq!(parts.front[0].signed_area(), 6.0, epsilon = 1e-9);
        assert_relative_eq!(parts.back[0].signed_area(), 6.0, epsilon = 1e-9);
        // Two stretches of the cut line lie in material, one crosses the hole.
        assert_eq!(parts.cut_edges.len(), 2);
    }

    #[test]
    fn cut_through_opposite_corners() {
        let square = make_square(0.0, 0.0, 2.0);
        let diagonal = Plane3D::new(Vector3::new(1.0, -1.0, 0.0), 0.0);
        let parts = square.clip_by_plane(&diagonal).unwrap();
        assert_eq!(parts.front.len(), 1);
        assert_eq!(parts.back.len(), 1);
        assert_eq!(parts.front[0].edge_count(), 3);
        assert_relative_eq!(parts.back[0].signed_area(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn one_sided_polygons_are_returned_whole() {
        let square = make_square(0.0, 0.0, 1.0);

        let parts = square.clip_by_plane(&x_plane(-1.0)).unwrap();
        assert_eq!(parts.front.len(), 1);
        assert!(parts.back.is_empty());
        assert_eq!(parts.front[0].guid(), square.guid());

        let parts = square.clip_by_plane(&x_plane(5.0)).unwrap();
        assert_eq!(parts.back.len(), 1);

        // Touching the plane along an edge still counts as one side.
        let parts = square.clip_by_plane(&x_plane(1.0)).unwrap();
        assert_eq!(parts.back.len(), 1);
        assert!(parts.front.is_empty());
    }

    #[test]
    fn coplanar_polygons_follow_their_facing() {
        let square = make_square(0.0, 0.0, 1.0);
        let floor = Plane3D::new(Vector3::z(), 0.0);
        assert_eq!(square.clip_by_plane(&floor).unwrap().front.len(), 1);
        assert_eq!(square.clip_by_plane(&floor.inverted()).unwrap().back.len(), 1);
    }

    #[test]
    fn open_polyline_is_split_without_closing() {
        let floor = Plane3D::new(Vector3::z(), 0.0);
        let line = Polygon::from_parts(
            vec![Vertex::new(Point3::new(0.0, 0.0, 0.0)), Vertex::new(Point3::new(2.0, 0.0, 0.0))],
            vec![IndexEdge(0, 1)],
            floor,
        );
        let parts = line.clip_by_plane(&x_plane(0.5)).unwrap();
        assert_eq!(parts.front.len(), 1);
        assert_eq!(parts.back.len(), 1);
        assert!(parts.cut_edges.is_empty());
        assert_relative_eq!(parts.back[0].edge_3d(0).length(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn invalid_polygon_is_an_error() {
        let floor = Plane3D::new(Vector3::z(), 0.0);
        let empty = Polygon::empty(floor);
        assert_eq!(empty.clip_by_plane(&x_plane(0.0)).unwrap_err(), CsgError::InvalidPolygon);
    }
}
