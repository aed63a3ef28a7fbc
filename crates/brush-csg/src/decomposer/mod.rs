//! Triangle and convex decomposition of polygons with holes.
//!
//! Convex single-loop polygons are fanned. Everything else goes through a
//! y-monotone decomposition (a sweep over the vertices sorted by y, then x)
//! whose pieces are triangulated with the usual stack walk. Convex pieces
//! are obtained by merging triangles back together across diagonals for as
//! long as the result stays convex.

mod convex;
mod monotone;
mod triangulate;

use std::collections::HashSet;

use nalgebra::{Point2, Point3};
use tracing::{debug, instrument};

use crate::error::{CsgError, Result};
use crate::polygon::Polygon;
use crate::tolerance::{self, LOOP_ITERATION_LIMIT, Real};

/// Triangles over a shared position array.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangulation {
    pub positions: Vec<Point3<Real>>,
    /// Counter-clockwise around the source polygon's normal.
    pub triangles: Vec<[usize; 3]>,
    pub material_id: u32,
}

impl Triangulation {
    pub fn triangle_area(&self, triangle: &[usize; 3]) -> Real {
        let [a, b, c] = triangle.map(|i| self.positions[i]);
        (b - a).cross(&(c - a)).norm() * 0.5
    }

    pub fn area(&self) -> Real {
        self.triangles.iter().map(|t| self.triangle_area(t)).sum()
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// One convex loop, counter-clockwise around the source polygon's normal.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexPiece {
    pub positions: Vec<Point3<Real>>,
}

/// Splits polygons into triangles or convex pieces.
#[derive(Debug, Clone, Copy)]
pub struct PolygonDecomposer {
    iteration_limit: usize,
}

impl Default for PolygonDecomposer {
    fn default() -> Self {
        Self::new()
    }
}

impl PolygonDecomposer {
    pub fn new() -> Self {
        Self {
            iteration_limit: LOOP_ITERATION_LIMIT,
        }
    }

    /// Caps the face walks of the monotone stage and the merge passes.
    pub fn with_iteration_limit(mut self, limit: usize) -> Self {
        self.iteration_limit = limit;
        self
    }

    /// Triangulates a closed polygon, holes included.
    ///
    /// A polygon with `n` usable vertices and `h` holes yields `n + 2h - 2`
    /// triangles, none of them degenerate.
    #[instrument(skip_all, fields(edges = polygon.edge_count()))]
    pub fn triangulate(&self, polygon: &Polygon) -> Result<Triangulation> {
        let outline = Outline::new(polygon)?;
        let triangles = self.triangles_of(&outline)?;
        debug!(triangles = triangles.len(), "triangulated");
        Ok(Triangulation {
            positions: outline.positions,
            triangles,
            material_id: polygon.material_id(),
        })
    }

    /// Covers a closed polygon with convex pieces.
    #[instrument(skip_all, fields(edges = polygon.edge_count()))]
    pub fn decompose_convex(&self, polygon: &Polygon) -> Result<Vec<ConvexPiece>> {
        let outline = Outline::new(polygon)?;
        let loops = if outline.is_convex() {
            vec![(0..outline.points.len()).collect()]
        } else {
            let triangles = self.triangles_of(&outline)?;
            convex::merge_triangles(&outline.points, &triangles, self.iteration_limit)?
        };

        let pieces: Vec<ConvexPiece> = loops
            .into_iter()
            .map(|indices| ConvexPiece {
                positions: indices.into_iter().map(|i| outline.positions[i]).collect(),
            })
            .collect();
        debug!(pieces = pieces.len(), "decomposed into convex pieces");
        Ok(pieces)
    }

    fn triangles_of(&self, outline: &Outline) -> Result<Vec<[usize; 3]>> {
        let mut triangles = Vec::new();
        match outline.fan_start() {
            Some(start) => {
                let n = outline.points.len();
                for k in 1..n - 1 {
                    push_triangle(&outline.points, &mut triangles, [start, (start + k) % n, (start + k + 1) % n]);
                }
            }
            None => {
                for piece in monotone::monotone_pieces(outline, self.iteration_limit)? {
                    triangulate::triangulate_monotone(&outline.points, &piece, &mut triangles);
                }
            }
        }

        let mut seen = HashSet::new();
        triangles.retain(|t| {
            let mut key = *t;
            key.sort_unstable();
            seen.insert(key)
        });
        if triangles.is_empty() {
            return Err(CsgError::Decomposition {
                reason: "no triangle with positive area",
            });
        }
        Ok(triangles)
    }
}

/// Twice the signed area of the triangle `a b c`.
pub(crate) fn turn(a: &Point2<Real>, b: &Point2<Real>, c: &Point2<Real>) -> Real {
    (b - a).perp(&(c - b))
}

/// Adds a triangle wound counter-clockwise, skipping slivers.
pub(crate) fn push_triangle(points: &[Point2<Real>], out: &mut Vec<[usize; 3]>, [a, b, c]: [usize; 3]) {
    let eps = tolerance::epsilon();
    let doubled = turn(&points[a], &points[b], &points[c]);
    if doubled > eps * eps {
        out.push([a, b, c]);
    } else if doubled < -eps * eps {
        out.push([a, c, b]);
    }
}

/// The cleaned boundary of a polygon, one slot per loop corner.
///
/// A position shared by two loops gets one slot per loop, so every slot
/// has exactly one predecessor and one successor.
#[derive(Debug)]
pub(crate) struct Outline {
    pub points: Vec<Point2<Real>>,
    pub positions: Vec<Point3<Real>>,
    pub next: Vec<usize>,
    pub prev: Vec<usize>,
    pub loop_count: usize,
}

impl Outline {
    fn new(polygon: &Polygon) -> Result<Self> {
        if !polygon.is_valid() || polygon.is_open() {
            return Err(CsgError::Decomposition {
                reason: "polygon is not a closed region",
            });
        }
        let points = polygon.points_2d();
        let edges = polygon.edges();

        let mut outline = Outline {
            points: Vec::new(),
            positions: Vec::new(),
            next: Vec::new(),
            prev: Vec::new(),
            loop_count: 0,
        };
        for indices in polygon.find_loops()? {
            let corners = clean_loop(indices.iter().map(|&i| edges[i].tail()).collect(), &points);
            let m = corners.len();
            if m < 3 {
                continue;
            }
            let base = outline.points.len();
            for (k, &v) in corners.iter().enumerate() {
                outline.points.push(points[v]);
                outline.positions.push(polygon.position(v));
                outline.next.push(base + (k + 1) % m);
                outline.prev.push(base + (k + m - 1) % m);
            }
            outline.loop_count += 1;
        }

        if outline.points.len() < 3 {
            return Err(CsgError::Decomposition {
                reason: "fewer than three usable vertices",
            });
        }
        if outline.signed_area() <= 0.0 {
            return Err(CsgError::Decomposition {
                reason: "no counter-clockwise outer loop",
            });
        }
        Ok(outline)
    }

    fn signed_area(&self) -> Real {
        (0..self.points.len())
            .map(|v| self.points[v].coords.perp(&self.points[self.next[v]].coords))
            .sum::<Real>()
            * 0.5
    }

    fn corner_turn(&self, v: usize) -> Real {
        turn(&self.points[self.prev[v]], &self.points[v], &self.points[self.next[v]])
    }

    /// A single loop turning left at every corner.
    fn is_convex(&self) -> bool {
        self.loop_count == 1 && (0..self.points.len()).all(|v| self.corner_turn(v) > 0.0)
    }

    /// First corner whose fan covers a convex loop with positive triangles.
    fn fan_start(&self) -> Option<usize> {
        if !self.is_convex() {
            return None;
        }
        let n = self.points.len();
        let eps = tolerance::epsilon();
        (0..n).find(|&s| {
            (1..n - 1).all(|k| {
                turn(&self.points[s], &self.points[(s + k) % n], &self.points[(s + k + 1) % n]) > eps * eps
            })
        })
    }
}

/// Drops repeated corners, straight corners and spikes.
fn clean_loop(mut corners: Vec<usize>, points: &[Point2<Real>]) -> Vec<usize> {
    let eps = tolerance::epsilon();
    let mut i = 0;
    let mut stable = 0;
    while corners.len() >= 3 && stable < corners.len() {
        let n = corners.len();
        let p = points[corners[(i + n - 1) % n]];
        let v = points[corners[i]];
        let q = points[corners[(i + 1) % n]];
        let (a, b) = (v - p, q - v);
        let redundant = tolerance::points2_equivalent(&p, &v) || a.perp(&b).abs() <= eps * a.norm() * b.norm();
        if redundant {
            corners.remove(i);
            stable = 0;
            if i >= corners.len() {
                i = 0;
            }
        } else {
            stable += 1;
            i = (i + 1) % n;
        }
    }
    corners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::test_shapes::*;
    use approx::assert_relative_eq;

    fn l_shape() -> Polygon {
        Polygon::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ])
        .unwrap()
    }

    fn assert_ccw(mesh: &Triangulation, polygon: &Polygon) {
        let normal = polygon.plane().normal();
        for t in &mesh.triangles {
            let [a, b, c] = t.map(|i| mesh.positions[i]);
            assert!((b - a).cross(&(c - a)).dot(&normal) > 0.0, "triangle {t:?} is not counter-clockwise");
        }
    }

    #[test]
    fn square_is_fanned() {
        let square = make_square(0.0, 0.0, 1.0);
        let mesh = PolygonDecomposer::new().triangulate(&square).unwrap();
        assert_eq!(mesh.len(), 2);
        assert_relative_eq!(mesh.area(), 1.0, epsilon = 1e-9);
        assert_ccw(&mesh, &square);
    }

    #[test]
    fn straight_corners_are_ignored() {
        let with_midpoint = Polygon::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ])
        .unwrap();
        let mesh = PolygonDecomposer::new().triangulate(&with_midpoint).unwrap();
        assert_eq!(mesh.len(), 2);
        assert_relative_eq!(mesh.area(), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn concave_polygon() {
        let shape = l_shape();
        let mesh = PolygonDecomposer::new().triangulate(&shape).unwrap();
        assert_eq!(mesh.len(), 4);
        assert_relative_eq!(mesh.area(), 3.0, epsilon = 1e-9);
        assert_ccw(&mesh, &shape);
    }

    #[test]
    fn square_with_hole_triangle_count_and_area() {
        let ring = square_with_hole(4.0, 2.0);
        let mesh = PolygonDecomposer::new().triangulate(&ring).unwrap();
        // 8 corners and one hole
        assert_eq!(mesh.len(), 8);
        assert_relative_eq!(mesh.area(), 16.0 - 4.0, epsilon = 1e-9);
        assert_ccw(&mesh, &ring);
        assert!(mesh.triangles.iter().all(|t| mesh.triangle_area(t) > 0.0));
    }

    #[test]
    fn tilted_polygon_keeps_its_positions() {
        let tilted = Polygon::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 2.0),
            Point3::new(2.0, 2.0, 2.0),
            Point3::new(0.0, 2.0, 0.0),
        ])
        .unwrap();
        let mesh = PolygonDecomposer::new().triangulate(&tilted).unwrap();
        assert_relative_eq!(mesh.area(), 2.0 * (8.0 as Real).sqrt(), epsilon = 1e-9);
        assert!(mesh.positions.contains(&Point3::new(2.0, 0.0, 2.0)));
        assert_ccw(&mesh, &tilted);
    }

    #[test]
    fn convex_input_is_one_piece() {
        let square = make_square(0.0, 0.0, 1.0);
        let pieces = PolygonDecomposer::new().decompose_convex(&square).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].positions.len(), 4);
    }

    #[test]
    fn concave_input_gives_convex_pieces() {
        let shape = l_shape();
        let pieces = PolygonDecomposer::new().decompose_convex(&shape).unwrap();
        assert!((2..=3).contains(&pieces.len()));
        for piece in &pieces {
            let polygon = Polygon::new(piece.positions.clone()).unwrap();
            assert!(polygon.is_ccw());
        }
        let total: Real = pieces
            .iter()
            .map(|p| Polygon::new(p.positions.clone()).unwrap().signed_area())
            .sum();
        assert_relative_eq!(total, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn ring_convex_pieces_cover_the_ring() {
        let ring = square_with_hole(4.0, 2.0);
        let pieces = PolygonDecomposer::new().decompose_convex(&ring).unwrap();
        assert!((4..=8).contains(&pieces.len()));
        let total: Real = pieces
            .iter()
            .map(|p| Polygon::new(p.positions.clone()).unwrap().signed_area())
            .sum();
        assert_relative_eq!(total, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_input_is_an_error() {
        let sliver = Polygon::with_plane(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            *make_square(0.0, 0.0, 1.0).plane(),
        );
        assert!(matches!(
            PolygonDecomposer::new().triangulate(&sliver),
            Err(CsgError::Decomposition { .. })
        ));
    }

    #[test]
    fn polygon_caches_its_triangulation() {
        let ring = square_with_hole(4.0, 2.0);
        assert_eq!(ring.triangulation().map(Triangulation::len), Some(8));
        assert!(ring.convexes().is_some());
        let center = ring.representative_position().unwrap();
        assert!(ring.include_point(&center));
    }
}
