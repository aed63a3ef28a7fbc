//! Operations that move or reshape a polygon's own geometry.

use nalgebra::{Point2, Point3, Vector3};
use tracing::{debug, instrument};

use crate::bsp2d::IntersectionType;
use crate::edge::{Edge2D, EdgeIntersection, Line2D};
use crate::error::{CsgError, Result};
use crate::plane::Plane3D;
use crate::tolerance::{MIN_SCALE_FACTOR, Real};
use crate::vertex::{IndexEdge, Vertex, add_vertex};

use super::loops::{Adjacency, SeparationMode};
use super::optimize::optimize;
use super::Polygon;

impl Polygon {
    /// Offsets every edge outward by `factor`; negative values shrink.
    ///
    /// Corners are recomputed by intersecting the offset lines of adjacent
    /// edges. With `check_boundary`, the result is rejected when an edge
    /// flips direction, two non-adjacent edges meet, or a hole escapes the
    /// outer loop.
    #[instrument(skip_all, fields(factor = factor, edges = self.edge_count()))]
    pub fn scale(self, factor: Real, check_boundary: bool) -> Result<Polygon> {
        if factor.abs() < MIN_SCALE_FACTOR {
            return Ok(self);
        }
        if self.is_open() {
            return Err(CsgError::OpenPolygon);
        }
        if check_boundary {
            self.check_scaled_holes(factor)?;
        }

        let points = self.points_2d();
        let lines = self
            .edges
            .iter()
            .map(|e| Line2D::from_points(&points[e.0], &points[e.1]).map(|l| l.offset_by(factor)))
            .collect::<Option<Vec<_>>>()
            .ok_or(CsgError::DegenerateEdge)?;

        let adjacency = Adjacency::new(&self.edges);
        let mut moved = Vec::with_capacity(self.edges.len());
        for (i, e) in self.edges.iter().enumerate() {
            let prev = adjacency
                .prev(&points, &self.edges, i)
                .ok_or(CsgError::OpenPolygon)?;
            let next = adjacency
                .next(&points, &self.edges, i)
                .ok_or(CsgError::OpenPolygon)?;
            let shifted = |p: Point2<Real>| p + lines[i].normal() * factor;
            let start = lines[i]
                .intersect(&lines[prev])
                .unwrap_or_else(|| shifted(points[e.0]));
            let end = lines[i]
                .intersect(&lines[next])
                .unwrap_or_else(|| shifted(points[e.1]));
            moved.push(Edge2D::new(start, end));
        }

        if check_boundary {
            self.check_scaled_edges(&points, &moved)?;
        }

        let mut vertices = Vec::new();
        let mut edges = Vec::new();
        for edge in &moved {
            let a = add_vertex(&mut vertices, Vertex::new(self.plane.plane_to_world(&edge.v[0])));
            let b = add_vertex(&mut vertices, Vertex::new(self.plane.plane_to_world(&edge.v[1])));
            if a != b {
                edges.push(IndexEdge(a, b));
            }
        }
        optimize(&mut vertices, &mut edges)?;

        let mut scaled = self;
        scaled.reset(vertices, edges);
        scaled.update_uvs();
        if scaled.is_open() {
            return Err(CsgError::UnclosedLoop);
        }
        debug!(edges = scaled.edge_count(), "scaled");
        Ok(scaled)
    }

    fn check_scaled_edges(&self, before: &[Point2<Real>], after: &[Edge2D]) -> Result<()> {
        for (e, moved) in self.edges.iter().zip(after) {
            let original = before[e.1] - before[e.0];
            if original.dot(&moved.direction()) <= 0.0 {
                return Err(CsgError::SelfIntersection);
            }
        }

        for i in 0..after.len() {
            for j in (i + 1)..after.len() {
                let (a, b) = (self.edges[i], self.edges[j]);
                let adjacent = a.0 == b.0 || a.0 == b.1 || a.1 == b.0 || a.1 == b.1;
                if !adjacent && !matches!(after[i].intersect(&after[j]), EdgeIntersection::None) {
                    return Err(CsgError::SelfIntersection);
                }
            }
        }
        Ok(())
    }

    /// Scales the outer loop and each hole on their own and verifies the
    /// holes still sit inside the outer loop without touching each other.
    fn check_scaled_holes(&self, factor: Real) -> Result<()> {
        let outers = self.separated_polygons(SeparationMode::OuterHull)?;
        let inners = self.separated_polygons(SeparationMode::InnerHull)?;
        let [outer] = outers.as_slice() else {
            return Ok(());
        };
        if inners.is_empty() {
            return Ok(());
        }

        let outer = outer.clone().scale(factor, false)?;
        let holes = inners
            .into_iter()
            .map(|hole| hole.scale(factor, false).map(Polygon::reversed_loops))
            .collect::<Result<Vec<_>>>()?;

        for (i, hole) in holes.iter().enumerate() {
            if !outer.include_all_edges(hole) {
                return Err(CsgError::SelfIntersection);
            }
            for other in &holes[i + 1..] {
                if Polygon::intersection_type(hole, other) != IntersectionType::None {
                    return Err(CsgError::SelfIntersection);
                }
            }
        }
        Ok(())
    }

    /// Reverses every edge while keeping the plane.
    fn reversed_loops(mut self) -> Polygon {
        self.reverse_edges();
        self.invalidate_caches();
        self
    }

    /// Replaces the geometry with its 2D convex hull.
    pub fn make_convex(&mut self) {
        let points = self.points_2d();
        let hull = convex_hull(&points);
        if hull.len() < 3 {
            return;
        }
        let vertices: Vec<Vertex> = hull
            .iter()
            .map(|p| Vertex::new(self.plane.plane_to_world(p)))
            .collect();
        let n = vertices.len();
        let edges = (0..n).map(|i| IndexEdge(i, (i + 1) % n)).collect();
        self.reset(vertices, edges);
        self.update_uvs();
    }

    /// Reflects the polygon through `mirror` and toggles the mirrored flag.
    ///
    /// Edges are reversed so the loops keep turning counter-clockwise around
    /// the reflected plane.
    pub fn mirror(mut self, mirror: &Plane3D) -> Polygon {
        let reflect = |p: &Point3<Real>| p - mirror.normal() * (2.0 * mirror.signed_distance(p));
        for v in &mut self.vertices {
            v.pos = reflect(&v.pos);
        }

        let n = self.plane.normal();
        let reflected_normal = n - mirror.normal() * (2.0 * n.dot(&mirror.normal()));
        let anchor = reflect(&self.plane.project_point(&Point3::origin()));
        self.plane = Plane3D::from_point_and_normal(anchor, reflected_normal);

        self.reverse_edges();
        self.flags.mirrored = !self.flags.mirrored;
        self.invalidate_caches();
        self
    }

    /// Moves every vertex and the plane by `offset`.
    pub fn translate(&mut self, offset: &Vector3<Real>) {
        for v in &mut self.vertices {
            v.pos += *offset;
        }
        let anchor = self.plane.project_point(&Point3::origin()) + *offset;
        self.plane = Plane3D::from_point_and_normal(anchor, self.plane.normal());
        self.invalidate_caches();
    }
}

/// Andrew's monotone chain, counter-clockwise, without collinear points.
fn convex_hull(points: &[Point2<Real>]) -> Vec<Point2<Real>> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup_by(|a, b| crate::tolerance::points2_equivalent(a, b));
    if sorted.len() < 3 {
        return sorted;
    }

    let turn = |o: &Point2<Real>, a: &Point2<Real>, b: &Point2<Real>| (a - o).perp(&(b - o));
    let mut hull: Vec<Point2<Real>> = Vec::with_capacity(sorted.len() * 2);
    for pass in [sorted.clone(), sorted.iter().rev().copied().collect()] {
        let floor = hull.len();
        for p in pass {
            while hull.len() >= floor + 2 && turn(&hull[hull.len() - 2], &hull[hull.len() - 1], &p) <= 0.0 {
                hull.pop();
            }
            hull.push(p);
        }
        hull.pop();
    }
    hull
}
