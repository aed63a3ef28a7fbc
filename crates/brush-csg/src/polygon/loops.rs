//! Loop recovery from the edge soup.

use std::collections::HashMap;
use std::f64::consts::TAU;

use nalgebra::{Point2, Vector2};
use tracing::warn;

use crate::error::{CsgError, Result};
use crate::tolerance::{LOOP_ITERATION_LIMIT, Real};
use crate::vertex::{IndexEdge, Vertex, add_vertex};

use super::Polygon;

/// Which loops [`Polygon::separated_polygons`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparationMode {
    /// Outer loops only.
    OuterHull,
    /// Hole loops only, each as its own polygon.
    InnerHull,
    /// Outer loops with their holes attached.
    Together,
}

/// Counter-clockwise rotation from `from` to `to`, in `(0, TAU]`.
fn ccw_rotation(from: Vector2<Real>, to: Vector2<Real>) -> Real {
    let angle = from.perp(&to).atan2(from.dot(&to));
    if angle <= 0.0 { angle + TAU } else { angle }
}

/// Picks the continuation of `edge` among `candidates` leaving its head.
///
/// The candidate with the smallest counter-clockwise rotation from the
/// direction back along `edge` wins, which is the sharpest right turn. A
/// candidate doubling straight back is never chosen.
pub fn choose_next_edge(points: &[Point2<Real>], edge: IndexEdge, candidates: &[IndexEdge]) -> Option<IndexEdge> {
    let a = points[edge.tail()];
    let b = points[edge.head()];
    candidates
        .iter()
        .filter(|c| c.head() != edge.tail())
        .map(|c| (ccw_rotation(a - b, points[c.head()] - b), *c))
        .min_by(|x, y| x.0.total_cmp(&y.0))
        .map(|(_, c)| c)
}

/// Picks the predecessor of `edge` among `candidates` entering its tail.
///
/// Mirror image of [`choose_next_edge`]: the smallest clockwise rotation
/// from the direction of `edge` wins.
pub fn choose_prev_edge(points: &[Point2<Real>], edge: IndexEdge, candidates: &[IndexEdge]) -> Option<IndexEdge> {
    let a = points[edge.tail()];
    let b = points[edge.head()];
    candidates
        .iter()
        .filter(|c| c.tail() != edge.head())
        .map(|c| (ccw_rotation(points[c.tail()] - a, b - a), *c))
        .min_by(|x, y| x.0.total_cmp(&y.0))
        .map(|(_, c)| c)
}

/// Outgoing and incoming edge lists per vertex index.
pub(crate) struct Adjacency {
    outgoing: HashMap<usize, Vec<usize>>,
    incoming: HashMap<usize, Vec<usize>>,
}

impl Adjacency {
    pub(crate) fn new(edges: &[IndexEdge]) -> Self {
        let mut outgoing: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut incoming: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, e) in edges.iter().enumerate() {
            outgoing.entry(e.tail()).or_default().push(i);
            incoming.entry(e.head()).or_default().push(i);
        }
        Self { outgoing, incoming }
    }

    pub(crate) fn outgoing(&self, vertex: usize) -> &[usize] {
        self.outgoing.get(&vertex).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn incoming(&self, vertex: usize) -> &[usize] {
        self.incoming.get(&vertex).map_or(&[], Vec::as_slice)
    }

    /// Index of the edge following `edges[index]`.
    pub(crate) fn next(&self, points: &[Point2<Real>], edges: &[IndexEdge], index: usize) -> Option<usize> {
        let edge = edges[index];
        let candidates: Vec<IndexEdge> = self
            .outgoing(edge.head())
            .iter()
            .map(|&i| edges[i])
            .filter(|c| *c != edge.reversed())
            .collect();
        let chosen = match candidates.as_slice() {
            [] => return None,
            [only] => *only,
            _ => choose_next_edge(points, edge, &candidates)?,
        };
        self.outgoing(edge.head()).iter().copied().find(|&i| edges[i] == chosen)
    }

    /// Index of the edge preceding `edges[index]`.
    pub(crate) fn prev(&self, points: &[Point2<Real>], edges: &[IndexEdge], index: usize) -> Option<usize> {
        let edge = edges[index];
        let candidates: Vec<IndexEdge> = self
            .incoming(edge.tail())
            .iter()
            .map(|&i| edges[i])
            .filter(|c| *c != edge.reversed())
            .collect();
        let chosen = match candidates.as_slice() {
            [] => return None,
            [only] => *only,
            _ => choose_prev_edge(points, edge, &candidates)?,
        };
        self.incoming(edge.tail()).iter().copied().find(|&i| edges[i] == chosen)
    }
}

/// Walks the edge soup into closed loops of edge indices.
///
/// Walks start on unambiguous edges first so that a pinch vertex is entered
/// from a known side. Walks that dead-end or run into another loop are
/// dropped.
pub(crate) fn find_loops(points: &[Point2<Real>], edges: &[IndexEdge]) -> Result<Vec<Vec<usize>>> {
    let adjacency = Adjacency::new(edges);
    let mut handled = vec![false; edges.len()];
    let mut loops = Vec::new();

    let ambiguous = |i: usize| {
        adjacency.outgoing(edges[i].tail()).len() > 1 || adjacency.incoming(edges[i].head()).len() > 1
    };

    for pass in 0..2 {
        for start in 0..edges.len() {
            if handled[start] || (pass == 0 && ambiguous(start)) {
                continue;
            }

            let mut piece = vec![start];
            let mut current = start;
            let mut closed = false;
            for _ in 0..LOOP_ITERATION_LIMIT {
                let Some(next) = adjacency.next(points, edges, current) else {
                    break;
                };
                if next == start {
                    closed = true;
                    break;
                }
                if handled[next] || piece.contains(&next) {
                    break;
                }
                piece.push(next);
                current = next;
            }
            if !closed && piece.len() >= LOOP_ITERATION_LIMIT {
                return Err(CsgError::IterationLimit {
                    limit: LOOP_ITERATION_LIMIT,
                });
            }

            for &i in &piece {
                handled[i] = true;
            }
            if closed {
                loops.push(piece);
            }
        }
    }

    Ok(loops)
}

/// Twice the signed area enclosed by a loop of edge indices.
fn loop_area(points: &[Point2<Real>], edges: &[IndexEdge], indices: &[usize]) -> Real {
    indices
        .iter()
        .map(|&i| {
            let a = points[edges[i].tail()];
            let b = points[edges[i].head()];
            a.x * b.y - a.y * b.x
        })
        .sum()
}

impl Polygon {
    /// Whether some edge lacks a predecessor or a successor.
    pub fn is_open(&self) -> bool {
        if self.edges.is_empty() {
            return false;
        }
        let points = self.points_2d();
        let adjacency = Adjacency::new(&self.edges);
        (0..self.edges.len()).any(|i| {
            adjacency.next(&points, &self.edges, i).is_none() || adjacency.prev(&points, &self.edges, i).is_none()
        })
    }

    /// Indices of the edges before and after `edges[index]`.
    pub fn adjacent_edges(&self, index: usize) -> (Option<usize>, Option<usize>) {
        let points = self.points_2d();
        let adjacency = Adjacency::new(&self.edges);
        (
            adjacency.prev(&points, &self.edges, index),
            adjacency.next(&points, &self.edges, index),
        )
    }

    /// Edge indices whose tail or head is `vertex`.
    pub fn query_edges_containing_vertex(&self, vertex: usize) -> Vec<usize> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.tail() == vertex || e.head() == vertex)
            .map(|(i, _)| i)
            .collect()
    }

    /// Closed loops as lists of edge indices, in walk order.
    pub fn find_loops(&self) -> Result<Vec<Vec<usize>>> {
        find_loops(&self.points_2d(), &self.edges)
    }

    /// Vertices in traversal order.
    ///
    /// Closed polygons yield the first loop. Open polygons yield the chain
    /// starting from a vertex with no incoming edge.
    pub fn linked_vertices(&self) -> Result<Vec<Vertex>> {
        if self.edges.is_empty() {
            return Ok(Vec::new());
        }

        if !self.is_open() {
            let loops = self.find_loops()?;
            let first = loops.first().ok_or(CsgError::UnclosedLoop)?;
            return Ok(first.iter().map(|&i| self.vertices[self.edges[i].tail()]).collect());
        }

        let points = self.points_2d();
        let adjacency = Adjacency::new(&self.edges);
        let start = (0..self.edges.len())
            .find(|&i| adjacency.prev(&points, &self.edges, i).is_none())
            .unwrap_or(0);

        let mut chain = vec![self.vertices[self.edges[start].tail()]];
        let mut visited = vec![false; self.edges.len()];
        let mut current = start;
        for _ in 0..LOOP_ITERATION_LIMIT {
            visited[current] = true;
            chain.push(self.vertices[self.edges[current].head()]);
            match adjacency.next(&points, &self.edges, current) {
                Some(next) if !visited[next] => current = next,
                _ => return Ok(chain),
            }
        }
        Err(CsgError::IterationLimit {
            limit: LOOP_ITERATION_LIMIT,
        })
    }

    /// Splits the polygon into one polygon per loop.
    pub fn separated_polygons(&self, mode: SeparationMode) -> Result<Vec<Polygon>> {
        let points = self.points_2d();
        let loops = find_loops(&points, &self.edges)?;

        let mut outers = Vec::new();
        let mut inners = Vec::new();
        for indices in loops {
            if indices.len() < 3 {
                continue;
            }
            let polygon = self.polygon_from_loop(&indices);
            if loop_area(&points, &self.edges, &indices) > 0.0 {
                outers.push(polygon);
            } else {
                inners.push(polygon);
            }
        }

        match mode {
            SeparationMode::OuterHull => Ok(outers),
            SeparationMode::InnerHull => Ok(inners),
            SeparationMode::Together => {
                for hole in inners {
                    match outers.iter_mut().find(|outer| outer.include_all_edges(&hole)) {
                        Some(outer) => outer.attach(&hole),
                        None => warn!(edges = hole.edge_count(), "dropping hole with no enclosing loop"),
                    }
                }
                Ok(outers)
            }
        }
    }

    fn polygon_from_loop(&self, indices: &[usize]) -> Polygon {
        let mut vertices = Vec::with_capacity(indices.len());
        let mut edges = Vec::with_capacity(indices.len());
        for &i in indices {
            let e = self.edges[i];
            let tail = add_vertex(&mut vertices, self.vertices[e.tail()]);
            let head = add_vertex(&mut vertices, self.vertices[e.head()]);
            edges.push(IndexEdge(tail, head));
        }
        self.with_geometry(vertices, edges)
    }

    /// Appends another polygon's geometry, typically a hole.
    pub fn attach(&mut self, other: &Polygon) {
        let base = self.vertices.len();
        self.vertices.extend_from_slice(&other.vertices);
        self.edges
            .extend(other.edges.iter().map(|e| IndexEdge(e.0 + base, e.1 + base)));
        self.invalidate_caches();
    }

    /// Whether the polygon carries bridge edges: a pair running both ways
    /// between the same two vertices.
    pub fn has_bridge_edges(&self) -> bool {
        self.edges.iter().any(|e| self.edges.contains(&e.reversed()))
    }

    /// A copy with every bridge edge pair removed.
    pub fn without_bridge_edges(&self) -> Polygon {
        let edges: Vec<IndexEdge> = self
            .edges
            .iter()
            .copied()
            .filter(|e| !self.edges.contains(&e.reversed()))
            .collect();
        let mut polygon = self.clone_preserving_guid();
        polygon.reset(self.vertices.clone(), edges);
        polygon
    }

    /// Whether the edge from `a` to `b` is a real boundary edge and not
    /// half of a bridge.
    pub fn is_edge_on_crust(&self, a: usize, b: usize) -> bool {
        let edge = IndexEdge(a, b);
        self.edges.contains(&edge) && !self.edges.contains(&edge.reversed())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_shapes::*;
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn pts(raw: &[[Real; 2]]) -> Vec<Point2<Real>> {
        raw.iter().map(|p| Point2::new(p[0], p[1])).collect()
    }

    #[test]
    fn next_edge_prefers_sharpest_right_turn() {
        // Arriving at (1, 1) heading north; east is a right turn, west a left turn.
        let points = pts(&[[1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [2.0, 1.0]]);
        let edge = IndexEdge(0, 1);
        let candidates = [IndexEdge(1, 2), IndexEdge(1, 3)];
        assert_eq!(choose_next_edge(&points, edge, &candidates), Some(IndexEdge(1, 3)));
    }

    #[test]
    fn next_edge_never_doubles_back() {
        let points = pts(&[[0.0, 0.0], [1.0, 0.0]]);
        assert_eq!(choose_next_edge(&points, IndexEdge(0, 1), &[IndexEdge(1, 0)]), None);
    }

    #[test]
    fn prev_edge_mirrors_next_edge() {
        // Leaving (1, 1) heading north; the predecessor from the east arrives with a right turn.
        let points = pts(&[[1.0, 1.0], [1.0, 2.0], [0.0, 1.0], [2.0, 1.0]]);
        let edge = IndexEdge(0, 1);
        let candidates = [IndexEdge(2, 0), IndexEdge(3, 0)];
        assert_eq!(choose_prev_edge(&points, edge, &candidates), Some(IndexEdge(3, 0)));
    }

    #[test]
    fn square_has_one_loop() {
        let square = make_square(0.0, 0.0, 1.0);
        let loops = square.find_loops().unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 4);
        assert_eq!(square.adjacent_edges(0), (Some(3), Some(1)));
    }

    #[test]
    fn open_polyline_is_detected_and_linked() {
        let plane = make_square(0.0, 0.0, 1.0).plane().to_owned();
        let line = Polygon::from_parts(
            vec![
                Vertex::new(Point3::new(0.0, 0.0, 0.0)),
                Vertex::new(Point3::new(1.0, 0.0, 0.0)),
                Vertex::new(Point3::new(1.0, 1.0, 0.0)),
            ],
            vec![IndexEdge(1, 2), IndexEdge(0, 1)],
            plane,
        );
        assert!(line.is_open());
        let chain = line.linked_vertices().unwrap();
        assert_eq!(chain.len(), 3);
        assert_relative_eq!(chain[0].pos, Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(chain[2].pos, Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn separation_modes_split_outer_and_holes() {
        let shape = square_with_hole(4.0, 2.0);
        assert_eq!(shape.find_loops().unwrap().len(), 2);

        let outer = shape.separated_polygons(SeparationMode::OuterHull).unwrap();
        assert_eq!(outer.len(), 1);
        assert_relative_eq!(outer[0].signed_area(), 16.0, epsilon = 1e-9);

        let inner = shape.separated_polygons(SeparationMode::InnerHull).unwrap();
        assert_eq!(inner.len(), 1);
        assert_relative_eq!(inner[0].signed_area(), -4.0, epsilon = 1e-9);

        let together = shape.separated_polygons(SeparationMode::Together).unwrap();
        assert_eq!(together.len(), 1);
        assert_eq!(together[0].edge_count(), 8);
    }

    #[test]
    fn pinched_squares_form_one_loop() {
        // Two squares sharing the corner (1, 1).
        let plane = make_square(0.0, 0.0, 1.0).plane().to_owned();
        let raw = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 2.0]];
        let vertices = raw.iter().map(|p| Vertex::new(Point3::new(p[0], p[1], 0.0))).collect();
        let edges = vec![
            IndexEdge(0, 1),
            IndexEdge(1, 2),
            IndexEdge(2, 3),
            IndexEdge(3, 0),
            IndexEdge(2, 4),
            IndexEdge(4, 5),
            IndexEdge(5, 6),
            IndexEdge(6, 2),
        ];
        let pinched = Polygon::from_parts(vertices, edges, plane);
        let loops = pinched.find_loops().unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 8);
    }

    #[test]
    fn bridge_edges_are_removed() {
        let mut square = make_square(0.0, 0.0, 1.0);
        let mut edges = square.edges().to_vec();
        edges.push(IndexEdge(0, 2));
        edges.push(IndexEdge(2, 0));
        square.reset(square.vertices().to_vec(), edges);

        assert!(square.has_bridge_edges());
        assert!(!square.is_edge_on_crust(0, 2));
        assert!(square.is_edge_on_crust(0, 1));
        let cleaned = square.without_bridge_edges();
        assert!(!cleaned.has_bridge_edges());
        assert_eq!(cleaned.edge_count(), 4);
        assert_eq!(cleaned.guid(), square.guid());
    }

    #[test]
    fn edges_containing_vertex() {
        let square = make_square(0.0, 0.0, 1.0);
        assert_eq!(square.query_edges_containing_vertex(0), vec![0, 3]);
    }
}
