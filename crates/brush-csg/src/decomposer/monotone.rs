//! Split a polygon with holes into y-monotone pieces.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::f64::consts::TAU;

use nalgebra::{Point2, Vector2};
use tracing::trace;

use crate::error::{CsgError, Result};
use crate::tolerance::{self, Real};

use super::Outline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VertexType {
    Start,
    End,
    Split,
    Merge,
    Regular,
}

/// Sweep order: higher y first, then lower x, then slot index.
pub(super) fn is_above(points: &[Point2<Real>], a: usize, b: usize) -> bool {
    let (pa, pb) = (points[a], points[b]);
    pa.y > pb.y || (pa.y == pb.y && (pa.x < pb.x || (pa.x == pb.x && a < b)))
}

pub(super) fn sweep_order(points: &[Point2<Real>]) -> impl Fn(&usize, &usize) -> Ordering + '_ {
    move |&a, &b| {
        if a == b {
            Ordering::Equal
        } else if is_above(points, a, b) {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}

fn vertex_type(outline: &Outline, v: usize) -> VertexType {
    let points = &outline.points;
    let prev_below = is_above(points, v, outline.prev[v]);
    let next_below = is_above(points, v, outline.next[v]);
    let convex = outline.corner_turn(v) > 0.0;
    match (prev_below, next_below, convex) {
        (true, true, true) => VertexType::Start,
        (true, true, false) => VertexType::Split,
        (false, false, true) => VertexType::End,
        (false, false, false) => VertexType::Merge,
        _ => VertexType::Regular,
    }
}

/// Sweep state. Edges are named by their tail slot.
struct Sweep<'a> {
    outline: &'a Outline,
    types: Vec<VertexType>,
    status: Vec<usize>,
    helper: Vec<Option<usize>>,
    diagonals: Vec<(usize, usize)>,
}

impl Sweep<'_> {
    fn insert(&mut self, edge: usize, helper: usize) {
        self.status.push(edge);
        self.helper[edge] = Some(helper);
    }

    fn remove(&mut self, edge: usize) {
        self.status.retain(|&e| e != edge);
    }

    fn connect_if_merge(&mut self, v: usize, edge: usize) {
        if let Some(h) = self.helper[edge] {
            if self.types[h] == VertexType::Merge {
                self.diagonals.push((v, h));
            }
        }
    }

    /// Where the edge crosses the horizontal line through `v`.
    fn x_at(&self, edge: usize, v: usize) -> Real {
        let points = &self.outline.points;
        let (a, b) = (points[edge], points[self.outline.next[edge]]);
        let p = points[v];
        if (a.y - b.y).abs() < Real::EPSILON {
            return p.x.clamp(a.x.min(b.x), a.x.max(b.x));
        }
        a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y)
    }

    /// The active edge closest to the left of `v`.
    fn left_of(&self, v: usize) -> Result<usize> {
        let x = self.outline.points[v].x + tolerance::epsilon();
        self.status
            .iter()
            .copied()
            .filter(|&e| e != v && self.outline.next[e] != v)
            .map(|e| (e, self.x_at(e, v)))
            .filter(|&(_, ex)| ex <= x)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(e, _)| e)
            .ok_or(CsgError::Decomposition {
                reason: "no edge directly left of vertex",
            })
    }

    fn helper_of(&self, edge: usize) -> Result<usize> {
        self.helper[edge].ok_or(CsgError::Decomposition {
            reason: "active edge without helper",
        })
    }

    fn handle(&mut self, v: usize) -> Result<()> {
        let prev = self.outline.prev[v];
        match self.types[v] {
            VertexType::Start => self.insert(v, v),
            VertexType::End => {
                self.connect_if_merge(v, prev);
                self.remove(prev);
            }
            VertexType::Split => {
                let left = self.left_of(v)?;
                let h = self.helper_of(left)?;
                self.diagonals.push((v, h));
                self.helper[left] = Some(v);
                self.insert(v, v);
            }
            VertexType::Merge => {
                self.connect_if_merge(v, prev);
                self.remove(prev);
                let left = self.left_of(v)?;
                self.connect_if_merge(v, left);
                self.helper[left] = Some(v);
            }
            VertexType::Regular => {
                if is_above(&self.outline.points, prev, v) {
                    // Interior lies to the right.
                    self.connect_if_merge(v, prev);
                    self.remove(prev);
                    self.insert(v, v);
                } else {
                    let left = self.left_of(v)?;
                    self.connect_if_merge(v, left);
                    self.helper[left] = Some(v);
                }
            }
        }
        Ok(())
    }
}

/// Counter-clockwise vertex loops, each monotone in y.
pub(super) fn monotone_pieces(outline: &Outline, limit: usize) -> Result<Vec<Vec<usize>>> {
    let n = outline.points.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(sweep_order(&outline.points));

    let mut sweep = Sweep {
        outline,
        types: (0..n).map(|v| vertex_type(outline, v)).collect(),
        status: Vec::new(),
        helper: vec![None; n],
        diagonals: Vec::new(),
    };
    for v in order {
        sweep.handle(v)?;
    }
    trace!(diagonals = sweep.diagonals.len(), "monotone sweep");

    trace_pieces(outline, &sweep.diagonals, limit)
}

/// Clockwise angle from `from` to `to` in `(0, 2π]`.
fn clockwise_angle(from: &Vector2<Real>, to: &Vector2<Real>) -> Real {
    let angle = (-from.perp(to)).atan2(from.dot(to));
    if angle <= 0.0 { angle + TAU } else { angle }
}

/// Walks the faces bounded by the outline plus the diagonals.
///
/// At each vertex the walk takes the outgoing edge with the smallest
/// clockwise turn from the way it came, which keeps the face on its left.
fn trace_pieces(outline: &Outline, diagonals: &[(usize, usize)], limit: usize) -> Result<Vec<Vec<usize>>> {
    let points = &outline.points;
    let n = points.len();
    let mut outgoing: Vec<Vec<usize>> = (0..n).map(|v| vec![outline.next[v]]).collect();
    for &(a, b) in diagonals {
        if a != b && !outgoing[a].contains(&b) {
            outgoing[a].push(b);
            outgoing[b].push(a);
        }
    }

    let choose = |from: usize, at: usize| -> Option<usize> {
        let back = points[from] - points[at];
        outgoing[at]
            .iter()
            .copied()
            .filter(|&c| c != from || outgoing[at].len() == 1)
            .map(|c| (c, clockwise_angle(&back, &(points[c] - points[at]))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, _)| c)
    };

    let mut used = HashSet::new();
    let mut pieces = Vec::new();
    for start in 0..n {
        for &first in &outgoing[start] {
            if used.contains(&(start, first)) {
                continue;
            }
            let mut piece = Vec::new();
            let (mut from, mut to) = (start, first);
            let mut closed = false;
            for _ in 0..limit {
                used.insert((from, to));
                piece.push(from);
                let next = choose(from, to).ok_or(CsgError::Decomposition {
                    reason: "monotone piece does not close",
                })?;
                (from, to) = (to, next);
                if (from, to) == (start, first) {
                    closed = true;
                    break;
                }
            }
            if !closed {
                return Err(CsgError::IterationLimit { limit });
            }
            pieces.push(piece);
        }
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::test_shapes::square_with_hole;
    use approx::assert_relative_eq;

    fn piece_area(outline: &Outline, piece: &[usize]) -> Real {
        let n = piece.len();
        (0..n)
            .map(|i| outline.points[piece[i]].coords.perp(&outline.points[piece[(i + 1) % n]].coords))
            .sum::<Real>()
            * 0.5
    }

    #[test]
    fn clockwise_angles() {
        let down = Vector2::new(0.0, -1.0);
        assert_relative_eq!(clockwise_angle(&down, &Vector2::new(-1.0, 0.0)), TAU / 4.0);
        assert_relative_eq!(clockwise_angle(&down, &Vector2::new(1.0, 0.0)), 3.0 * TAU / 4.0);
        assert_relative_eq!(clockwise_angle(&down, &down), TAU);
    }

    #[test]
    fn ring_splits_into_two_monotone_pieces() {
        let ring = square_with_hole(4.0, 2.0);
        let outline = Outline::new(&ring).unwrap();
        let pieces = monotone_pieces(&outline, 1000).unwrap();

        assert_eq!(pieces.len(), 2);
        assert!(pieces.iter().all(|p| p.len() == 6));
        let total: Real = pieces.iter().map(|p| piece_area(&outline, p)).sum();
        assert_relative_eq!(total, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn sweep_order_breaks_ties_by_x() {
        let points = vec![Point2::new(1.0, 0.0), Point2::new(0.0, 0.0), Point2::new(0.0, 1.0)];
        let mut order = vec![0, 1, 2];
        order.sort_by(sweep_order(&points));
        assert_eq!(order, vec![2, 1, 0]);
    }
}
