//! 2D BSP tree node and its recursive queries.

use nalgebra::Point2;

use crate::edge::{Edge2D, Edge3D, EdgeIntersection, EdgeSubtraction, Line2D};
use crate::plane::Plane3D;
use crate::tolerance::{self, Real};

use super::{EdgePartitions, PointClassification};

/// A node of a [`BspTree2D`](super::BspTree2D).
///
/// The splitting line is taken from the first coincident edge. Edges lying
/// on the line are kept here; the positive child holds what lies outside
/// the line, the negative child what lies inside.
#[derive(Debug, Clone)]
pub struct BspNode2D {
    line: Line2D,

    /// Edges lying on the splitting line, in world space.
    coincident: Vec<Edge3D>,

    /// Subtree on the positive side of the line.
    positive: Option<Box<BspNode2D>>,

    /// Subtree on the negative side of the line.
    negative: Option<Box<BspNode2D>>,
}

impl BspNode2D {
    pub fn new(line: Line2D, coincident: Vec<Edge3D>) -> Self {
        Self {
            line,
            coincident,
            positive: None,
            negative: None,
        }
    }

    #[inline]
    pub fn line(&self) -> &Line2D {
        &self.line
    }

    #[inline]
    pub fn coincident(&self) -> &[Edge3D] {
        &self.coincident
    }

    #[inline]
    pub fn positive(&self) -> Option<&BspNode2D> {
        self.positive.as_deref()
    }

    #[inline]
    pub fn negative(&self) -> Option<&BspNode2D> {
        self.negative.as_deref()
    }

    #[inline]
    pub fn set_positive(&mut self, node: Option<BspNode2D>) {
        self.positive = node.map(Box::new);
    }

    #[inline]
    pub fn set_negative(&mut self, node: Option<BspNode2D>) {
        self.negative = node.map(Box::new);
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.positive.is_none() && self.negative.is_none()
    }

    /// Number of edges stored in this subtree.
    pub fn edge_count(&self) -> usize {
        self.coincident.len()
            + self.positive.as_ref().map_or(0, |n| n.edge_count())
            + self.negative.as_ref().map_or(0, |n| n.edge_count())
    }

    /// Returns the depth of this subtree (1 for a leaf node).
    pub fn depth(&self) -> usize {
        let positive_depth = self.positive.as_ref().map_or(0, |n| n.depth());
        let negative_depth = self.negative.as_ref().map_or(0, |n| n.depth());
        1 + positive_depth.max(negative_depth)
    }

    pub(super) fn classify_point(&self, plane: &Plane3D, point: &Point2<Real>) -> PointClassification {
        let eps = tolerance::epsilon();
        let distance = self.line.signed_distance(point);
        if distance > eps {
            return self
                .positive
                .as_ref()
                .map_or(PointClassification::Outside, |n| n.classify_point(plane, point));
        }
        if distance < -eps {
            return self
                .negative
                .as_ref()
                .map_or(PointClassification::Inside, |n| n.classify_point(plane, point));
        }

        if self
            .coincident
            .iter()
            .any(|e| e.to_plane(plane).contains_point(point))
        {
            return PointClassification::Border;
        }

        let front = self
            .positive
            .as_ref()
            .map_or(PointClassification::Outside, |n| n.classify_point(plane, point));
        let back = self
            .negative
            .as_ref()
            .map_or(PointClassification::Inside, |n| n.classify_point(plane, point));
        if front == back {
            front
        } else {
            PointClassification::Border
        }
    }

    pub(super) fn partition(&self, plane: &Plane3D, edge: Edge3D, out: &mut EdgePartitions) {
        let eps = tolerance::epsilon();
        let flat = edge.to_plane(plane);
        let d0 = self.line.signed_distance(&flat.v[0]);
        let d1 = self.line.signed_distance(&flat.v[1]);

        if d0.abs() < eps && d1.abs() < eps {
            self.carve_coincident(plane, edge, out);
        } else if d0 > -eps && d1 > -eps {
            self.send_positive(plane, edge, out);
        } else if d0 < eps && d1 < eps {
            self.send_negative(plane, edge, out);
        } else {
            let t = d0 / (d0 - d1);
            let mid = edge.lerp(t);
            let head = Edge3D::new(edge.v[0], mid);
            let tail = Edge3D::new(mid, edge.v[1]);
            if d0 > 0.0 {
                self.send_positive(plane, head, out);
                self.send_negative(plane, tail, out);
            } else {
                self.send_negative(plane, head, out);
                self.send_positive(plane, tail, out);
            }
        }
    }

    /// Splits an edge lying on this node's line into the stretches covered by
    /// the coincident edges and the stretches that are not.
    fn carve_coincident(&self, plane: &Plane3D, edge: Edge3D, out: &mut EdgePartitions) {
        let mut remaining = vec![edge];

        for boundary in &self.coincident {
            let boundary_flat = boundary.to_plane(plane);
            let mut next = Vec::with_capacity(remaining.len());

            for piece in remaining {
                let piece_flat = piece.to_plane(plane);
                let EdgeIntersection::Overlap(covered) = piece_flat.intersect(&boundary_flat) else {
                    next.push(piece);
                    continue;
                };

                let covered = lift(&piece, &piece_flat, &covered);
                if piece_flat.direction().dot(&boundary_flat.direction()) > 0.0 {
                    push_fragment(&mut out.co_same, covered);
                } else {
                    push_fragment(&mut out.co_diff, covered);
                }

                match piece_flat.subtract(&boundary_flat) {
                    EdgeSubtraction::One(rest) => next.push(lift(&piece, &piece_flat, &rest)),
                    EdgeSubtraction::Two(a, b) => {
                        next.push(lift(&piece, &piece_flat, &a));
                        next.push(lift(&piece, &piece_flat, &b));
                    }
                    EdgeSubtraction::None => {}
                    EdgeSubtraction::Invalid => next.push(piece),
                }
            }

            remaining = next;
        }

        for piece in remaining {
            if piece.is_point() {
                continue;
            }
            let flat = piece.to_plane(plane);
            let d0 = self.line.signed_distance(&flat.v[0]);
            let d1 = self.line.signed_distance(&flat.v[1]);
            if d0 <= 0.0 && d1 <= 0.0 {
                self.send_negative(plane, piece, out);
            } else {
                self.send_positive(plane, piece, out);
            }
        }
    }

    fn send_positive(&self, plane: &Plane3D, edge: Edge3D, out: &mut EdgePartitions) {
        match &self.positive {
            Some(child) => child.partition(plane, edge, out),
            None => push_fragment(&mut out.positive, edge),
        }
    }

    fn send_negative(&self, plane: &Plane3D, edge: Edge3D, out: &mut EdgePartitions) {
        match &self.negative {
            Some(child) => child.partition(plane, edge, out),
            None => push_fragment(&mut out.negative, edge),
        }
    }
}

fn push_fragment(list: &mut Vec<Edge3D>, edge: Edge3D) {
    if !edge.is_point() {
        list.push(edge);
    }
}

/// Maps a stretch of `flat` (the projection of `edge`) back into world space.
fn lift(edge: &Edge3D, flat: &Edge2D, part: &Edge2D) -> Edge3D {
    let dir = flat.direction();
    let len_sq = dir.norm_squared();
    if len_sq < Real::EPSILON {
        return *edge;
    }
    let param = |p: &Point2<Real>| ((p - flat.v[0]).dot(&dir) / len_sq).clamp(0.0, 1.0);
    Edge3D::new(edge.lerp(param(&part.v[0])), edge.lerp(param(&part.v[1])))
}
