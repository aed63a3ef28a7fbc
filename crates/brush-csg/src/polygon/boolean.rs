//! Boolean algebra between coplanar polygons.
//!
//! Each operation pushes the edges of one operand through the other's 2D
//! BSP tree, keeps the fragment lists its truth table asks for, and threads
//! the kept fragments back into a polygon.

use nalgebra::Point3;
use tracing::{debug, instrument};

use crate::bsp2d::BspTree2D;
use crate::edge::Edge3D;
use crate::error::{CsgError, Result};
use crate::tolerance::{self, Real};
use crate::vertex::{IndexEdge, Vertex, add_vertex};

use super::Polygon;
use super::optimize::{connect_near_vertices, optimize, remove_unconnected_edges};

/// Which boundary fragments [`Polygon::intersect`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntersectFlags {
    /// Keep stretches where both boundaries run the same way.
    pub include_co_same: bool,
    /// Keep stretches where the boundaries run against each other.
    pub include_co_diff: bool,
}

impl Default for IntersectFlags {
    fn default() -> Self {
        Self {
            include_co_same: true,
            include_co_diff: false,
        }
    }
}

/// Fragment lists to keep from one operand.
#[derive(Debug, Clone, Copy, Default)]
struct Keep {
    positive: bool,
    negative: bool,
    co_same: bool,
    co_diff: bool,
    invert: bool,
}

const NOTHING: Keep = Keep {
    positive: false,
    negative: false,
    co_same: false,
    co_diff: false,
    invert: false,
};

/// Vertices and edges collected from kept fragments.
#[derive(Debug, Default)]
struct Fragments {
    vertices: Vec<Vertex>,
    edges: Vec<IndexEdge>,
}

impl Fragments {
    fn push(&mut self, edge: &Edge3D, id: u8) {
        let a = add_vertex(&mut self.vertices, Vertex::with_id(edge.v[0], id));
        let b = add_vertex(&mut self.vertices, Vertex::with_id(edge.v[1], id));
        let e = IndexEdge(a, b);
        if a != b && !self.edges.contains(&e) {
            self.edges.push(e);
        }
    }

    /// Pushes every edge of `source` through `tree` and keeps what `keep` selects.
    fn collect(&mut self, source: &Polygon, tree: &BspTree2D, keep: Keep, id: u8) {
        for edge in source.edges_3d() {
            let parts = tree.partitions(&edge);
            let lists = [
                (keep.positive, &parts.positive),
                (keep.negative, &parts.negative),
                (keep.co_same, &parts.co_same),
                (keep.co_diff, &parts.co_diff),
            ];
            for (wanted, list) in lists {
                if !wanted {
                    continue;
                }
                for fragment in list {
                    let fragment = if keep.invert { fragment.inverted() } else { *fragment };
                    self.push(&fragment, id);
                }
            }
        }
    }
}

impl Polygon {
    /// Every operation except union refuses an empty operand.
    fn check_operands(&self, other: &Polygon) -> Result<()> {
        if self.is_valid() && other.is_valid() {
            Ok(())
        } else {
            Err(CsgError::InvalidPolygon)
        }
    }

    /// Brings `other` onto this polygon's plane, flipping it if it faces away.
    fn aligned(&self, other: &Polygon) -> Result<Polygon> {
        if self.is_open() || other.is_open() {
            return Err(CsgError::OpenPolygon);
        }
        if self.plane.is_equivalent(&other.plane) {
            Ok(other.clone())
        } else if self.plane.is_inverted(&other.plane) {
            let mut flipped = other.clone().flipped();
            flipped.plane = self.plane;
            Ok(flipped)
        } else {
            Err(CsgError::PlaneMismatch)
        }
    }

    /// Threads collected fragments back into this polygon.
    fn rebuild(mut self, fragments: Fragments, repair: bool) -> Result<Polygon> {
        let Fragments {
            mut vertices,
            mut edges,
        } = fragments;
        if repair {
            connect_near_vertices(&vertices, &mut edges);
            remove_unconnected_edges(&mut edges);
        }
        optimize(&mut vertices, &mut edges)?;
        self.reset(vertices, edges);
        self.update_uvs();
        Ok(self)
    }

    fn trees<'a>(a: &'a Polygon, b: &'a Polygon) -> Result<(&'a BspTree2D, &'a BspTree2D)> {
        let ta = a.bsp_tree().ok_or(CsgError::InvalidPolygon)?;
        let tb = b.bsp_tree().ok_or(CsgError::InvalidPolygon)?;
        Ok((ta, tb))
    }

    /// The region covered by either polygon.
    ///
    /// An invalid receiver yields a copy of `other`. Two open polylines are
    /// concatenated instead.
    #[instrument(skip_all, fields(a = self.edge_count(), b = other.edge_count()))]
    pub fn union(self, other: &Polygon) -> Result<Polygon> {
        match (self.is_open(), other.is_open()) {
            (true, true) => return self.concatenate_open(other),
            (false, false) => {}
            _ => return Err(CsgError::OpenPolygon),
        }
        if !self.is_valid() {
            return Ok(other.clone());
        }
        let other = self.aligned(other)?;
        if !other.is_valid() {
            return Ok(self);
        }

        let mut fragments = Fragments::default();
        {
            let (mine, theirs) = Self::trees(&self, &other)?;
            let keep_mine = Keep {
                positive: true,
                co_same: true,
                ..NOTHING
            };
            let keep_theirs = Keep {
                positive: true,
                ..NOTHING
            };
            fragments.collect(&self, theirs, keep_mine, 0);
            fragments.collect(&other, mine, keep_theirs, 0);
        }
        let result = self.rebuild(fragments, true)?;
        debug!(edges = result.edge_count(), "union");
        Ok(result)
    }

    /// Appends the edges of another open polyline, reversing them when the
    /// two chains would otherwise meet head to head or tail to tail.
    fn concatenate_open(mut self, other: &Polygon) -> Result<Polygon> {
        let shares_role = |index: usize, pos: &Point3<Real>| {
            self.vertices
                .iter()
                .position(|v| tolerance::points_equivalent(&v.pos, pos))
                .is_some_and(|mine| {
                    self.edges
                        .iter()
                        .any(|m| if index == 0 { m.0 == mine } else { m.1 == mine })
                })
        };
        let reverse = other
            .edges_3d()
            .iter()
            .any(|e| shares_role(0, &e.v[0]) || shares_role(1, &e.v[1]));

        let mut fragments = Fragments {
            vertices: std::mem::take(&mut self.vertices),
            edges: std::mem::take(&mut self.edges),
        };
        for edge in other.edges_3d() {
            let edge = if reverse { edge.inverted() } else { edge };
            fragments.push(&edge, 0);
        }
        self.rebuild(fragments, false)
    }

    /// The part of this polygon outside `other`.
    #[instrument(skip_all, fields(a = self.edge_count(), b = other.edge_count()))]
    pub fn subtract(self, other: &Polygon) -> Result<Polygon> {
        self.check_operands(other)?;
        let other = self.aligned(other)?;
        if other.include(&self) {
            return Ok(self.empty_like());
        }

        let mut fragments = Fragments::default();
        {
            let (mine, theirs) = Self::trees(&self, &other)?;
            fragments.collect(&self, theirs, SUBTRACT_KEPT, 0);
            fragments.collect(&other, mine, SUBTRACT_CARVED, 0);
        }
        let result = self.rebuild(fragments, true)?;
        debug!(edges = result.edge_count(), "subtract");
        Ok(result)
    }

    /// The region covered by both polygons.
    #[instrument(skip_all, fields(a = self.edge_count(), b = other.edge_count()))]
    pub fn intersect(self, other: &Polygon, flags: IntersectFlags) -> Result<Polygon> {
        self.check_operands(other)?;
        let other = self.aligned(other)?;

        let mut fragments = Fragments::default();
        {
            let (mine, theirs) = Self::trees(&self, &other)?;
            let keep_mine = Keep {
                negative: true,
                co_same: flags.include_co_same,
                ..NOTHING
            };
            let keep_theirs = Keep {
                negative: true,
                co_diff: flags.include_co_diff,
                ..NOTHING
            };
            fragments.collect(&self, theirs, keep_mine, 0);
            fragments.collect(&other, mine, keep_theirs, 0);
        }
        let result = self.rebuild(fragments, false)?;
        debug!(edges = result.edge_count(), "intersect");
        Ok(result)
    }

    /// The region covered by exactly one polygon.
    ///
    /// Both differences are collected with separate vertex tags so that they
    /// stay separate loops where they touch.
    #[instrument(skip_all, fields(a = self.edge_count(), b = other.edge_count()))]
    pub fn exclusive_or(self, other: &Polygon) -> Result<Polygon> {
        self.check_operands(other)?;
        let other = self.aligned(other)?;

        let mut fragments = Fragments::default();
        {
            let (mine, theirs) = Self::trees(&self, &other)?;
            fragments.collect(&self, theirs, SUBTRACT_KEPT, 0);
            fragments.collect(&other, mine, SUBTRACT_CARVED, 0);
            fragments.collect(&other, mine, SUBTRACT_KEPT, 1);
            fragments.collect(&self, theirs, SUBTRACT_CARVED, 1);
        }
        let result = self.rebuild(fragments, true)?;
        debug!(edges = result.edge_count(), "exclusive or");
        Ok(result)
    }

    /// Removes the part of this polygon inside `other`.
    pub fn clip_inside(self, other: &Polygon) -> Result<Polygon> {
        let keep = Keep {
            positive: true,
            co_same: true,
            ..NOTHING
        };
        self.clip_against(other, keep)
    }

    /// Removes the part of this polygon outside `other`.
    pub fn clip_outside(self, other: &Polygon) -> Result<Polygon> {
        let keep = Keep {
            negative: true,
            co_diff: true,
            ..NOTHING
        };
        self.clip_against(other, keep)
    }

    fn clip_against(self, other: &Polygon, keep: Keep) -> Result<Polygon> {
        self.check_operands(other)?;
        let other = self.aligned(other)?;
        let mut fragments = Fragments::default();
        let theirs = other.bsp_tree().ok_or(CsgError::InvalidPolygon)?;
        fragments.collect(&self, theirs, keep, 0);
        self.rebuild(fragments, false)
    }
}

/// The receiver's share of a difference.
const SUBTRACT_KEPT: Keep = Keep {
    positive: true,
    co_diff: true,
    ..NOTHING
};

/// The subtrahend's share of a difference, reversed to bound the hole.
const SUBTRACT_CARVED: Keep = Keep {
    negative: true,
    invert: true,
    ..NOTHING
};
