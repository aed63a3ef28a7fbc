//! Binary space partitioning over the edges of a coplanar region.
//!
//! The 2D tree is the substrate of polygon boolean algebra: every edge of
//! one polygon is pushed through the other polygon's tree and comes out
//! sorted into four lists.
//!
//! - positive: outside the region
//! - negative: inside the region
//! - co_same: on the boundary, running with it
//! - co_diff: on the boundary, running against it
//!
//! # Architecture
//!
//! - [`BspTree2D`]: The container holding the plane and the root node
//! - [`BspNode2D`]: A splitting line with its coincident edges

mod node;
mod tree;

use crate::edge::Edge3D;

pub use node::BspNode2D;
pub use tree::BspTree2D;

/// Where a point lies relative to a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointClassification {
    Inside,
    Outside,
    Border,
}

/// How two regions (or an edge and a region) meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntersectionType {
    None,
    /// Boundaries touch without the interiors overlapping.
    JustTouch,
    Intersection,
}

/// Fragments of an edge sorted against a [`BspTree2D`].
#[derive(Debug, Clone, Default)]
pub struct EdgePartitions {
    pub positive: Vec<Edge3D>,
    pub negative: Vec<Edge3D>,
    pub co_same: Vec<Edge3D>,
    pub co_diff: Vec<Edge3D>,
}
