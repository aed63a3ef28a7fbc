//! Splitter selection strategies for 3D BSP construction.
//!
//! The choice of splitting plane affects tree balance and the number of
//! polygon splits during construction.

use crate::polygon::Polygon;

/// Strategy for selecting which polygon's plane splits a node.
pub trait SplitterSelector {
    /// Index of the polygon whose plane becomes the splitter.
    ///
    /// Returns `None` if the slice is empty.
    fn select(&self, polygons: &[Polygon]) -> Option<usize>;
}

/// Selects the first polygon in the list.
///
/// Tree shape depends on input order, and a brush's face order is usually
/// a fine splitting order already.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstPolygon;

impl SplitterSelector for FirstPolygon {
    fn select(&self, polygons: &[Polygon]) -> Option<usize> {
        (!polygons.is_empty()).then_some(0)
    }
}

/// Selects the polygon with the largest area.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargestPolygon;

impl SplitterSelector for LargestPolygon {
    fn select(&self, polygons: &[Polygon]) -> Option<usize> {
        polygons
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.signed_area().abs().total_cmp(&b.1.signed_area().abs()))
            .map(|(i, _)| i)
    }
}
