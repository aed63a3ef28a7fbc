//! Binary space partitioning over the faces of a closed brush.
//!
//! Faces are assumed to point outward, so the front of every splitting
//! plane is outside the solid. Pushing a polygon through the tree sorts its
//! fragments into four lists:
//!
//! - positive: outside the solid
//! - negative: inside the solid
//! - co_same: on a face, facing the same way
//! - co_diff: on a face, facing the other way
//!
//! # Example
//!
//! ```ignore
//! let tree = BspTree3D::build(brush_faces, &FirstPolygon);
//! let parts = tree.partitions(&polygon)?;
//! let outside = parts.positive;
//! ```
//!
//! # Architecture
//!
//! - [`BspTree3D`]: The container holding the root node and a validity flag
//! - [`BspNode3D`]: A splitting plane with the polygons lying on it
//! - [`SplitterSelector`]: Strategy trait for choosing splitting planes

mod node;
mod selector;
mod tree;

use crate::polygon::Polygon;

pub use node::BspNode3D;
pub use selector::{FirstPolygon, LargestPolygon, SplitterSelector};
pub use tree::BspTree3D;

/// Fragments of a polygon sorted against a [`BspTree3D`].
#[derive(Debug, Clone, Default)]
pub struct PolygonPartitions {
    pub positive: Vec<Polygon>,
    pub negative: Vec<Polygon>,
    pub co_same: Vec<Polygon>,
    pub co_diff: Vec<Polygon>,
}

impl PolygonPartitions {
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty() && self.co_same.is_empty() && self.co_diff.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_solids {
    use nalgebra::Point3;

    use crate::polygon::Polygon;
    use crate::tolerance::Real;

    /// The six outward-facing faces of an axis-aligned box.
    pub fn cuboid(min: [Real; 3], max: [Real; 3]) -> Vec<Polygon> {
        let [x0, y0, z0] = min;
        let [x1, y1, z1] = max;
        let faces = [
            [[x0, y0, z0], [x0, y1, z0], [x1, y1, z0], [x1, y0, z0]],
            [[x0, y0, z1], [x1, y0, z1], [x1, y1, z1], [x0, y1, z1]],
            [[x0, y0, z0], [x0, y0, z1], [x0, y1, z1], [x0, y1, z0]],
            [[x1, y0, z0], [x1, y1, z0], [x1, y1, z1], [x1, y0, z1]],
            [[x0, y0, z0], [x1, y0, z0], [x1, y0, z1], [x0, y0, z1]],
            [[x0, y1, z0], [x0, y1, z1], [x1, y1, z1], [x1, y1, z0]],
        ];
        faces
            .iter()
            .map(|face| Polygon::new(face.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect()).unwrap())
            .collect()
    }

    pub fn cube(origin: [Real; 3], size: Real) -> Vec<Polygon> {
        cuboid(origin, origin.map(|c| c + size))
    }

    /// Volume enclosed by outward-facing polygons.
    pub fn volume(polygons: &[Polygon]) -> Real {
        polygons
            .iter()
            .map(|p| p.signed_area() * p.plane().offset())
            .sum::<Real>()
            / 3.0
    }
}
