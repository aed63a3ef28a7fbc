//! Polygon vertices and directed index edges.

use nalgebra::{Point3, Vector2};

use crate::tolerance::{self, Real};

/// A polygon corner: position, texture coordinate and a clipping tag.
///
/// `id` separates vertices created at the same position by different
/// operands while fragments are being collected. It is reset to zero once a
/// polygon has been optimized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub pos: Point3<Real>,
    pub uv: Vector2<Real>,
    pub id: u8,
}

impl Vertex {
    pub fn new(pos: Point3<Real>) -> Self {
        Self {
            pos,
            uv: Vector2::zeros(),
            id: 0,
        }
    }

    pub fn with_id(pos: Point3<Real>, id: u8) -> Self {
        Self {
            id,
            ..Self::new(pos)
        }
    }

    /// Same position within epsilon and same tag.
    pub fn is_equivalent(&self, other: &Vertex) -> bool {
        self.id == other.id && tolerance::points_equivalent(&self.pos, &other.pos)
    }
}

impl From<Point3<Real>> for Vertex {
    fn from(pos: Point3<Real>) -> Self {
        Self::new(pos)
    }
}

/// A directed edge between two vertex indices, `tail → head`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexEdge(pub usize, pub usize);

impl IndexEdge {
    #[inline]
    pub fn tail(&self) -> usize {
        self.0
    }

    #[inline]
    pub fn head(&self) -> usize {
        self.1
    }

    #[inline]
    pub fn reversed(&self) -> Self {
        Self(self.1, self.0)
    }

    #[inline]
    pub fn is_self_loop(&self) -> bool {
        self.0 == self.1
    }
}

/// Index of a vertex equivalent to `vertex`, pushing it first if none exists.
pub(crate) fn add_vertex(vertices: &mut Vec<Vertex>, vertex: Vertex) -> usize {
    match vertices.iter().position(|v| v.is_equivalent(&vertex)) {
        Some(index) => index,
        None => {
            vertices.push(vertex);
            vertices.len() - 1
        }
    }
}
