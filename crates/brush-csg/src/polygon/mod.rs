//! Coplanar regions with holes and their boolean algebra.
//!
//! A [`Polygon`] stores one shared vertex array and a list of directed index
//! edges. Loops are never stored; they are recovered from the edge set on
//! demand, which lets boolean results be assembled as edge soups and then
//! re-threaded.
//!
//! Boolean operations consume the receiver and hand back a new polygon:
//!
//! ```ignore
//! let merged = a.union(&b)?;
//! let carved = merged.subtract(&hole)?;
//! ```

mod boolean;
mod loops;
mod optimize;
mod query;
mod reshape;

use std::cell::OnceCell;

use nalgebra::{Point2, Point3, Vector2};
use uuid::Uuid;

use crate::bound_box::BoundBox;
use crate::bsp2d::BspTree2D;
use crate::decomposer::{ConvexPiece, PolygonDecomposer, Triangulation};
use crate::edge::Edge3D;
use crate::error::{CsgError, Result};
use crate::plane::{Classification, Plane3D, PlaneSide};
use crate::tolerance::Real;
use crate::vertex::{IndexEdge, Vertex};

pub use boolean::IntersectFlags;
pub use loops::{SeparationMode, choose_next_edge, choose_prev_edge};
pub use optimize::optimize;

/// Boolean state carried by a polygon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolygonFlags {
    /// Produced by mirroring; only combined with other mirrored polygons.
    pub mirrored: bool,
    pub hidden: bool,
    /// The polygon is a quad whose corners were not exactly coplanar.
    pub nonplanar_quad: bool,
}

/// Planar texture projection used to derive vertex UVs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexInfo {
    pub shift: Vector2<Real>,
    pub scale: Vector2<Real>,
    /// Rotation in radians.
    pub rotate: Real,
}

impl Default for TexInfo {
    fn default() -> Self {
        Self {
            shift: Vector2::zeros(),
            scale: Vector2::new(1.0, 1.0),
            rotate: 0.0,
        }
    }
}

/// The serializable shape of a polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatPolygon {
    pub positions: Vec<Point3<Real>>,
    pub edges: Vec<(usize, usize)>,
    pub plane: Plane3D,
    pub material_id: u32,
    pub flags: PolygonFlags,
}

/// Derived data rebuilt lazily after every geometry change.
#[derive(Debug, Clone, Default)]
struct PolygonCache {
    bound_box: OnceCell<Option<BoundBox>>,
    bsp: OnceCell<Option<BspTree2D>>,
    convexes: OnceCell<Option<Vec<ConvexPiece>>>,
    triangles: OnceCell<Option<Triangulation>>,
    representative: OnceCell<Option<Point3<Real>>>,
}

/// One coplanar region: an outer loop plus any holes, or an open polyline.
///
/// Outer loops turn counter-clockwise around the plane normal and holes
/// turn clockwise. Cloning creates a new identity; use
/// [`Polygon::clone_preserving_guid`] to keep it.
#[derive(Debug)]
pub struct Polygon {
    guid: Uuid,
    plane: Plane3D,
    vertices: Vec<Vertex>,
    edges: Vec<IndexEdge>,
    material_id: u32,
    tex_info: TexInfo,
    flags: PolygonFlags,
    cache: PolygonCache,
}

impl Clone for Polygon {
    fn clone(&self) -> Self {
        Self {
            guid: Uuid::new_v4(),
            ..self.clone_preserving_guid()
        }
    }
}

impl Polygon {
    /// Creates a polygon from a single loop of points.
    ///
    /// The plane is fitted to the loop, so the winding decides the facing.
    pub fn new(points: Vec<Point3<Real>>) -> Result<Self> {
        let plane = Plane3D::from_loop(&points).ok_or(CsgError::InvalidPolygon)?;
        Ok(Self::with_plane(points, plane))
    }

    /// Creates a polygon from a single loop of points lying on `plane`.
    pub fn with_plane(points: Vec<Point3<Real>>, plane: Plane3D) -> Self {
        let n = points.len();
        let edges = (0..n).map(|i| IndexEdge(i, (i + 1) % n)).collect();
        let vertices = points.into_iter().map(Vertex::new).collect();
        Self::from_parts(vertices, edges, plane)
    }

    pub fn from_parts(vertices: Vec<Vertex>, edges: Vec<IndexEdge>, plane: Plane3D) -> Self {
        Self {
            guid: Uuid::new_v4(),
            plane,
            vertices,
            edges,
            material_id: 0,
            tex_info: TexInfo::default(),
            flags: PolygonFlags::default(),
            cache: PolygonCache::default(),
        }
    }

    /// A polygon with no geometry on `plane`.
    pub fn empty(plane: Plane3D) -> Self {
        Self::from_parts(Vec::new(), Vec::new(), plane)
    }

    /// Rebuilds a polygon from its serializable shape.
    pub fn from_flat(flat: &FlatPolygon) -> Result<Self> {
        let count = flat.positions.len();
        if flat.edges.iter().any(|&(a, b)| a >= count || b >= count) {
            return Err(CsgError::InvalidPolygon);
        }
        let mut polygon = Self::from_parts(
            flat.positions.iter().copied().map(Vertex::new).collect(),
            flat.edges.iter().map(|&(a, b)| IndexEdge(a, b)).collect(),
            flat.plane,
        );
        polygon.material_id = flat.material_id;
        polygon.flags = flat.flags;
        polygon.update_uvs();
        Ok(polygon)
    }

    pub fn to_flat(&self) -> FlatPolygon {
        FlatPolygon {
            positions: self.vertices.iter().map(|v| v.pos).collect(),
            edges: self.edges.iter().map(|e| (e.0, e.1)).collect(),
            plane: self.plane,
            material_id: self.material_id,
            flags: self.flags,
        }
    }

    /// Deep copy that keeps this polygon's identity.
    pub fn clone_preserving_guid(&self) -> Self {
        Self {
            guid: self.guid,
            plane: self.plane,
            vertices: self.vertices.clone(),
            edges: self.edges.clone(),
            material_id: self.material_id,
            tex_info: self.tex_info,
            flags: self.flags,
            cache: self.cache.clone(),
        }
    }

    /// An empty polygon sharing this one's plane and surface attributes.
    pub(crate) fn empty_like(&self) -> Self {
        self.with_geometry(Vec::new(), Vec::new())
    }

    /// A new polygon with this one's plane and surface attributes and the given geometry.
    pub(crate) fn with_geometry(&self, vertices: Vec<Vertex>, edges: Vec<IndexEdge>) -> Self {
        let mut polygon = Self::from_parts(vertices, edges, self.plane);
        polygon.material_id = self.material_id;
        polygon.tex_info = self.tex_info;
        polygon.flags = self.flags;
        polygon.refresh_quad_flag();
        polygon.update_uvs();
        polygon
    }

    #[inline]
    pub fn guid(&self) -> Uuid {
        self.guid
    }

    #[inline]
    pub fn plane(&self) -> &Plane3D {
        &self.plane
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn edges(&self) -> &[IndexEdge] {
        &self.edges
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn position(&self, index: usize) -> Point3<Real> {
        self.vertices[index].pos
    }

    #[inline]
    pub fn material_id(&self) -> u32 {
        self.material_id
    }

    pub fn set_material_id(&mut self, material_id: u32) {
        self.material_id = material_id;
    }

    #[inline]
    pub fn flags(&self) -> PolygonFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: PolygonFlags) {
        self.flags = flags;
    }

    #[inline]
    pub fn tex_info(&self) -> &TexInfo {
        &self.tex_info
    }

    pub fn set_tex_info(&mut self, tex_info: TexInfo) {
        self.tex_info = tex_info;
        self.update_uvs();
    }

    /// Replaces the plane, reversing the edges when the facing flips.
    pub fn set_plane(&mut self, plane: Plane3D) {
        if !plane.is_same_facing(&self.plane) {
            self.reverse_edges();
        }
        self.plane = plane;
        self.invalidate_caches();
    }

    /// Replaces the whole geometry.
    pub fn reset(&mut self, vertices: Vec<Vertex>, edges: Vec<IndexEdge>) {
        self.vertices = vertices;
        self.edges = edges;
        self.refresh_quad_flag();
        self.invalidate_caches();
    }

    /// A closed polygon needs at least three edges; an open one at least one.
    pub fn is_valid(&self) -> bool {
        if self.edges.is_empty() || self.vertices.is_empty() {
            return false;
        }
        self.is_open() || self.edges.len() >= 3
    }

    /// 2D positions of every vertex in the plane frame.
    pub fn points_2d(&self) -> Vec<Point2<Real>> {
        self.vertices
            .iter()
            .map(|v| self.plane.world_to_plane(&v.pos))
            .collect()
    }

    pub fn edge_3d(&self, index: usize) -> Edge3D {
        let e = self.edges[index];
        Edge3D::new(self.vertices[e.0].pos, self.vertices[e.1].pos)
    }

    pub fn edges_3d(&self) -> Vec<Edge3D> {
        (0..self.edges.len()).map(|i| self.edge_3d(i)).collect()
    }

    /// Outer loops minus holes; positive when the outer loops turn counter-clockwise.
    pub fn signed_area(&self) -> Real {
        let points = self.points_2d();
        self.edges
            .iter()
            .map(|e| {
                let a = points[e.0];
                let b = points[e.1];
                a.x * b.y - a.y * b.x
            })
            .sum::<Real>()
            * 0.5
    }

    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Classifies this polygon relative to a plane.
    pub fn classify(&self, plane: &Plane3D) -> Classification {
        let mut front = 0;
        let mut back = 0;
        let mut on_plane = 0;

        for vertex in &self.vertices {
            match plane.classify_point(&vertex.pos) {
                PlaneSide::Front => front += 1,
                PlaneSide::Back => back += 1,
                PlaneSide::OnPlane => on_plane += 1,
            }
        }

        if on_plane == self.vertices.len() {
            Classification::Coplanar
        } else if back == 0 {
            Classification::Front
        } else if front == 0 {
            Classification::Back
        } else {
            Classification::Spanning
        }
    }

    /// Reverses the facing: inverted plane and reversed edges.
    pub fn flip(&mut self) {
        self.plane = self.plane.inverted();
        self.reverse_edges();
        self.invalidate_caches();
    }

    pub fn flipped(mut self) -> Self {
        self.flip();
        self
    }

    fn reverse_edges(&mut self) {
        for e in &mut self.edges {
            *e = e.reversed();
        }
        self.edges.reverse();
    }

    /// Recomputes UVs from the texture projection.
    pub fn update_uvs(&mut self) {
        let (sin, cos) = self.tex_info.rotate.sin_cos();
        for v in &mut self.vertices {
            let p = self.plane.world_to_plane(&v.pos);
            let rotated = Vector2::new(p.x * cos - p.y * sin, p.x * sin + p.y * cos);
            v.uv = rotated.component_mul(&self.tex_info.scale) + self.tex_info.shift;
        }
    }

    fn refresh_quad_flag(&mut self) {
        if self.vertices.len() != 4 || self.edges.len() != 4 {
            self.flags.nonplanar_quad = false;
        }
    }

    /// Drops every cached derivative at once.
    pub(crate) fn invalidate_caches(&mut self) {
        self.cache = PolygonCache::default();
    }

    pub fn bound_box(&self) -> Option<BoundBox> {
        *self
            .cache
            .bound_box
            .get_or_init(|| BoundBox::from_points(self.vertices.iter().map(|v| &v.pos)))
    }

    /// The 2D BSP tree of a valid closed polygon.
    pub fn bsp_tree(&self) -> Option<&BspTree2D> {
        self.cache
            .bsp
            .get_or_init(|| {
                if !self.is_valid() || self.is_open() {
                    return None;
                }
                let edges = self.edges_3d();
                if edges.iter().any(Edge3D::is_point) {
                    return None;
                }
                Some(BspTree2D::build(self.plane, edges))
            })
            .as_ref()
    }

    /// Triangles covering the polygon, `None` if it cannot be decomposed.
    pub fn triangulation(&self) -> Option<&Triangulation> {
        self.cache
            .triangles
            .get_or_init(|| PolygonDecomposer::new().triangulate(self).ok())
            .as_ref()
    }

    /// Convex pieces covering the polygon, `None` if it cannot be decomposed.
    pub fn convexes(&self) -> Option<&[ConvexPiece]> {
        self.cache
            .convexes
            .get_or_init(|| PolygonDecomposer::new().decompose_convex(self).ok())
            .as_deref()
    }

    /// A point that stands for the polygon.
    ///
    /// Open polygons use the middle vertex of their chain. Closed ones use
    /// the centroid of their largest triangle, falling back to the vertex
    /// average.
    pub fn representative_position(&self) -> Option<Point3<Real>> {
        *self.cache.representative.get_or_init(|| {
            if self.vertices.is_empty() {
                return None;
            }
            if self.is_open() {
                let chain = self.linked_vertices().ok()?;
                return chain.get(chain.len() / 2).map(|v| v.pos);
            }
            if let Some(mesh) = self.triangulation() {
                let largest = mesh
                    .triangles
                    .iter()
                    .map(|t| (mesh.triangle_area(t), t))
                    .max_by(|a, b| a.0.total_cmp(&b.0));
                if let Some((_, t)) = largest {
                    let sum = mesh.positions[t[0]].coords + mesh.positions[t[1]].coords + mesh.positions[t[2]].coords;
                    return Some(Point3::from(sum / 3.0));
                }
            }
            let sum: nalgebra::Vector3<Real> = self.vertices.iter().map(|v| v.pos.coords).sum();
            Some(Point3::from(sum / self.vertices.len() as Real))
        })
    }
}
