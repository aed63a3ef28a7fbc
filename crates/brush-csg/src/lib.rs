//! Constructive solid geometry for brushes made of planar polygons.
//!
//! Polygons carry their own plane and may hold several loops (outer loops
//! counter-clockwise, holes clockwise). Booleans between coplanar polygons
//! run through a 2D BSP tree built from their edges; booleans between whole
//! brushes run through a 3D BSP tree built from their faces.
//!
//! ```ignore
//! use brush_csg::{BooleanOperation, Model, Polygon};
//!
//! let a = Polygon::new(square_points(0.0))?;
//! let b = Polygon::new(square_points(1.0))?;
//! let merged = a.union(&b)?;
//! let triangles = merged.triangulation();
//!
//! let carved = brush.boolean(&cutter, BooleanOperation::Subtract)?;
//! ```
//!
//! The crate logs through `tracing` and never installs a subscriber.

pub mod tolerance;

mod bound_box;
mod bsp2d;
mod bsp3d;
mod cuttable;
mod decomposer;
mod edge;
mod error;
mod model;
mod plane;
mod polygon;
mod vertex;

pub use bound_box::BoundBox;
pub use bsp2d::{BspNode2D, BspTree2D, EdgePartitions, IntersectionType, PointClassification};
pub use bsp3d::{BspNode3D, BspTree3D, FirstPolygon, LargestPolygon, PolygonPartitions, SplitterSelector};
pub use cuttable::{Cuttable, PlaneClipResult};
pub use decomposer::{ConvexPiece, PolygonDecomposer, Triangulation};
pub use edge::{Edge2D, Edge3D, EdgeIntersection, EdgeSubtraction, Line2D};
pub use error::{CsgError, Result};
pub use model::{BooleanOperation, Model, ModelClip, OperationType, generate_polygons_from_edge_list};
pub use plane::{Classification, Plane3D, PlaneSide};
pub use polygon::{
    FlatPolygon, IntersectFlags, Polygon, PolygonFlags, SeparationMode, TexInfo, choose_next_edge, choose_prev_edge,
    optimize,
};
pub use vertex::{IndexEdge, Vertex};
