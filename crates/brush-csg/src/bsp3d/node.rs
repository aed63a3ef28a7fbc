//! 3D BSP tree node implementation.

use nalgebra::Point3;
use tracing::trace;

use crate::bsp2d::{IntersectionType, PointClassification};
use crate::cuttable::Cuttable;
use crate::error::Result;
use crate::plane::Plane3D;
use crate::polygon::{IntersectFlags, Polygon, SeparationMode};
use crate::tolerance::{self, Real};

use super::PolygonPartitions;

/// A node in the 3D BSP tree.
///
/// Each node partitions space using a splitting plane and stores the
/// polygons lying on that plane. Polygons in front of or behind the plane
/// are stored in the respective child subtrees.
///
/// # Coplanar Polygon Storage
///
/// Coplanar polygons are separated by their facing direction relative to
/// the splitting plane's normal:
/// - `coplanar_front`: polygons facing the same way as the plane
/// - `coplanar_back`: polygons facing the opposite way
///
/// Overlapping polygons of the same facing are unioned when they are added.
#[derive(Debug, Clone)]
pub struct BspNode3D {
    /// The splitting plane for this node.
    plane: Plane3D,

    /// Polygons on the plane, facing the SAME direction as its normal.
    coplanar_front: Vec<Polygon>,

    /// Polygons on the plane, facing the OPPOSITE direction.
    coplanar_back: Vec<Polygon>,

    /// Subtree in FRONT of the splitting plane (outside the solid).
    front: Option<Box<BspNode3D>>,

    /// Subtree BEHIND the splitting plane (inside the solid).
    back: Option<Box<BspNode3D>>,
}

impl BspNode3D {
    /// Creates a node with no coplanar polygons and no children.
    pub fn new(plane: Plane3D) -> Self {
        Self {
            plane,
            coplanar_front: Vec::new(),
            coplanar_back: Vec::new(),
            front: None,
            back: None,
        }
    }

    #[inline]
    pub fn plane(&self) -> &Plane3D {
        &self.plane
    }

    #[inline]
    pub fn coplanar_front(&self) -> &[Polygon] {
        &self.coplanar_front
    }

    #[inline]
    pub fn coplanar_back(&self) -> &[Polygon] {
        &self.coplanar_back
    }

    /// All coplanar polygons at this node, front facing first.
    pub fn all_coplanar(&self) -> impl Iterator<Item = &Polygon> {
        self.coplanar_front.iter().chain(self.coplanar_back.iter())
    }

    #[inline]
    pub fn front(&self) -> Option<&BspNode3D> {
        self.front.as_deref()
    }

    #[inline]
    pub fn back(&self) -> Option<&BspNode3D> {
        self.back.as_deref()
    }

    #[inline]
    pub fn set_front(&mut self, node: Option<BspNode3D>) {
        self.front = node.map(Box::new);
    }

    #[inline]
    pub fn set_back(&mut self, node: Option<BspNode3D>) {
        self.back = node.map(Box::new);
    }

    /// Whether `polygon` lies on this node's plane in either facing.
    pub fn is_coplanar(&self, polygon: &Polygon) -> bool {
        polygon.plane().is_equivalent(&self.plane) || polygon.plane().is_inverted(&self.plane)
    }

    /// Adds a polygon lying on the plane, unioning it into an overlapping
    /// member of the same facing when there is one.
    pub fn add_coplanar(&mut self, polygon: Polygon) {
        let list = if polygon.plane().is_same_facing(&self.plane) {
            &mut self.coplanar_front
        } else {
            &mut self.coplanar_back
        };

        let overlapping = list
            .iter()
            .position(|member| Polygon::intersection_type(member, &polygon) == IntersectionType::Intersection);
        if let Some(i) = overlapping {
            match list[i].clone_preserving_guid().union(&polygon) {
                Ok(merged) if merged.is_valid() => {
                    list[i] = merged;
                    return;
                }
                Ok(_) => {}
                Err(err) => trace!(%err, "keeping coplanar polygons apart"),
            }
        }
        list.push(polygon);
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.front.is_none() && self.back.is_none()
    }

    /// Number of polygons in this subtree.
    pub fn polygon_count(&self) -> usize {
        let own = self.coplanar_front.len() + self.coplanar_back.len();
        own + self.front.as_ref().map_or(0, |n| n.polygon_count()) + self.back.as_ref().map_or(0, |n| n.polygon_count())
    }

    /// Returns the depth of this subtree (1 for a leaf node).
    pub fn depth(&self) -> usize {
        let front_depth = self.front.as_ref().map_or(0, |n| n.depth());
        let back_depth = self.back.as_ref().map_or(0, |n| n.depth());
        1 + front_depth.max(back_depth)
    }

    pub(super) fn collect_polygons(&self, out: &mut Vec<Polygon>) {
        out.extend(self.all_coplanar().map(Polygon::clone_preserving_guid));
        if let Some(front) = &self.front {
            front.collect_polygons(out);
        }
        if let Some(back) = &self.back {
            back.collect_polygons(out);
        }
    }

    pub(super) fn classify_point(&self, point: &Point3<Real>) -> PointClassification {
        let d = self.plane.signed_distance(point);
        let eps = tolerance::epsilon();
        let front = || {
            self.front
                .as_ref()
                .map_or(PointClassification::Outside, |n| n.classify_point(point))
        };
        let back = || {
            self.back
                .as_ref()
                .map_or(PointClassification::Inside, |n| n.classify_point(point))
        };

        if d > eps {
            return front();
        }
        if d < -eps {
            return back();
        }
        if self.all_coplanar().any(|member| member.include_point(point)) {
            return PointClassification::Border;
        }
        match (front(), back()) {
            (f, b) if f == b => f,
            _ => PointClassification::Border,
        }
    }

    /// Pushes a polygon through this subtree, sorting its fragments into `out`.
    pub(super) fn partition(&self, polygon: Polygon, out: &mut PolygonPartitions) -> Result<()> {
        if self.is_coplanar(&polygon) {
            return self.partition_coplanar(polygon, out);
        }
        let parts = polygon.cut(&self.plane)?;
        for piece in parts.front {
            self.send_front(piece, out)?;
        }
        for piece in parts.back {
            self.send_back(piece, out)?;
        }
        Ok(())
    }

    /// Overlaps with members become coincident fragments; whatever no member
    /// covers continues on the front side.
    fn partition_coplanar(&self, polygon: Polygon, out: &mut PolygonPartitions) -> Result<()> {
        let mut remainder = polygon;
        for member in self.all_coplanar() {
            if !remainder.is_valid() {
                return Ok(());
            }
            if Polygon::intersection_type(member, &remainder) != IntersectionType::Intersection {
                continue;
            }

            let same_facing = remainder.plane().is_same_facing(member.plane());
            let overlap = remainder
                .clone_preserving_guid()
                .intersect(member, IntersectFlags::default())?;
            if overlap.is_valid() {
                let pieces = overlap.separated_polygons(SeparationMode::Together)?;
                if same_facing {
                    out.co_same.extend(pieces);
                } else {
                    out.co_diff.extend(pieces);
                }
            }
            remainder = remainder.subtract(member)?;
        }

        if remainder.is_valid() {
            for piece in remainder.separated_polygons(SeparationMode::Together)? {
                self.send_front(piece, out)?;
            }
        }
        Ok(())
    }

    fn send_front(&self, polygon: Polygon, out: &mut PolygonPartitions) -> Result<()> {
        match &self.front {
            Some(child) => child.partition(polygon, out),
            None => {
                out.positive.push(polygon);
                Ok(())
            }
        }
    }

    fn send_back(&self, polygon: Polygon, out: &mut PolygonPartitions) -> Result<()> {
        match &self.back {
            Some(child) => child.partition(polygon, out),
            None => {
                out.negative.push(polygon);
                Ok(())
            }
        }
    }
}
