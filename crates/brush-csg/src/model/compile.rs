//! Whole-brush booleans compiled through the 3D face tree.
//!
//! Each brush is partitioned against the other brush's tree. The operation
//! decides which fragment lists survive and whether the other brush's
//! fragments turn around before the result is merged again.

use tracing::{debug, instrument, warn};

use crate::bsp3d::{BspTree3D, PolygonPartitions};
use crate::error::Result;
use crate::polygon::Polygon;

use super::Model;

/// Boolean operations between two closed brushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperation {
    Union,
    Subtract,
    Intersect,
    /// Keeps the part of the receiver outside the other brush, without
    /// closing the result.
    ClipInside,
    /// Keeps the part of the receiver inside the other brush, without
    /// closing the result.
    ClipOutside,
}

/// Which fragment lists survive, and whether they turn around.
#[derive(Debug, Clone, Copy, Default)]
struct Keep {
    positive: bool,
    negative: bool,
    co_same: bool,
    co_diff: bool,
    flip: bool,
}

impl Keep {
    fn take(self, parts: PolygonPartitions, out: &mut Vec<Polygon>) {
        let lists = [
            (self.positive, parts.positive),
            (self.negative, parts.negative),
            (self.co_same, parts.co_same),
            (self.co_diff, parts.co_diff),
        ];
        for (kept, polygons) in lists {
            if !kept {
                continue;
            }
            for polygon in polygons {
                out.push(if self.flip { polygon.flipped() } else { polygon });
            }
        }
    }
}

impl BooleanOperation {
    /// What to keep of the receiver against the other tree, and of the
    /// other brush against the receiver's tree.
    fn keeps(self) -> (Keep, Option<Keep>) {
        use BooleanOperation::*;
        match self {
            Union => (
                Keep { positive: true, co_same: true, ..Keep::default() },
                Some(Keep { positive: true, ..Keep::default() }),
            ),
            Subtract => (
                Keep { positive: true, co_diff: true, ..Keep::default() },
                Some(Keep { negative: true, flip: true, ..Keep::default() }),
            ),
            Intersect => (
                Keep { negative: true, co_same: true, ..Keep::default() },
                Some(Keep { negative: true, ..Keep::default() }),
            ),
            ClipInside => (Keep { positive: true, co_same: true, ..Keep::default() }, None),
            ClipOutside => (Keep { negative: true, co_diff: true, ..Keep::default() }, None),
        }
    }
}

impl Model {
    /// Combines two brushes whose faces point outward.
    ///
    /// The surviving fragments are merged back into as few polygons as
    /// possible. Faces that cannot be partitioned are dropped with a warning.
    #[instrument(skip_all, fields(op = ?op, a = self.polygons.len(), b = other.polygons.len()))]
    pub fn boolean(&self, other: &Model, op: BooleanOperation) -> Result<Model> {
        let (keep_mine, keep_theirs) = op.keeps();
        let mine = brush_tree(self);
        let theirs = brush_tree(other);

        let mut result = Vec::new();
        collect(&self.polygons, &theirs, keep_mine, &mut result);
        if let Some(keep_theirs) = keep_theirs {
            collect(&other.polygons, &mine, keep_theirs, &mut result);
        }
        debug!(fragments = result.len(), "compiled brushes");

        let mut model = Model::new();
        model.reset_from_list(result)?;
        Ok(model)
    }
}

fn brush_tree(model: &Model) -> BspTree3D {
    let tree = BspTree3D::from_polygons(model.polygons.iter().map(Polygon::clone_preserving_guid).collect());
    if !tree.is_valid() {
        warn!(polygons = model.polygons.len(), "brush tree is invalid");
    }
    tree
}

fn collect(polygons: &[Polygon], tree: &BspTree3D, keep: Keep, out: &mut Vec<Polygon>) {
    for polygon in polygons {
        if !polygon.is_valid() || polygon.is_open() {
            continue;
        }
        match tree.partitions(polygon) {
            Ok(parts) => keep.take(parts, out),
            Err(err) => warn!(%err, guid = %polygon.guid(), "face could not be partitioned"),
        }
    }
}
