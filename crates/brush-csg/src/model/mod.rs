//! A brush: the list of polygons bounding one solid.
//!
//! Polygons enter a model through [`Model::add_polygon`], which combines
//! the newcomer with the coplanar polygons already present according to an
//! [`OperationType`]. Whole models are combined with [`Model::boolean`] and
//! cut with [`Model::clip`].

mod clip;
mod compile;

use tracing::{debug, instrument, warn};

use crate::bound_box::BoundBox;
use crate::bsp2d::IntersectionType;
use crate::error::{CsgError, Result};
use crate::polygon::{IntersectFlags, Polygon, SeparationMode};
use crate::tolerance::BOUND_BOX_SLACK;

pub use clip::{ModelClip, generate_polygons_from_edge_list};
pub use compile::BooleanOperation;

/// How a polygon added to a model combines with the coplanar polygons
/// already there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    /// Appended as is.
    Add,
    /// Merged with every polygon it overlaps or touches.
    Union,
    /// Carved out of the polygons it overlaps.
    SubtractAB,
    /// Added minus the polygons it overlaps.
    SubtractBA,
    /// Existing polygons are cut down to their overlap with it.
    Intersection,
    /// Overlapping polygons are cut along its outline, keeping every piece.
    Split,
    ExclusiveOR,
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    polygons: Vec<Polygon>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps polygons without combining them.
    pub fn from_polygons(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn into_polygons(self) -> Vec<Polygon> {
        self.polygons
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn clear(&mut self) {
        self.polygons.clear();
    }

    pub fn bound_box(&self) -> Option<BoundBox> {
        self.polygons
            .iter()
            .filter_map(Polygon::bound_box)
            .reduce(|a, b| a.merged(&b))
    }

    /// Rebuilds the model by unioning every polygon of `polygons` in turn.
    ///
    /// A polygon whose union fails is appended unmerged.
    pub fn reset_from_list(&mut self, polygons: Vec<Polygon>) -> Result<()> {
        self.clear();
        for polygon in polygons {
            if !polygon.is_valid() {
                continue;
            }
            if let Err(err) = self.add_polygon(polygon.clone_preserving_guid(), OperationType::Union) {
                warn!(%err, guid = %polygon.guid(), "union failed, adding polygon unmerged");
                self.add_polygon(polygon, OperationType::Add)?;
            }
        }
        Ok(())
    }

    /// Combines `polygon` with the model.
    ///
    /// Only closed polygons on the same plane, with the same mirrored flag
    /// and whose bound boxes come within a small slack of the newcomer take
    /// part. Open polygons are always appended. The model is left untouched
    /// when an error is returned.
    #[instrument(skip_all, fields(op = ?op, polygons = self.polygons.len()))]
    pub fn add_polygon(&mut self, polygon: Polygon, op: OperationType) -> Result<()> {
        if !polygon.is_valid() {
            return Err(CsgError::InvalidPolygon);
        }
        if op == OperationType::Add || polygon.is_open() {
            let mut polygon = polygon;
            polygon.update_uvs();
            self.polygons.push(polygon);
            return Ok(());
        }

        let (removed, added) = match op {
            OperationType::Add => (Vec::new(), vec![polygon]),
            OperationType::Union => self.union_with(polygon)?,
            OperationType::SubtractAB => self.subtract_from_model(polygon)?,
            OperationType::SubtractBA => self.subtract_model_from(polygon)?,
            OperationType::Intersection => self.intersect_with(polygon)?,
            OperationType::Split => self.split_by(polygon)?,
            OperationType::ExclusiveOR => self.exclusive_or_with(polygon)?,
        };
        self.commit(&removed, added)?;
        debug!(polygons = self.polygons.len(), "added polygon");
        Ok(())
    }

    /// Appends a polygon, split into one polygon per outer loop.
    pub fn add_polygon_separately(&mut self, polygon: Polygon) -> Result<()> {
        self.commit(&[], vec![polygon])
    }

    /// Removes the polygons at `removed` and appends `added`, each split
    /// into its separate regions. Nothing changes if splitting fails.
    fn commit(&mut self, removed: &[usize], added: Vec<Polygon>) -> Result<()> {
        let mut pieces = Vec::new();
        for polygon in added {
            pieces.extend(separate(polygon)?);
        }

        let mut removed = removed.to_vec();
        removed.sort_unstable();
        removed.dedup();
        for &i in removed.iter().rev() {
            self.polygons.remove(i);
        }
        for mut piece in pieces {
            piece.update_uvs();
            self.polygons.push(piece);
        }
        Ok(())
    }

    /// Indices of the closed polygons `polygon` may interact with.
    fn candidates(&self, polygon: &Polygon) -> Vec<usize> {
        let Some(reach) = polygon.bound_box().map(|b| b.expanded(BOUND_BOX_SLACK)) else {
            return Vec::new();
        };
        self.polygons
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                !p.is_open()
                    && p.flags().mirrored == polygon.flags().mirrored
                    && p.plane().is_equivalent(polygon.plane())
                    && p.bound_box().is_some_and(|b| reach.intersects(&b))
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn union_with(&self, polygon: Polygon) -> Result<(Vec<usize>, Vec<Polygon>)> {
        let touching: Vec<usize> = self
            .candidates(&polygon)
            .into_iter()
            .filter(|&i| Polygon::intersection_type(&self.polygons[i], &polygon) != IntersectionType::None)
            .collect();

        let mut merged = polygon;
        for &i in &touching {
            merged = merged.union(&self.polygons[i])?;
        }
        if !merged.is_valid() || merged.is_open() {
            return Err(CsgError::InvalidPolygon);
        }
        Ok((touching, vec![merged]))
    }

    /// The newcomer is only added when no polygon is near enough to carve.
    fn subtract_from_model(&self, polygon: Polygon) -> Result<(Vec<usize>, Vec<Polygon>)> {
        let candidates = self.candidates(&polygon);
        if candidates.is_empty() {
            return Ok((Vec::new(), vec![polygon]));
        }
        let mut carved = Vec::with_capacity(candidates.len());
        for &i in &candidates {
            carved.push(carve(self.polygons[i].clone_preserving_guid(), &polygon)?);
        }
        Ok((candidates, carved))
    }

    fn subtract_model_from(&self, polygon: Polygon) -> Result<(Vec<usize>, Vec<Polygon>)> {
        let mut remainder = polygon;
        for i in self.candidates(&remainder) {
            if !remainder.is_valid() {
                break;
            }
            remainder = carve(remainder, &self.polygons[i])?;
        }
        Ok((Vec::new(), vec![remainder]))
    }

    fn intersect_with(&self, polygon: Polygon) -> Result<(Vec<usize>, Vec<Polygon>)> {
        let candidates = self.candidates(&polygon);
        if candidates.is_empty() {
            return Ok((Vec::new(), vec![polygon]));
        }
        let mut kept = Vec::with_capacity(candidates.len());
        for &i in &candidates {
            kept.push(
                self.polygons[i]
                    .clone_preserving_guid()
                    .intersect(&polygon, IntersectFlags::default())?,
            );
        }
        Ok((candidates, kept))
    }

    fn split_by(&self, polygon: Polygon) -> Result<(Vec<usize>, Vec<Polygon>)> {
        let spanned = self.overlapping(&polygon);
        if spanned.is_empty() {
            return Ok((Vec::new(), vec![polygon]));
        }

        let mut pieces = Vec::new();
        let mut entered = polygon.clone_preserving_guid();
        for &i in &spanned {
            let existing = &self.polygons[i];
            entered = carve(entered, existing)?;
            pieces.push(carve(existing.clone(), &polygon)?);
            pieces.push(existing.clone().intersect(&polygon, IntersectFlags::default())?);
        }
        pieces.push(entered);
        Ok((spanned, pieces))
    }

    fn exclusive_or_with(&self, polygon: Polygon) -> Result<(Vec<usize>, Vec<Polygon>)> {
        let mut overlapped = Vec::new();
        let mut touched = Vec::new();
        for i in self.candidates(&polygon) {
            let existing = &self.polygons[i];
            match Polygon::intersection_type(existing, &polygon) {
                IntersectionType::Intersection => overlapped.push(i),
                IntersectionType::JustTouch if existing.has_bridge_edges() => overlapped.push(i),
                IntersectionType::JustTouch => touched.push(i),
                IntersectionType::None => {}
            }
        }

        if overlapped.is_empty() {
            let mut merged = polygon;
            for &i in &touched {
                merged = merged.union(&self.polygons[i])?;
            }
            return Ok((touched, vec![merged]));
        }

        // Whatever only the newcomer covers ends up facing the other way.
        if let [i] = overlapped[..] {
            let existing = &self.polygons[i];
            if polygon.include_all_edges(existing) {
                let rest = carve(polygon, existing)?;
                return Ok((overlapped, vec![rest.flipped()]));
            }
        }

        let mut added = Vec::new();
        for &i in &overlapped {
            let existing = &self.polygons[i];
            if polygon.include_all_edges(existing) {
                continue;
            }
            let mut input = polygon.clone();
            for &k in overlapped.iter().filter(|&&k| k != i) {
                input = carve(input, &self.polygons[k])?;
            }
            added.push(carve(existing.clone_preserving_guid(), &input)?);
            let input = carve(input, existing)?;
            if input.is_valid() {
                added.push(input.flipped());
            }
        }
        Ok((overlapped, added))
    }

    fn overlapping(&self, polygon: &Polygon) -> Vec<usize> {
        self.candidates(polygon)
            .into_iter()
            .filter(|&i| Polygon::intersection_type(&self.polygons[i], polygon) == IntersectionType::Intersection)
            .collect()
    }
}

/// `target` minus `by`, or `target` untouched when either one is empty.
fn carve(target: Polygon, by: &Polygon) -> Result<Polygon> {
    if target.is_valid() && by.is_valid() {
        target.subtract(by)
    } else {
        Ok(target)
    }
}

/// One polygon per outer loop, holes attached; open polygons stay whole.
fn separate(polygon: Polygon) -> Result<Vec<Polygon>> {
    if !polygon.is_valid() {
        return Ok(Vec::new());
    }
    if polygon.is_open() {
        return Ok(vec![polygon]);
    }
    let separated = polygon.separated_polygons(SeparationMode::Together)?;
    if separated.len() >= 2 {
        Ok(separated)
    } else {
        Ok(vec![polygon])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::test_shapes::*;
    use crate::polygon::PolygonFlags;
    use approx::assert_relative_eq;

    fn model_area(model: &Model) -> crate::tolerance::Real {
        area(model.polygons())
    }

    #[test]
    fn add_appends_without_merging() {
        let mut model = Model::new();
        model.add_polygon(make_square(0.0, 0.0, 2.0), OperationType::Add).unwrap();
        model.add_polygon(make_square(1.0, 1.0, 2.0), OperationType::Add).unwrap();
        assert_eq!(model.polygon_count(), 2);
    }

    #[test]
    fn union_merges_adjacent_squares() {
        let mut model = Model::new();
        model.add_polygon(make_square(0.0, 0.0, 1.0), OperationType::Union).unwrap();
        model.add_polygon(make_square(1.0, 0.0, 1.0), OperationType::Union).unwrap();
        assert_eq!(model.polygon_count(), 1);
        assert_eq!(model.polygons()[0].edge_count(), 4);
        assert_relative_eq!(model_area(&model), 2.0, epsilon = 1e-9);

        model.add_polygon(make_square(5.0, 5.0, 1.0), OperationType::Union).unwrap();
        assert_eq!(model.polygon_count(), 2);
    }

    #[test]
    fn union_respects_mirrored_flag() {
        let mut model = Model::new();
        model.add_polygon(make_square(0.0, 0.0, 2.0), OperationType::Union).unwrap();
        let mut mirrored = make_square(1.0, 0.0, 2.0);
        mirrored.set_flags(PolygonFlags {
            mirrored: true,
            ..PolygonFlags::default()
        });
        model.add_polygon(mirrored, OperationType::Union).unwrap();
        assert_eq!(model.polygon_count(), 2);
    }

    #[test]
    fn subtract_ab_carves_existing_polygons() {
        let mut model = Model::new();
        model.add_polygon(make_square(0.0, 0.0, 4.0), OperationType::Add).unwrap();
        model.add_polygon(make_square(1.0, 1.0, 2.0), OperationType::SubtractAB).unwrap();
        assert_eq!(model.polygon_count(), 1);
        assert_relative_eq!(model_area(&model), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn subtract_ab_without_overlap_adds_the_polygon() {
        let mut model = Model::new();
        model.add_polygon(make_square(0.0, 0.0, 1.0), OperationType::Add).unwrap();
        model.add_polygon(make_square(3.0, 0.0, 1.0), OperationType::SubtractAB).unwrap();
        assert_eq!(model.polygon_count(), 2);
    }

    #[test]
    fn subtract_ab_next_to_a_polygon_adds_nothing() {
        let mut model = Model::new();
        model.add_polygon(make_square(0.0, 0.0, 1.0), OperationType::Add).unwrap();
        model.add_polygon(make_square(1.0, 0.0, 1.0), OperationType::SubtractAB).unwrap();
        assert_eq!(model.polygon_count(), 1);
        assert_relative_eq!(model_area(&model), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn subtract_ba_keeps_what_the_model_does_not_cover() {
        let mut model = Model::new();
        model.add_polygon(make_square(0.0, 0.0, 2.0), OperationType::Add).unwrap();
        model.add_polygon(make_square(1.0, 0.0, 2.0), OperationType::SubtractBA).unwrap();
        assert_eq!(model.polygon_count(), 2);
        assert_relative_eq!(model_area(&model), 4.0 + 2.0, epsilon = 1e-9);
    }

    #[test]
    fn intersection_cuts_existing_polygons_down() {
        let mut model = Model::new();
        model.add_polygon(make_square(0.0, 0.0, 2.0), OperationType::Add).unwrap();
        model.add_polygon(make_square(1.0, 1.0, 2.0), OperationType::Intersection).unwrap();
        assert_eq!(model.polygon_count(), 1);
        assert_relative_eq!(model_area(&model), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn split_keeps_every_piece() {
        let mut model = Model::new();
        model.add_polygon(make_square(0.0, 0.0, 2.0), OperationType::Add).unwrap();
        model.add_polygon(make_square(1.0, 0.0, 2.0), OperationType::Split).unwrap();
        assert_eq!(model.polygon_count(), 3);
        assert_relative_eq!(model_area(&model), 6.0, epsilon = 1e-9);
    }

    fn facing(model: &Model, up: bool) -> Vec<Polygon> {
        model
            .polygons()
            .iter()
            .filter(|p| (p.plane().normal().z > 0.0) == up)
            .cloned()
            .collect()
    }

    #[test]
    fn exclusive_or_turns_the_newcomers_share_around() {
        let mut model = Model::new();
        model.add_polygon(make_square(0.0, 0.0, 2.0), OperationType::Add).unwrap();
        model.add_polygon(make_square(1.0, 1.0, 2.0), OperationType::ExclusiveOR).unwrap();
        assert_eq!(model.polygon_count(), 2);

        let up = facing(&model, true);
        let down = facing(&model, false);
        assert_eq!((up.len(), down.len()), (1, 1));
        assert_relative_eq!(area(&up), 3.0, epsilon = 1e-9);
        assert_relative_eq!(area(&down), 3.0, epsilon = 1e-9);
        assert!(down[0].bound_box().unwrap().max.x > 2.5);
    }

    #[test]
    fn exclusive_or_around_an_enclosed_polygon_leaves_a_flipped_ring() {
        let mut model = Model::new();
        model.add_polygon(make_square(1.0, 1.0, 2.0), OperationType::Add).unwrap();
        model.add_polygon(make_square(0.0, 0.0, 4.0), OperationType::ExclusiveOR).unwrap();
        assert_eq!(model.polygon_count(), 1);
        assert!(facing(&model, true).is_empty());
        assert_relative_eq!(model_area(&model), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn exclusive_or_with_an_identical_polygon_removes_it() {
        let mut model = Model::new();
        model.add_polygon(make_square(0.0, 0.0, 2.0), OperationType::Add).unwrap();
        model.add_polygon(make_square(0.0, 0.0, 2.0), OperationType::ExclusiveOR).unwrap();
        assert!(model.is_empty());
    }

    #[test]
    fn exclusive_or_of_touching_polygons_unions_them() {
        let mut model = Model::new();
        model.add_polygon(make_square(0.0, 0.0, 1.0), OperationType::Add).unwrap();
        model.add_polygon(make_square(1.0, 0.0, 1.0), OperationType::ExclusiveOR).unwrap();
        assert_eq!(model.polygon_count(), 1);
        assert_relative_eq!(model_area(&model), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn separated_polygons_are_added_one_by_one() {
        let mut model = Model::new();
        let mut pair = make_square(0.0, 0.0, 1.0);
        pair.attach(&make_square(3.0, 0.0, 1.0));
        model.add_polygon_separately(pair).unwrap();
        assert_eq!(model.polygon_count(), 2);
    }

    #[test]
    fn reset_from_list_unions_coplanar_pieces() {
        let mut model = Model::new();
        model
            .reset_from_list(vec![
                rect(0.0, 0.0, 1.0, 1.0),
                rect(1.0, 0.0, 2.0, 1.0),
                rect(0.0, 1.0, 2.0, 2.0),
            ])
            .unwrap();
        assert_eq!(model.polygon_count(), 1);
        assert_eq!(model.polygons()[0].edge_count(), 4);
        let bbox = model.bound_box().unwrap();
        assert_relative_eq!(bbox.max.x, 2.0);
        assert_relative_eq!(bbox.max.y, 2.0);
    }

    #[test]
    fn invalid_polygon_is_rejected() {
        let mut model = Model::new();
        let empty = Polygon::empty(*make_square(0.0, 0.0, 1.0).plane());
        assert_eq!(
            model.add_polygon(empty, OperationType::Union).unwrap_err(),
            CsgError::InvalidPolygon
        );
        assert!(model.is_empty());
        assert!(model.bound_box().is_none());
    }
}
