//! Cutting a model by a plane, with an optional cap over the cut.
//!
//! The cap is rebuilt from the edges the cut leaves on the plane: they are
//! chained into loops and loops enclosed by larger ones become holes.

use nalgebra::Point3;
use tracing::{debug, instrument, warn};

use crate::cuttable::Cuttable;
use crate::edge::Edge3D;
use crate::error::{CsgError, Result};
use crate::plane::Plane3D;
use crate::polygon::Polygon;
use crate::tolerance::{self, LOOP_ITERATION_LIMIT, Real};

use super::Model;

/// The two halves of a model cut by a plane.
#[derive(Debug, Clone, Default)]
pub struct ModelClip {
    pub front: Model,
    pub back: Model,
    /// The cut was asked to be capped but the cut edges did not close.
    pub fill_failed: bool,
}

impl Model {
    /// Cuts every polygon by `plane`.
    ///
    /// With `fill_facet` the opening left on each half is capped. The cap
    /// faces along the plane normal on the back half and against it on the
    /// front half. A polygon that fails to cut is skipped with a warning.
    #[instrument(skip_all, fields(polygons = self.polygons.len(), fill_facet))]
    pub fn clip(&self, plane: &Plane3D, fill_facet: bool) -> Result<ModelClip> {
        let mut front = Vec::new();
        let mut back = Vec::new();
        let mut cut_edges = Vec::new();

        for polygon in &self.polygons {
            let cut = if polygon.has_bridge_edges() {
                polygon.without_bridge_edges().cut(plane)
            } else {
                polygon.cut(plane)
            };
            match cut {
                Ok(result) => {
                    front.extend(result.front);
                    back.extend(result.back);
                    cut_edges.extend(result.cut_edges);
                }
                Err(err) => warn!(%err, guid = %polygon.guid(), "polygon could not be clipped"),
            }
        }

        let mut fill_failed = false;
        if fill_facet && !cut_edges.is_empty() {
            match generate_polygons_from_edge_list(&cut_edges, plane) {
                Ok(facets) => {
                    for facet in facets {
                        front.push(facet.clone().flipped());
                        back.push(facet);
                    }
                }
                Err(err) => {
                    warn!(%err, edges = cut_edges.len(), "cut edges do not form a facet");
                    fill_failed = true;
                }
            }
        }

        if front.is_empty() && back.is_empty() {
            return Err(CsgError::ClipFailed);
        }
        debug!(front = front.len(), back = back.len(), "clipped model");
        Ok(ModelClip {
            front: Model::from_polygons(front),
            back: Model::from_polygons(back),
            fill_failed,
        })
    }
}

/// Chains loose edges lying on `plane` into polygons facing along it.
///
/// Loops contained in a larger loop become its holes.
pub fn generate_polygons_from_edge_list(edges: &[Edge3D], plane: &Plane3D) -> Result<Vec<Polygon>> {
    let mut remaining: Vec<Edge3D> = edges.iter().filter(|e| !e.is_point()).copied().collect();
    if remaining.is_empty() {
        return Err(CsgError::UnclosedLoop);
    }

    let mut loops = Vec::new();
    while let Some(first) = remaining.pop() {
        let chain = chain_loop(first, &mut remaining)?;
        if chain.len() < 3 {
            continue;
        }
        let polygon = Polygon::with_plane(chain.clone(), *plane);
        let polygon = if polygon.signed_area() < 0.0 {
            Polygon::with_plane(chain.into_iter().rev().collect(), *plane)
        } else {
            polygon
        };
        if polygon.is_valid() {
            loops.push(polygon);
        }
    }

    loops.sort_by(|a, b| b.signed_area().total_cmp(&a.signed_area()));
    let mut consumed = vec![false; loops.len()];
    let mut result = Vec::new();
    for i in 0..loops.len() {
        if consumed[i] {
            continue;
        }
        let mut outer = loops[i].clone_preserving_guid();
        for j in i + 1..loops.len() {
            if !outer.is_valid() {
                break;
            }
            if !consumed[j] && outer.include_all_edges(&loops[j]) {
                outer = outer.subtract(&loops[j])?;
                consumed[j] = true;
            }
        }
        if outer.is_valid() {
            result.push(outer);
        }
    }
    Ok(result)
}

/// Follows edges head to tail from `first` until the chain closes,
/// reversing edges that run the wrong way.
fn chain_loop(first: Edge3D, remaining: &mut Vec<Edge3D>) -> Result<Vec<Point3<Real>>> {
    let start = first.v[0];
    let mut points = vec![start];
    let mut end = first.v[1];
    for _ in 0..LOOP_ITERATION_LIMIT {
        if tolerance::points_equivalent(&end, &start) {
            return Ok(points);
        }
        points.push(end);
        let next = remaining.iter().position(|e| {
            tolerance::points_equivalent(&e.v[0], &end) || tolerance::points_equivalent(&e.v[1], &end)
        });
        let Some(at) = next else {
            return Err(CsgError::UnclosedLoop);
        };
        let edge = remaining.swap_remove(at);
        end = if tolerance::points_equivalent(&edge.v[0], &end) {
            edge.v[1]
        } else {
            edge.v[0]
        };
    }
    Err(CsgError::IterationLimit {
        limit: LOOP_ITERATION_LIMIT,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp3d::test_solids::{cube, volume};
    use crate::polygon::test_shapes::area;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn square_edges(lo: Real, hi: Real) -> Vec<Edge3D> {
        let corners = [
            Point3::new(lo, lo, 0.0),
            Point3::new(hi, lo, 0.0),
            Point3::new(hi, hi, 0.0),
            Point3::new(lo, hi, 0.0),
        ];
        (0..4).map(|i| Edge3D::new(corners[i], corners[(i + 1) % 4])).collect()
    }

    #[test]
    fn clip_with_fill_closes_both_halves() {
        let model = Model::from_polygons(cube([0.0; 3], 2.0));
        let plane = Plane3D::new(Vector3::z(), 1.0);
        let clip = model.clip(&plane, true).unwrap();

        assert!(!clip.fill_failed);
        assert_eq!(clip.front.polygon_count(), 6);
        assert_eq!(clip.back.polygon_count(), 6);
        assert_relative_eq!(volume(clip.front.polygons()), 4.0, epsilon = 1e-6);
        assert_relative_eq!(volume(clip.back.polygons()), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn clip_without_fill_leaves_halves_open() {
        let model = Model::from_polygons(cube([0.0; 3], 2.0));
        let clip = model.clip(&Plane3D::new(Vector3::z(), 1.0), false).unwrap();
        assert_eq!(clip.front.polygon_count(), 5);
        assert_eq!(clip.back.polygon_count(), 5);
    }

    #[test]
    fn plane_missing_the_model_puts_everything_on_one_side() {
        let model = Model::from_polygons(cube([0.0; 3], 2.0));
        let clip = model.clip(&Plane3D::new(Vector3::z(), 5.0), true).unwrap();
        assert!(clip.front.is_empty());
        assert_eq!(clip.back.polygon_count(), 6);
        assert!(!clip.fill_failed);
    }

    #[test]
    fn clipping_an_empty_model_fails() {
        let err = Model::new().clip(&Plane3D::new(Vector3::z(), 0.0), true).unwrap_err();
        assert_eq!(err, CsgError::ClipFailed);
    }

    #[test]
    fn nested_loops_become_a_ring() {
        let mut edges = square_edges(0.0, 4.0);
        // Run the hole the other way round and out of order.
        edges.extend(square_edges(1.0, 3.0).into_iter().rev().map(|e| e.inverted()));
        let polygons = generate_polygons_from_edge_list(&edges, &Plane3D::new(Vector3::z(), 0.0)).unwrap();
        assert_eq!(polygons.len(), 1);
        assert_relative_eq!(area(&polygons), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn separate_loops_stay_separate() {
        let mut edges = square_edges(0.0, 1.0);
        edges.extend(square_edges(2.0, 3.0).iter().map(Edge3D::inverted));
        let polygons = generate_polygons_from_edge_list(&edges, &Plane3D::new(Vector3::z(), 0.0)).unwrap();
        assert_eq!(polygons.len(), 2);
        assert!(polygons.iter().all(|p| p.signed_area() > 0.0));
    }

    #[test]
    fn open_chain_is_rejected() {
        let mut edges = square_edges(0.0, 1.0);
        edges.pop();
        let err = generate_polygons_from_edge_list(&edges, &Plane3D::new(Vector3::z(), 0.0)).unwrap_err();
        assert_eq!(err, CsgError::UnclosedLoop);
        assert_eq!(
            generate_polygons_from_edge_list(&[], &Plane3D::new(Vector3::z(), 0.0)).unwrap_err(),
            CsgError::UnclosedLoop
        );
    }
}
