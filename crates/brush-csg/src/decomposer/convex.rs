//! Hertel-Mehlhorn merging of triangles into convex pieces.

use std::collections::HashMap;

use nalgebra::Point2;

use crate::error::{CsgError, Result};
use crate::tolerance::{self, Real};

use super::turn;

/// Merges triangles across shared edges while the union stays convex.
pub(super) fn merge_triangles(
    points: &[Point2<Real>],
    triangles: &[[usize; 3]],
    limit: usize,
) -> Result<Vec<Vec<usize>>> {
    let mut pieces: Vec<Option<Vec<usize>>> = triangles.iter().map(|t| Some(t.to_vec())).collect();
    let mut owner: HashMap<(usize, usize), usize> = HashMap::new();
    for (i, piece) in pieces.iter().enumerate() {
        if let Some(piece) = piece {
            for edge in loop_edges(piece) {
                owner.insert(edge, i);
            }
        }
    }

    for _ in 0..limit {
        let Some((i, j, merged)) = find_merge(points, &pieces, &owner) else {
            return Ok(pieces.into_iter().flatten().map(|p| drop_straight(points, p)).collect());
        };
        if let Some(gone) = pieces[j].take() {
            for edge in loop_edges(&gone) {
                owner.remove(&edge);
            }
        }
        if let Some(old) = &pieces[i] {
            for edge in loop_edges(old) {
                owner.remove(&edge);
            }
        }
        for edge in loop_edges(&merged) {
            owner.insert(edge, i);
        }
        pieces[i] = Some(merged);
    }
    Err(CsgError::IterationLimit { limit })
}

fn loop_edges(piece: &[usize]) -> impl Iterator<Item = (usize, usize)> + '_ {
    (0..piece.len()).map(move |k| (piece[k], piece[(k + 1) % piece.len()]))
}

/// The first pair of pieces sharing an edge whose union is convex.
fn find_merge(
    points: &[Point2<Real>],
    pieces: &[Option<Vec<usize>>],
    owner: &HashMap<(usize, usize), usize>,
) -> Option<(usize, usize, Vec<usize>)> {
    for (i, piece) in pieces.iter().enumerate() {
        let Some(piece) = piece else { continue };
        for (a, b) in loop_edges(piece) {
            let Some(&j) = owner.get(&(b, a)) else { continue };
            if j == i {
                continue;
            }
            let Some(other) = &pieces[j] else { continue };
            let merged = join(piece, other, a, b);
            if is_convex(points, &merged) {
                return Some((i, j, merged));
            }
        }
    }
    None
}

/// Joins `p` (holding `a → b`) and `q` (holding `b → a`) along that edge.
fn join(p: &[usize], q: &[usize], a: usize, b: usize) -> Vec<usize> {
    let rotate = |piece: &[usize], first: usize| -> Vec<usize> {
        let at = piece.iter().position(|&v| v == first).unwrap_or(0);
        piece[at..].iter().chain(&piece[..at]).copied().collect()
    };
    let mut merged = rotate(p, b);
    let q = rotate(q, a);
    merged.extend_from_slice(&q[1..q.len() - 1]);
    merged
}

fn is_convex(points: &[Point2<Real>], piece: &[usize]) -> bool {
    let n = piece.len();
    let mut sorted = piece.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != n {
        return false;
    }
    let eps = tolerance::epsilon();
    (0..n).all(|k| {
        let (p, v, q) = (points[piece[(k + n - 1) % n]], points[piece[k]], points[piece[(k + 1) % n]]);
        turn(&p, &v, &q) >= -eps * (v - p).norm() * (q - v).norm()
    })
}

fn drop_straight(points: &[Point2<Real>], mut piece: Vec<usize>) -> Vec<usize> {
    let eps = tolerance::epsilon();
    let mut k = 0;
    while piece.len() > 3 && k < piece.len() {
        let n = piece.len();
        let (p, v, q) = (points[piece[(k + n - 1) % n]], points[piece[k]], points[piece[(k + 1) % n]]);
        if turn(&p, &v, &q).abs() <= eps * (v - p).norm() * (q - v).norm() {
            piece.remove(k);
        } else {
            k += 1;
        }
    }
    piece
}
