//! Stack triangulation of a y-monotone piece.

use std::collections::HashSet;

use nalgebra::Point2;

use crate::tolerance::Real;

use super::monotone::{is_above, sweep_order};
use super::{push_triangle, turn};

/// Triangulates one counter-clockwise monotone loop into `out`.
pub(super) fn triangulate_monotone(points: &[Point2<Real>], piece: &[usize], out: &mut Vec<[usize; 3]>) {
    let n = piece.len();
    if n < 3 {
        return;
    }
    if n == 3 {
        push_triangle(points, out, [piece[0], piece[1], piece[2]]);
        return;
    }

    let top_at = (0..n)
        .min_by(|&a, &b| sweep_order(points)(&piece[a], &piece[b]))
        .unwrap_or(0);
    let bottom = piece
        .iter()
        .copied()
        .max_by(|a, b| sweep_order(points)(a, b))
        .unwrap_or(piece[0]);

    // Walking forward from the top runs down the left chain.
    let mut left = HashSet::new();
    for k in 1..n {
        let v = piece[(top_at + k) % n];
        if v == bottom {
            break;
        }
        left.insert(v);
    }

    let mut sorted = piece.to_vec();
    sorted.sort_by(sweep_order(points));

    // A diagonal from `u` back to `top` stays inside when the boundary
    // turns left at `last`.
    let fits = |u: usize, last: usize, top: usize| {
        if left.contains(&u) {
            turn(&points[top], &points[last], &points[u]) > 0.0
        } else {
            turn(&points[u], &points[last], &points[top]) > 0.0
        }
    };

    let mut stack = vec![sorted[0], sorted[1]];
    for &u in &sorted[2..n - 1] {
        let top = stack[stack.len() - 1];
        if left.contains(&u) != left.contains(&top) {
            for pair in stack.windows(2) {
                push_triangle(points, out, [u, pair[0], pair[1]]);
            }
            stack = vec![top, u];
        } else {
            let mut last = top;
            stack.pop();
            while let Some(&below) = stack.last() {
                if !fits(u, last, below) {
                    break;
                }
                push_triangle(points, out, [u, last, below]);
                last = below;
                stack.pop();
            }
            stack.push(last);
            stack.push(u);
        }
    }

    let u = sorted[n - 1];
    debug_assert!(!is_above(points, u, sorted[n - 2]));
    for pair in stack.windows(2) {
        push_triangle(points, out, [u, pair[0], pair[1]]);
    }
}
