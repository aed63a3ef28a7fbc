//! Edge soup cleanup run after every boolean operation.

use std::collections::HashMap;

use nalgebra::Point3;

use crate::error::{CsgError, Result};
use crate::tolerance::{self, LOOP_ITERATION_LIMIT, Real};
use crate::vertex::{IndexEdge, Vertex};

/// Normalizes a vertex/edge soup in place.
///
/// 1. coordinates within epsilon of an earlier value are snapped to it
/// 2. self-loops and duplicate edges are dropped
/// 3. edges whose endpoints coincide are collapsed
/// 4. chains of collinear edges through plain vertices are merged
/// 5. unreferenced vertices are removed and every vertex tag is reset
///
/// Running it twice changes nothing the second time. An empty soup, or one
/// that collapses entirely, is a legitimate empty result and still returns
/// `Ok`; callers decide through `Polygon::is_valid` what emptiness means.
pub fn optimize(vertices: &mut Vec<Vertex>, edges: &mut Vec<IndexEdge>) -> Result<()> {
    snap_coordinates(vertices);
    remove_degenerate_edges(edges);
    collapse_point_edges(vertices, edges);
    remove_degenerate_edges(edges);
    flatten_edges(vertices, edges)?;
    compact_vertices(vertices, edges);
    for v in vertices.iter_mut() {
        v.id = 0;
    }
    Ok(())
}

fn snap_coordinates(vertices: &mut [Vertex]) {
    let mut seen: [Vec<Real>; 3] = Default::default();
    for v in vertices.iter_mut() {
        for axis in 0..3 {
            let value = v.pos[axis];
            let snapped = seen[axis].iter().copied().find(|&s| tolerance::is_equivalent(s, value));
            match snapped {
                Some(s) => v.pos[axis] = s,
                None => seen[axis].push(value),
            }
        }
    }
}

fn remove_degenerate_edges(edges: &mut Vec<IndexEdge>) {
    let mut kept: Vec<IndexEdge> = Vec::with_capacity(edges.len());
    for e in edges.drain(..) {
        if !e.is_self_loop() && !kept.contains(&e) {
            kept.push(e);
        }
    }
    *edges = kept;
}

/// Re-points every use of an edge's head to its tail when the two coincide.
fn collapse_point_edges(vertices: &[Vertex], edges: &mut Vec<IndexEdge>) {
    while let Some(i) = edges
        .iter()
        .position(|e| !e.is_self_loop() && tolerance::points_equivalent(&vertices[e.0].pos, &vertices[e.1].pos))
    {
        let IndexEdge(keep, gone) = edges.remove(i);
        for e in edges.iter_mut() {
            if e.0 == gone {
                e.0 = keep;
            }
            if e.1 == gone {
                e.1 = keep;
            }
        }
        edges.retain(|e| !e.is_self_loop());
    }
}

/// `b` sits on the segment from `a` to `c` and the chain keeps going forward.
fn continues_straight(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> bool {
    let ab = b - a;
    let bc = c - b;
    if ab.dot(&bc) <= 0.0 {
        return false;
    }
    let ac = c - a;
    let len_sq = ac.norm_squared();
    if len_sq < Real::EPSILON {
        return false;
    }
    let t = ab.dot(&ac) / len_sq;
    (a + ac * t - b).norm() < tolerance::epsilon()
}

/// Merges runs of collinear edges whose inner vertices have exactly one
/// incoming and one outgoing edge.
fn flatten_edges(vertices: &[Vertex], edges: &mut Vec<IndexEdge>) -> Result<()> {
    let mut outgoing: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut incoming: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.0).or_default().push(i);
        incoming.entry(e.1).or_default().push(i);
    }
    let single = |map: &HashMap<usize, Vec<usize>>, v: usize| match map.get(&v).map(Vec::as_slice) {
        Some([only]) => Some(*only),
        _ => None,
    };
    let plain = |v: usize| single(&incoming, v).zip(single(&outgoing, v));
    let pos = |i: usize| vertices[i].pos;

    let mut used = vec![false; edges.len()];
    let mut merged = Vec::with_capacity(edges.len());

    for i in 0..edges.len() {
        if used[i] {
            continue;
        }

        let mut first = i;
        for _ in 0..LOOP_ITERATION_LIMIT {
            let tail = edges[first].0;
            match plain(tail) {
                Some((prev, _))
                    if prev != i
                        && !used[prev]
                        && continues_straight(&pos(edges[prev].0), &pos(tail), &pos(edges[first].1)) =>
                {
                    first = prev
                }
                _ => break,
            }
        }

        let mut chain = vec![first];
        let mut last = first;
        for _ in 0..LOOP_ITERATION_LIMIT {
            let head = edges[last].1;
            match plain(head) {
                Some((_, next))
                    if next != first && continues_straight(&pos(edges[last].0), &pos(head), &pos(edges[next].1)) =>
                {
                    chain.push(next);
                    last = next;
                }
                _ => break,
            }
        }

        for &c in &chain {
            if used[c] {
                return Err(CsgError::EdgeReused);
            }
            used[c] = true;
        }
        merged.push(IndexEdge(edges[first].0, edges[last].1));
    }

    *edges = merged;
    Ok(())
}

fn compact_vertices(vertices: &mut Vec<Vertex>, edges: &mut [IndexEdge]) {
    let mut remap: HashMap<usize, usize> = HashMap::new();
    let mut compacted = Vec::new();
    for e in edges.iter_mut() {
        for index in [&mut e.0, &mut e.1] {
            let old = *index;
            *index = *remap.entry(old).or_insert_with(|| {
                compacted.push(vertices[old]);
                compacted.len() - 1
            });
        }
    }
    *vertices = compacted;
}

/// Re-points each dangling edge tail to the nearest dangling head.
pub(crate) fn connect_near_vertices(vertices: &[Vertex], edges: &mut [IndexEdge]) {
    let has_incoming = |edges: &[IndexEdge], v: usize| edges.iter().any(|e| e.1 == v);
    let has_outgoing = |edges: &[IndexEdge], v: usize| edges.iter().any(|e| e.0 == v);

    let dangling_tails: Vec<usize> = (0..edges.len()).filter(|&i| !has_incoming(edges, edges[i].0)).collect();
    let mut dangling_heads: Vec<usize> = edges
        .iter()
        .map(|e| e.1)
        .filter(|&v| !has_outgoing(edges, v))
        .collect();
    dangling_heads.sort_unstable();
    dangling_heads.dedup();

    for i in dangling_tails {
        let from = vertices[edges[i].0].pos;
        let nearest = dangling_heads
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != edges[i].1)
            .map(|(slot, &v)| (slot, (vertices[v].pos - from).norm_squared()))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((slot, _)) = nearest {
            edges[i].0 = dangling_heads.remove(slot);
        }
    }
}

/// Repeatedly drops edges with no predecessor or no successor.
///
/// An edge's exact reverse does not count as its neighbour.
pub(crate) fn remove_unconnected_edges(edges: &mut Vec<IndexEdge>) {
    loop {
        let keep: Vec<bool> = edges
            .iter()
            .map(|e| {
                let has_prev = edges.iter().any(|f| f.1 == e.0 && *f != e.reversed());
                let has_next = edges.iter().any(|f| f.0 == e.1 && *f != e.reversed());
                has_prev && has_next
            })
            .collect();
        if keep.iter().all(|&k| k) {
            return;
        }
        let mut flags = keep.into_iter();
        edges.retain(|_| flags.next().unwrap_or(false));
    }
}
