//! Nonzero union of closed contours.
//!
//! Curves are flattened to polylines, every crossing splits the edges involved, and
//! each resulting piece is kept only if it separates filled from unfilled space. The
//! kept pieces are linked back into loops with the filled side on their left.

use std::collections::{HashMap, HashSet};

use kurbo::{BezPath, PathEl, Point, Vec2};
use log::trace;

use crate::ir::{Contour, ContourPoint, Segment};

const FLATTEN_TOLERANCE: f64 = 0.05;
/// How far off an edge we sample to see what is on either side of it
const SIDE_OFFSET: f64 = 0.01;
const PARAM_EPSILON: f64 = 1e-9;
/// Points closer than this to a line are on it
const COLLINEAR_DISTANCE: f64 = 1e-6;
/// Loops enclosing less than this are slivers left by coincident edges
const MIN_LOOP_AREA: f64 = 1e-6;

fn flatten_segment(segment: &Segment) -> Vec<Point> {
    let mut points = match segment {
        Segment::Line(p0, p1) => return vec![*p0, *p1],
        Segment::Quad(..) | Segment::Cubic(..) => {
            let mut path = BezPath::new();
            path.move_to(segment.start());
            match segment {
                Segment::Cubic(_, p1, p2, p3) => path.curve_to(*p1, *p2, *p3),
                _ => segment.quads().iter().for_each(|q| path.quad_to(q.p1, q.p2)),
            }
            let mut points = Vec::new();
            kurbo::flatten(&path, FLATTEN_TOLERANCE, |el| match el {
                PathEl::MoveTo(p) | PathEl::LineTo(p) => points.push(p),
                _ => (),
            });
            points
        }
    };
    // exact ends so neighboring segments share points
    if points.len() < 2 {
        return vec![segment.start(), segment.end()];
    }
    points[0] = segment.start();
    let last = points.len() - 1;
    points[last] = segment.end();
    points
}

/// A contour broken into segments and their flattened edges.
struct Flat {
    segments: Vec<Segment>,
    /// Per segment, the polyline from its start to its end
    polylines: Vec<Vec<Point>>,
    polygon: Vec<Point>,
}

impl Flat {
    fn new(contour: &Contour) -> Flat {
        let segments = contour.segments();
        let polylines: Vec<_> = segments.iter().map(flatten_segment).collect();
        let polygon = polylines
            .iter()
            .flat_map(|p| p[..p.len() - 1].iter().copied())
            .collect();
        Flat {
            segments,
            polylines,
            polygon,
        }
    }
}

/// Identifies one flattened edge: contour, segment, edge within the segment.
type EdgeId = (usize, usize, usize);

fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

fn winding(polygon: &[Point], p: Point) -> i32 {
    let n = polygon.len();
    let mut winding = 0;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        let side = cross(b - a, p - a);
        if a.y <= p.y {
            if b.y > p.y && side > 0.0 {
                winding += 1;
            }
        } else if b.y <= p.y && side < 0.0 {
            winding -= 1;
        }
    }
    winding
}

fn total_winding(flats: &[Flat], p: Point, skip: Option<usize>) -> i32 {
    flats
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != skip)
        .map(|(_, f)| winding(&f.polygon, p))
        .sum()
}

/// Where, along each of two edges, they touch, if they do.
///
/// Returns (t, u, point) with t along the first edge and u along the second.
fn intersect(a0: Point, a1: Point, b0: Point, b1: Point) -> Option<(f64, f64, Point)> {
    let r = a1 - a0;
    let s = b1 - b0;
    let denom = cross(r, s);
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = cross(b0 - a0, s) / denom;
    let u = cross(b0 - a0, r) / denom;
    let within = |v: f64| (-PARAM_EPSILON..=1.0 + PARAM_EPSILON).contains(&v);
    if !within(t) || !within(u) {
        return None;
    }
    Some((t, u, a0 + r * t))
}

/// Where the ends of `b` fall along `a`, if the two lie on one line and share a stretch.
fn collinear_overlap(a0: Point, a1: Point, b0: Point, b1: Point) -> Option<(f64, f64)> {
    let r = a1 - a0;
    let len = r.hypot();
    if len < PARAM_EPSILON {
        return None;
    }
    let off_line = |p: Point| cross(r, p - a0).abs() / len > COLLINEAR_DISTANCE;
    if off_line(b0) || off_line(b1) {
        return None;
    }
    let along = |p: Point| (p - a0).dot(r) / (len * len);
    let (t0, t1) = (along(b0), along(b1));
    let shared = t0.max(t1).min(1.0) - t0.min(t1).max(0.0);
    (shared > PARAM_EPSILON).then_some((t0, t1))
}

fn interior(v: f64) -> bool {
    v > PARAM_EPSILON && v < 1.0 - PARAM_EPSILON
}

fn bounds_overlap(a0: Point, a1: Point, b0: Point, b1: Point) -> bool {
    a0.x.min(a1.x) <= b0.x.max(b1.x)
        && b0.x.min(b1.x) <= a0.x.max(a1.x)
        && a0.y.min(a1.y) <= b0.y.max(b1.y)
        && b0.y.min(b1.y) <= a0.y.max(a1.y)
}

/// A kept piece of boundary, oriented so the filled side is on its left.
#[derive(Debug, Clone, Copy)]
struct Piece {
    from: Point,
    to: Point,
    contour: usize,
    segment: usize,
    /// The source segment wasn't cut anywhere
    whole: bool,
    forward: bool,
}

impl Piece {
    fn group(&self) -> (usize, usize, bool, bool) {
        (self.contour, self.segment, self.whole, self.forward)
    }
}

fn key(p: Point) -> (i64, i64) {
    ((p.x * 1e6).round() as i64, (p.y * 1e6).round() as i64)
}

/// Union contours under the nonzero rule.
///
/// Untouched contours are returned as-is, in place; contours enclosed by filled space
/// are dropped. If `restore_curves`, uncut curves on the new boundary are restored.
pub fn union_contours(contours: &[Contour], restore_curves: bool) -> Vec<Contour> {
    let flats: Vec<Flat> = contours.iter().map(Flat::new).collect();
    let edges: Vec<(EdgeId, Point, Point)> = flats
        .iter()
        .enumerate()
        .flat_map(|(c, flat)| {
            flat.polylines.iter().enumerate().flat_map(move |(s, line)| {
                line.windows(2)
                    .enumerate()
                    .map(move |(e, w)| ((c, s, e), w[0], w[1]))
            })
        })
        .collect();

    // Split parameters per edge
    let mut splits: HashMap<EdgeId, Vec<(f64, Point)>> = HashMap::new();
    // Contours with an edge lying on top of another edge
    let mut coincident: HashSet<usize> = HashSet::new();
    for i in 0..edges.len() {
        for j in i + 1..edges.len() {
            let (id_a, a0, a1) = edges[i];
            let (id_b, b0, b1) = edges[j];
            if adjacent(&flats, id_a, id_b) || !bounds_overlap(a0, a1, b0, b1) {
                continue;
            }
            if let Some((t, u, p)) = intersect(a0, a1, b0, b1) {
                if interior(t) {
                    splits.entry(id_a).or_default().push((t, p));
                }
                if interior(u) {
                    splits.entry(id_b).or_default().push((u, p));
                }
                continue;
            }
            let (Some(on_a), Some(on_b)) = (
                collinear_overlap(a0, a1, b0, b1),
                collinear_overlap(b0, b1, a0, a1),
            ) else {
                continue;
            };
            coincident.extend([id_a.0, id_b.0]);
            for (t, p) in [(on_a.0, b0), (on_a.1, b1)] {
                if interior(t) {
                    splits.entry(id_a).or_default().push((t, p));
                }
            }
            for (u, p) in [(on_b.0, a0), (on_b.1, a1)] {
                if interior(u) {
                    splits.entry(id_b).or_default().push((u, p));
                }
            }
        }
    }

    let cut: Vec<bool> = (0..contours.len())
        .map(|c| coincident.contains(&c) || splits.keys().any(|(sc, _, _)| *sc == c))
        .collect();

    // Uncut contours are kept only if they bound filled space
    let keep_whole: Vec<bool> = (0..contours.len())
        .map(|c| {
            let polygon = &flats[c].polygon;
            if cut[c] || polygon.len() < 3 {
                return !cut[c] && !polygon.is_empty();
            }
            // nothing else runs along this edge, so its midpoint sees only the others
            let outside = total_winding(&flats, polygon[0].midpoint(polygon[1]), Some(c));
            let inside = outside + winding_sign(&flats[c]);
            (outside == 0) != (inside == 0)
        })
        .collect();

    if !cut.contains(&true) && !keep_whole.contains(&false) {
        return contours.to_vec();
    }

    let mut pieces = Vec::new();
    // coincident edges on the boundary are classified alike, keep the first
    let mut placed: HashSet<((i64, i64), (i64, i64))> = HashSet::new();
    for ((c, s, e), p0, p1) in edges.iter().copied() {
        if !cut[c] {
            continue;
        }
        let whole = !(0..flats[c].polylines[s].len() - 1)
            .any(|other| splits.contains_key(&(c, s, other)));
        let mut stops = splits.get(&(c, s, e)).cloned().unwrap_or_default();
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut points = vec![p0];
        points.extend(stops.into_iter().map(|(_, p)| p));
        points.push(p1);
        for w in points.windows(2) {
            let (from, to) = (w[0], w[1]);
            let dir = to - from;
            if dir.hypot() < 1e-9 {
                continue;
            }
            let normal = Vec2::new(-dir.y, dir.x).normalize() * SIDE_OFFSET;
            let mid = from.midpoint(to);
            let left = total_winding(&flats, mid + normal, None) != 0;
            let right = total_winding(&flats, mid - normal, None) != 0;
            if left == right {
                continue;
            }
            let piece = Piece {
                from,
                to,
                contour: c,
                segment: s,
                whole,
                forward: left,
            };
            let piece = if left {
                piece
            } else {
                Piece {
                    from: to,
                    to: from,
                    ..piece
                }
            };
            if placed.insert((key(piece.from), key(piece.to))) {
                pieces.push(piece);
            }
        }
    }

    let loops = link(&pieces);
    trace!(
        "Union of {} contours, {} cut, produced {} new loops",
        contours.len(),
        cut.iter().filter(|c| **c).count(),
        loops.len()
    );

    let mut result = Vec::new();
    let mut loops_emitted = false;
    for (c, contour) in contours.iter().enumerate() {
        if cut[c] {
            if !loops_emitted {
                result.extend(
                    loops
                        .iter()
                        .map(|l| loop_to_contour(l, &pieces, &flats, restore_curves))
                        .filter(|c| c.len() >= 3 && c.signed_area().abs() > MIN_LOOP_AREA),
                );
                loops_emitted = true;
            }
        } else if keep_whole[c] {
            result.push(contour.clone());
        }
    }
    result
}

fn winding_sign(flat: &Flat) -> i32 {
    let area: f64 = flat
        .polygon
        .iter()
        .zip(flat.polygon.iter().cycle().skip(1))
        .map(|(a, b)| cross(a.to_vec2(), b.to_vec2()))
        .sum();
    if area > 0.0 {
        1
    } else if area < 0.0 {
        -1
    } else {
        0
    }
}

/// Neighbors along the same contour share an end and can't cross.
fn adjacent(flats: &[Flat], a: EdgeId, b: EdgeId) -> bool {
    if a.0 != b.0 {
        return false;
    }
    let flat = &flats[a.0];
    let index = |(_, s, e): EdgeId| {
        flat.polylines[..s].iter().map(|p| p.len() - 1).sum::<usize>() + e
    };
    let n = flat.polygon.len();
    let (ia, ib) = (index(a), index(b));
    ia == ib || (ia + 1) % n == ib || (ib + 1) % n == ia
}

/// Chain pieces into closed loops, returning indices into `pieces`.
fn link(pieces: &[Piece]) -> Vec<Vec<usize>> {
    let mut starting_at: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, piece) in pieces.iter().enumerate() {
        starting_at.entry(key(piece.from)).or_default().push(i);
    }
    let mut used = vec![false; pieces.len()];
    let mut loops = Vec::new();
    for start in 0..pieces.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut chain = vec![start];
        let mut current = start;
        let mut closed = false;
        loop {
            let end = pieces[current].to;
            if key(end) == key(pieces[start].from) {
                closed = true;
                break;
            }
            let incoming = pieces[current].to - pieces[current].from;
            // leftmost turn keeps loops that merely touch apart
            let next = starting_at
                .get(&key(end))
                .into_iter()
                .flatten()
                .copied()
                .filter(|i| !used[*i])
                .max_by(|a, b| {
                    let turn = |i: usize| {
                        let out = pieces[i].to - pieces[i].from;
                        cross(incoming, out).atan2(incoming.dot(out))
                    };
                    turn(*a).total_cmp(&turn(*b))
                });
            let Some(next) = next else {
                break;
            };
            used[next] = true;
            chain.push(next);
            current = next;
        }
        if closed && chain.len() > 2 {
            loops.push(chain);
        }
    }
    loops
}

fn loop_to_contour(
    chain: &[usize],
    pieces: &[Piece],
    flats: &[Flat],
    restore_curves: bool,
) -> Contour {
    // start at a group boundary so no group wraps around
    let rotate_by = (0..chain.len())
        .find(|i| {
            let prev = chain[(i + chain.len() - 1) % chain.len()];
            pieces[prev].group() != pieces[chain[*i]].group()
        })
        .unwrap_or(0);
    let chain: Vec<Piece> = chain[rotate_by..]
        .iter()
        .chain(chain[..rotate_by].iter())
        .map(|i| pieces[*i])
        .collect();

    let first = chain[0].from;
    let mut points = vec![ContourPoint::on(first.x, first.y)];
    let mut i = 0;
    while i < chain.len() {
        let group = chain[i].group();
        let len = chain[i..].iter().take_while(|p| p.group() == group).count();
        let (c, s, whole, forward) = group;
        let segment = &flats[c].segments[s];
        let edge_count = flats[c].polylines[s].len() - 1;
        if restore_curves && whole && len == edge_count && !matches!(segment, Segment::Line(..)) {
            points.extend(segment_points(segment, forward));
        } else {
            points.extend(
                chain[i..i + len]
                    .iter()
                    .map(|p| ContourPoint::on(p.to.x, p.to.y)),
            );
        }
        i += len;
    }
    // the last point closes back on the first
    if points.len() > 1 {
        points.pop();
    }
    Contour::new(points)
}

/// Points of a segment after its start, or before its end if backwards.
fn segment_points(segment: &Segment, forward: bool) -> Vec<ContourPoint> {
    let mut points: Vec<ContourPoint> = match segment {
        Segment::Line(..) => Vec::new(),
        Segment::Quad(_, offs, _) => offs.iter().map(|p| ContourPoint::quad(p.x, p.y)).collect(),
        Segment::Cubic(_, p1, p2, _) => {
            vec![ContourPoint::cubic(p1.x, p1.y), ContourPoint::cubic(p2.x, p2.y)]
        }
    };
    let end = if forward {
        segment.end()
    } else {
        points.reverse();
        segment.start()
    };
    points.push(ContourPoint::on(end.x, end.y));
    points
}

#[cfg(test)]
mod tests {
    use more_asserts::assert_lt;
    use pretty_assertions::assert_eq;

    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Contour {
        Contour::new(vec![
            ContourPoint::on(x0, y0),
            ContourPoint::on(x1, y0),
            ContourPoint::on(x1, y1),
            ContourPoint::on(x0, y1),
        ])
    }

    fn area(contours: &[Contour]) -> f64 {
        contours.iter().map(Contour::signed_area).sum()
    }

    #[test]
    fn disjoint_contours_pass_through() {
        let input = vec![rect(0.0, 0.0, 10.0, 10.0), rect(20.0, 0.0, 30.0, 10.0)];
        assert_eq!(input, union_contours(&input, true));
    }

    #[test]
    fn overlapping_squares_merge() {
        let input = vec![rect(0.0, 0.0, 10.0, 10.0), rect(5.0, 5.0, 15.0, 15.0)];
        let output = union_contours(&input, true);
        assert_eq!(1, output.len());
        assert_eq!(8, output[0].len());
        assert_lt!((area(&output) - 175.0).abs(), 1e-6);
    }

    #[test]
    fn contained_same_winding_is_dropped() {
        let input = vec![rect(0.0, 0.0, 10.0, 10.0), rect(2.0, 2.0, 8.0, 8.0)];
        assert_eq!(vec![input[0].clone()], union_contours(&input, true));
    }

    #[test]
    fn holes_are_kept() {
        let mut hole = rect(2.0, 2.0, 8.0, 8.0);
        hole.reverse();
        let input = vec![rect(0.0, 0.0, 10.0, 10.0), hole];
        assert_eq!(input, union_contours(&input, true));
    }

    #[test]
    fn union_is_idempotent() {
        let circle = |cx: f64| {
            Contour::new(vec![
                ContourPoint::on(cx, 0.0),
                ContourPoint::cubic(cx + 55.0, 0.0),
                ContourPoint::cubic(cx + 100.0, 45.0),
                ContourPoint::on(cx + 100.0, 100.0),
                ContourPoint::cubic(cx + 100.0, 155.0),
                ContourPoint::cubic(cx + 55.0, 200.0),
                ContourPoint::on(cx, 200.0),
                ContourPoint::cubic(cx - 55.0, 200.0),
                ContourPoint::cubic(cx - 100.0, 155.0),
                ContourPoint::on(cx - 100.0, 100.0),
                ContourPoint::cubic(cx - 100.0, 45.0),
                ContourPoint::cubic(cx - 55.0, 0.0),
            ])
        };
        let input = vec![circle(0.0), circle(120.0)];
        for restore in [true, false] {
            let once = union_contours(&input, restore);
            let twice = union_contours(&once, restore);
            assert_eq!(1, once.len());
            assert_eq!(once, twice);
        }
        // the outer halves of each circle are uncut and come back as curves
        assert!(union_contours(&input, true)[0].has_cubic());
        assert!(!union_contours(&input, false)[0].has_cubic());
    }

    #[test]
    fn identical_contours_keep_one_copy() {
        let input = vec![rect(0.0, 0.0, 10.0, 10.0), rect(0.0, 0.0, 10.0, 10.0)];
        let output = union_contours(&input, true);
        assert_eq!(1, output.len());
        assert_eq!(4, output[0].len());
        assert_lt!((area(&output) - 100.0).abs(), 1e-6);
    }

    #[test]
    fn rectangles_sharing_edges_make_an_l() {
        let input = vec![rect(0.0, 0.0, 20.0, 10.0), rect(0.0, 0.0, 10.0, 20.0)];
        let output = union_contours(&input, true);
        assert_eq!(1, output.len(), "{output:?}");
        assert_lt!((area(&output) - 300.0).abs(), 1e-6);
    }

    #[test]
    fn abutting_rectangles_lose_the_shared_edge() {
        let input = vec![rect(0.0, 0.0, 10.0, 10.0), rect(10.0, 0.0, 20.0, 10.0)];
        let output = union_contours(&input, true);
        assert_eq!(1, output.len(), "{output:?}");
        assert_lt!((area(&output) - 200.0).abs(), 1e-6);
    }

    #[test]
    fn crossing_bars_make_a_t() {
        let input = vec![rect(0.0, 90.0, 100.0, 100.0), rect(45.0, 0.0, 55.0, 95.0)];
        let output = union_contours(&input, true);
        assert_eq!(1, output.len());
        assert_eq!(8, output[0].len());
        assert_lt!((area(&output) - 1900.0).abs(), 1e-6);
    }

    #[test]
    fn self_intersection_is_resolved() {
        // a bow tie
        let input = vec![Contour::new(vec![
            ContourPoint::on(0.0, 0.0),
            ContourPoint::on(10.0, 10.0),
            ContourPoint::on(10.0, 0.0),
            ContourPoint::on(0.0, 10.0),
        ])];
        let output = union_contours(&input, true);
        assert_eq!(2, output.len());
        for contour in output.iter() {
            assert_eq!(3, contour.len());
            assert_lt!((contour.signed_area().abs() - 25.0).abs(), 1e-6);
        }
    }
}
