//! Interpolate Untouched Points: drop deltas a renderer can infer.
//!
//! Rust version of the fontTools
//! [iup](https://github.com/fonttools/fonttools/blob/main/Lib/fontTools/varLib/iup.py)
//! optimizer. Each contour is solved with dynamic programming for the fewest
//! explicit deltas such that inference reproduces every delta within tolerance.

use std::collections::BTreeSet;

use kurbo::{Point, Vec2};

/// fontmake uses half a unit.
pub const DEFAULT_TOLERANCE: f64 = 0.5;

const MAX_LOOKBACK: usize = 8;

/// Interpolate deltas for `coords` between two reference points.
fn iup_segment(coords: &[Point], rc1: Point, rd1: Vec2, rc2: Point, rd2: Vec2) -> Vec<Vec2> {
    let mut out = vec![Vec2::ZERO; coords.len()];
    for axis in 0..2 {
        let get = |p: Point| if axis == 0 { p.x } else { p.y };
        let getd = |v: Vec2| if axis == 0 { v.x } else { v.y };
        let set = |v: &mut Vec2, d: f64| {
            if axis == 0 {
                v.x = d
            } else {
                v.y = d
            }
        };
        let (mut x1, mut x2, mut d1, mut d2) = (get(rc1), get(rc2), getd(rd1), getd(rd2));
        if x1 == x2 {
            let d = if d1 == d2 { d1 } else { 0.0 };
            out.iter_mut().for_each(|v| set(v, d));
            continue;
        }
        if x1 > x2 {
            std::mem::swap(&mut x1, &mut x2);
            std::mem::swap(&mut d1, &mut d2);
        }
        let scale = (d2 - d1) / (x2 - x1);
        for (v, p) in out.iter_mut().zip(coords) {
            let x = get(*p);
            let d = if x <= x1 {
                d1
            } else if x >= x2 {
                d2
            } else {
                d1 + (x - x1) * scale
            };
            set(v, d);
        }
    }
    out
}

/// Fill in the missing deltas of one contour the way a renderer would.
pub fn iup_contour(deltas: &[Option<Vec2>], coords: &[Point]) -> Vec<Vec2> {
    let n = deltas.len();
    let indices: Vec<usize> = (0..n).filter(|i| deltas[*i].is_some()).collect();
    let explicit = |i: usize| deltas[i].unwrap_or_default();
    let (Some(first), Some(last)) = (indices.first().copied(), indices.last().copied()) else {
        return vec![Vec2::ZERO; n];
    };
    if indices.len() == n {
        return deltas.iter().map(|d| d.unwrap_or_default()).collect();
    }

    let mut out = Vec::with_capacity(n);
    if first != 0 {
        // wraps around from the last explicit point
        out.extend(iup_segment(
            &coords[..first],
            coords[first],
            explicit(first),
            coords[last],
            explicit(last),
        ));
    }
    out.push(explicit(first));
    let mut start = first;
    for end in indices.iter().skip(1).copied() {
        if end - start > 1 {
            out.extend(iup_segment(
                &coords[start + 1..end],
                coords[start],
                explicit(start),
                coords[end],
                explicit(end),
            ));
        }
        out.push(explicit(end));
        start = end;
    }
    if start != n - 1 {
        out.extend(iup_segment(
            &coords[start + 1..],
            coords[start],
            explicit(start),
            coords[first],
            explicit(first),
        ));
    }
    out
}

fn within(a: Vec2, b: Vec2, tolerance: f64) -> bool {
    (a - b).hypot() <= tolerance
}

/// Can the points strictly between `i` and `j` be inferred from them?
///
/// `i` may be -1, meaning the last point of the contour.
fn can_iup_in_between(
    deltas: &[Vec2],
    coords: &[Point],
    i: isize,
    j: usize,
    tolerance: f64,
) -> bool {
    let n = deltas.len() as isize;
    let ri = i.rem_euclid(n) as usize;
    let from = (i + 1) as usize;
    let interp = iup_segment(&coords[from..j], coords[ri], deltas[ri], coords[j], deltas[j]);
    deltas[from..j]
        .iter()
        .zip(interp)
        .all(|(d, p)| within(*d, p, tolerance))
}

/// Points that can't possibly be inferred, whatever the solution.
fn forced_set(deltas: &[Vec2], coords: &[Point], tolerance: f64) -> BTreeSet<usize> {
    let n = deltas.len();
    let mut forced = BTreeSet::new();
    for i in (0..n).rev() {
        let prev = (i + n - 1) % n;
        let next = (i + 1) % n;
        for axis in 0..2 {
            let c = |p: Point| if axis == 0 { p.x } else { p.y };
            let d = |v: Vec2| if axis == 0 { v.x } else { v.y };
            let (cj, dj) = (c(coords[i]), d(deltas[i]));
            let (lcj, ldj) = (c(coords[prev]), d(deltas[prev]));
            let (ncj, ndj) = (c(coords[next]), d(deltas[next]));
            let (c1, c2, d1, d2) = if lcj <= ncj {
                (lcj, ncj, ldj, ndj)
            } else {
                (ncj, lcj, ndj, ldj)
            };

            let force = if c1 == c2 {
                // interpolation gives the shared delta if equal, zero otherwise
                (d1 - d2).abs() > tolerance && dj.abs() > tolerance
            } else if c1 <= cj && cj <= c2 {
                // between the neighbours, so the delta must be between theirs
                !(d1.min(d2) - tolerance <= dj && dj <= d1.max(d2) + tolerance)
            } else if d1 != d2 {
                // outside, so it must match the closer neighbour or follow the slope
                if cj < c1 {
                    dj.abs() > tolerance
                        && (dj - d1).abs() > tolerance
                        && ((dj - tolerance < d1) != (d1 < d2))
                } else {
                    dj.abs() > tolerance
                        && (dj - d2).abs() > tolerance
                        && ((d2 < dj + tolerance) != (d1 < d2))
                }
            } else {
                false
            };
            if force {
                forced.insert(i);
                break;
            }
        }
    }
    forced
}

/// Cheapest encodings ending at each point, assuming the last point is explicit.
///
/// Returns (chain, costs), both indexed by point + 1 so -1 has a slot.
fn optimize_dp(
    deltas: &[Vec2],
    coords: &[Point],
    forced: &BTreeSet<usize>,
    tolerance: f64,
    lookback: usize,
) -> (Vec<Option<isize>>, Vec<usize>) {
    let n = deltas.len();
    let lookback = lookback.min(MAX_LOOKBACK) as isize;
    let mut costs = vec![0usize; n + 1];
    let mut chain: Vec<Option<isize>> = vec![None; n + 1];
    let slot = |i: isize| (i + 1) as usize;

    for i in 0..n as isize {
        let mut best_cost = costs[slot(i - 1)] + 1;
        costs[slot(i)] = best_cost;
        chain[slot(i)] = Some(i - 1);

        if i > 0 && forced.contains(&((i - 1) as usize)) {
            continue;
        }
        let stop = (i - lookback).max(-2);
        let mut j = i - 2;
        while j > stop {
            let cost = costs[slot(j)] + 1;
            if cost < best_cost && can_iup_in_between(deltas, coords, j, i as usize, tolerance) {
                best_cost = cost;
                costs[slot(i)] = cost;
                chain[slot(i)] = Some(j);
            }
            if j >= 0 && forced.contains(&(j as usize)) {
                break;
            }
            j -= 1;
        }
    }
    (chain, costs)
}

fn rotate<T: Clone>(items: &[T], k: usize) -> Vec<T> {
    let n = items.len();
    let k = k % n;
    items[n - k..].iter().chain(items[..n - k].iter()).cloned().collect()
}

/// The smallest set of deltas for one contour; `None` where IUP will do.
pub fn iup_contour_optimize(
    deltas: &[Vec2],
    coords: &[Point],
    tolerance: f64,
) -> Vec<Option<Vec2>> {
    let n = deltas.len();
    if deltas.iter().all(|d| d.hypot() <= tolerance) {
        return vec![None; n];
    }
    if n == 1 {
        return deltas.iter().copied().map(Some).collect();
    }
    let d0 = deltas[0];
    if deltas.iter().all(|d| *d == d0) {
        let mut result = vec![None; n];
        result[0] = Some(d0);
        return result;
    }

    let forced = forced_set(deltas, coords, tolerance);
    let solution: BTreeSet<usize> = if let Some(last_forced) = forced.last().copied() {
        // rotate so the last point is forced, then the linear solution is the answer
        let k = (n - 1) - last_forced;
        let rdeltas = rotate(deltas, k);
        let rcoords = rotate(coords, k);
        let rforced: BTreeSet<usize> = forced.iter().map(|i| (i + k) % n).collect();
        let (chain, _) = optimize_dp(&rdeltas, &rcoords, &rforced, tolerance, n);
        let mut solution = BTreeSet::new();
        let mut i = Some(n as isize - 1);
        while let Some(idx) = i.filter(|idx| *idx >= 0) {
            // undo the rotation
            solution.insert((idx as usize + n - k) % n);
            i = chain[(idx + 1) as usize];
        }
        solution
    } else {
        // solve the contour repeated twice and pick the best n long window
        let twice_deltas: Vec<Vec2> = deltas.iter().chain(deltas.iter()).copied().collect();
        let twice_coords: Vec<Point> = coords.iter().chain(coords.iter()).copied().collect();
        let (chain, costs) = optimize_dp(&twice_deltas, &twice_coords, &forced, tolerance, n);
        let mut best: Option<BTreeSet<usize>> = None;
        let mut best_cost = n + 1;
        for start in (n - 1)..(2 * n) {
            let start = start as isize;
            let mut solution = BTreeSet::new();
            let mut i = start;
            while i > start - n as isize {
                solution.insert(i.rem_euclid(n as isize) as usize);
                i = chain[(i + 1) as usize].unwrap_or(-1);
            }
            if i == start - n as isize {
                let cost = costs[(start + 1) as usize] - costs[(start - n as isize + 1) as usize];
                if cost <= best_cost {
                    best_cost = cost;
                    best = Some(solution);
                }
            }
        }
        best.unwrap_or_else(|| (0..n).collect())
    };

    (0..n)
        .map(|i| solution.contains(&i).then_some(deltas[i]))
        .collect()
}

/// Optimize every contour of a glyph.
///
/// `contour_ends` holds the last index of each contour; phantom points must be
/// their own single point contours so they are never inferred.
pub fn iup_delta_optimize(
    deltas: &[Vec2],
    coords: &[Point],
    contour_ends: &[usize],
    tolerance: f64,
) -> Vec<Option<Vec2>> {
    let mut result = Vec::with_capacity(deltas.len());
    let mut start = 0;
    for end in contour_ends.iter().copied() {
        result.extend(iup_contour_optimize(
            &deltas[start..=end],
            &coords[start..=end],
            tolerance,
        ));
        start = end + 1;
    }
    result
}

/// Infer omitted deltas for a whole glyph.
pub fn iup_delta(deltas: &[Option<Vec2>], coords: &[Point], contour_ends: &[usize]) -> Vec<Vec2> {
    let mut result = Vec::with_capacity(deltas.len());
    let mut start = 0;
    for end in contour_ends.iter().copied() {
        result.extend(iup_contour(&deltas[start..=end], &coords[start..=end]));
        start = end + 1;
    }
    result
}

/// The first point whose inferred delta strays from the full delta by more than tolerance.
pub fn verify(
    full: &[Vec2],
    sparse: &[Option<Vec2>],
    coords: &[Point],
    contour_ends: &[usize],
    tolerance: f64,
) -> Option<usize> {
    let inferred = iup_delta(sparse, coords, contour_ends);
    full.iter()
        .zip(inferred)
        // rounding noise mustn't fail a solution that is right on the edge
        .position(|(d, i)| !within(*d, i, tolerance + 1e-9))
}
