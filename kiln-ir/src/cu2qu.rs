//! Cubic to quadratic conversion that keeps masters compatible.
//!
//! Corresponding cubics from every master are converted together so they all come
//! back with the same number of quadratic segments.

use kurbo::{cubics_to_quadratic_splines, CubicBez, ParamCurve, ParamCurveNearest, Point, QuadBez};
use log::trace;

use crate::ir::{Contour, ContourPoint, Segment};

/// Most quadratic segments we will use for one cubic before splitting it.
pub const MAX_N: usize = 10;

/// How many times a cubic may be halved before giving up.
pub const MAX_DEPTH: usize = 8;

/// Points replacing a cubic, excluding its start and including its end.
pub type QuadRun = Vec<ContourPoint>;

/// Approximate each cubic with a quadratic spline within `tolerance`.
///
/// Returns one run per input cubic, all with the same point kinds, or None if
/// even after [MAX_DEPTH] rounds of halving the tolerance can't be met.
pub fn cubics_to_quads(cubics: &[CubicBez], tolerance: f64) -> Option<Vec<QuadRun>> {
    convert(cubics, tolerance, 0)
}

fn convert(cubics: &[CubicBez], tolerance: f64, depth: usize) -> Option<Vec<QuadRun>> {
    if let Some(splines) = cubics_to_quadratic_splines(cubics, tolerance) {
        let runs: Vec<QuadRun> = splines
            .iter()
            .map(|spline| {
                let quads: Vec<QuadBez> = spline.to_quads().collect();
                let mut run: QuadRun = quads
                    .iter()
                    .map(|q| ContourPoint::quad(q.p1.x, q.p1.y))
                    .collect();
                if let Some(last) = quads.last() {
                    run.push(ContourPoint::on(last.p2.x, last.p2.y));
                }
                run
            })
            .collect();
        if runs.iter().all(|r| !r.is_empty() && r.len() - 1 <= MAX_N) {
            return Some(runs);
        }
    }
    if depth >= MAX_DEPTH {
        return None;
    }
    trace!("Halving {} cubics at depth {depth}", cubics.len());
    let firsts: Vec<_> = cubics.iter().map(|c| c.subsegment(0.0..0.5)).collect();
    let seconds: Vec<_> = cubics.iter().map(|c| c.subsegment(0.5..1.0)).collect();
    let firsts = convert(&firsts, tolerance, depth + 1)?;
    let seconds = convert(&seconds, tolerance, depth + 1)?;
    // the halves must split the same way in every master or kinds won't line up
    if firsts.iter().any(|r| r.len() != firsts[0].len())
        || seconds.iter().any(|r| r.len() != seconds[0].len())
    {
        return None;
    }
    Some(
        firsts
            .into_iter()
            .zip(seconds)
            .map(|(mut first, second)| {
                first.extend(second);
                first
            })
            .collect(),
    )
}

/// Convert the corresponding contour of every master.
///
/// Returns the index of the first segment that couldn't be converted on failure.
/// Contours are assumed compatible: same point count and kinds everywhere.
pub fn convert_contours(contours: &[&Contour], tolerance: f64) -> Result<Vec<Contour>, usize> {
    // all off-curve contours have no cubics and no natural start; leave them be
    if contours.iter().any(|c| c.first_on_curve().is_none()) {
        return Ok(contours.iter().map(|c| (*c).clone()).collect());
    }

    let segments: Vec<Vec<Segment>> = contours.iter().map(|c| c.segments()).collect();
    let Some(reference) = segments.first() else {
        return Ok(Vec::new());
    };
    let mut points: Vec<Vec<ContourPoint>> = segments
        .iter()
        .map(|s| match s.first() {
            Some(first) => vec![ContourPoint::on(first.start().x, first.start().y)],
            None => Vec::new(),
        })
        .collect();

    for (seg_idx, segment) in reference.iter().enumerate() {
        if let Segment::Cubic(..) = segment {
            let cubics: Vec<CubicBez> = segments
                .iter()
                .filter_map(|s| match s.get(seg_idx) {
                    Some(Segment::Cubic(p0, p1, p2, p3)) => Some(CubicBez::new(*p0, *p1, *p2, *p3)),
                    _ => None,
                })
                .collect();
            if cubics.len() != segments.len() {
                return Err(seg_idx);
            }
            let runs = cubics_to_quads(&cubics, tolerance).ok_or(seg_idx)?;
            for (master_points, run) in points.iter_mut().zip(runs) {
                master_points.extend(run);
            }
        } else {
            for (master_points, master_segments) in points.iter_mut().zip(segments.iter()) {
                let Some(segment) = master_segments.get(seg_idx) else {
                    return Err(seg_idx);
                };
                if let Segment::Quad(_, offs, _) = segment {
                    master_points.extend(offs.iter().map(|p| ContourPoint::quad(p.x, p.y)));
                }
                let end = segment.end();
                master_points.push(ContourPoint::on(end.x, end.y));
            }
        }
    }
    // the final segment lands back on the start point
    Ok(points
        .into_iter()
        .map(|mut p| {
            if p.len() > 1 {
                p.pop();
            }
            Contour::new(p)
        })
        .collect())
}

/// Largest distance from the cubic to the quadratic spline that replaced it.
///
/// Measured by sampling the cubic and finding the nearest point on the spline; good
/// enough to check a tolerance.
pub fn max_deviation(cubic: &CubicBez, run: &[ContourPoint]) -> f64 {
    let mut spline = Vec::new();
    let mut start = cubic.p0;
    let mut offs: Vec<Point> = Vec::new();
    for pt in run {
        if pt.kind.is_on_curve() {
            spline.extend(Segment::Quad(start, offs.clone(), pt.point()).quads());
            offs.clear();
            start = pt.point();
        } else {
            offs.push(pt.point());
        }
    }
    const STEPS: usize = 100;
    (0..=STEPS)
        .map(|i| cubic.eval(i as f64 / STEPS as f64))
        .map(|p| {
            spline
                .iter()
                .map(|q| q.nearest(p, 1e-9).distance_sq.sqrt())
                .fold(f64::INFINITY, f64::min)
        })
        .fold(0.0, f64::max)
}
