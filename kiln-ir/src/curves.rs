//! Curve policies for TrueType outlines, plus implied on-curve and direction fixes.

use std::{fmt::Display, str::FromStr};

use log::trace;

use crate::{
    cu2qu::convert_contours,
    error::{BadGlyph, BadGlyphKind},
    ir::{Contour, ContourPoint, Glyph, PointKind, Segment},
};

/// What to do with cubic curves when the output wants glyf outlines.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CurvePolicy {
    /// Always convert cubics to quadratics
    #[default]
    Cu2qu,
    /// Per contour, keep whichever of cubic or quadratic encodes smaller
    Mixed,
    /// Quadratic only; cubic input is an error
    KeepQuad,
    /// Leave cubics for the cubic glyf variant
    KeepCubic,
}

impl CurvePolicy {
    pub const NAMES: [&'static str; 4] = ["cu2qu", "mixed", "keep-quad", "keep-cubic"];
}

impl FromStr for CurvePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cu2qu" => Ok(CurvePolicy::Cu2qu),
            "mixed" => Ok(CurvePolicy::Mixed),
            "keep-quad" => Ok(CurvePolicy::KeepQuad),
            "keep-cubic" => Ok(CurvePolicy::KeepCubic),
            _ => Err(format!(
                "Unknown curve policy '{s}', expected one of {:?}",
                CurvePolicy::NAMES
            )),
        }
    }
}

impl Display for CurvePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CurvePolicy::Cu2qu => "cu2qu",
            CurvePolicy::Mixed => "mixed",
            CurvePolicy::KeepQuad => "keep-quad",
            CurvePolicy::KeepCubic => "keep-cubic",
        };
        f.write_str(name)
    }
}

/// Bytes one point costs in a glyf simple glyph, flag included.
///
/// Repeat flags are ignored; they are the same for both curve flavors.
fn coord_bytes(delta: f64) -> usize {
    let delta = delta.round().abs();
    if delta == 0.0 {
        0
    } else if delta <= 255.0 {
        1
    } else {
        2
    }
}

/// Estimated encoded size of the contour's points in glyf.
pub fn glyf_size(contour: &Contour) -> usize {
    let mut prev = (0.0, 0.0);
    contour
        .points()
        .iter()
        .map(|p| {
            let size = 1 + coord_bytes(p.x - prev.0) + coord_bytes(p.y - prev.1);
            prev = (p.x, p.y);
            size
        })
        .sum()
}

/// Apply a curve policy to one glyph as drawn in every master.
///
/// Masters are converted together so they stay compatible.
pub fn apply_curve_policy(
    glyphs: &mut [&mut Glyph],
    policy: CurvePolicy,
    tolerance: f64,
) -> Result<(), BadGlyph> {
    let Some(first) = glyphs.first() else {
        return Ok(());
    };
    let glyph_name = first.name.clone();
    let num_contours = first.contours.len();

    match policy {
        CurvePolicy::KeepCubic => return Ok(()),
        CurvePolicy::KeepQuad => {
            for glyph in glyphs.iter() {
                if let Some(contour) = glyph.contours.iter().position(Contour::has_cubic) {
                    return Err(BadGlyph::new(
                        glyph_name,
                        BadGlyphKind::CubicInQuadraticTarget { contour },
                    ));
                }
            }
            return Ok(());
        }
        CurvePolicy::Cu2qu | CurvePolicy::Mixed => (),
    }

    for contour_idx in 0..num_contours {
        let originals: Vec<&Contour> = glyphs
            .iter()
            .filter_map(|g| g.contours.get(contour_idx))
            .collect();
        if originals.len() != glyphs.len() {
            return Err(BadGlyph::new(
                glyph_name,
                BadGlyphKind::InconsistentConversion(format!(
                    "contour {contour_idx} is missing from some masters"
                )),
            ));
        }
        if !originals.iter().any(|c| c.has_cubic()) {
            continue;
        }
        let converted = convert_contours(&originals, tolerance).map_err(|_| {
            BadGlyph::new(
                glyph_name.clone(),
                BadGlyphKind::ToleranceExceeded {
                    contour: contour_idx,
                    tolerance,
                },
            )
        })?;
        if policy == CurvePolicy::Mixed {
            let cubic: usize = originals.iter().map(|c| glyf_size(c)).sum();
            let quad: usize = converted.iter().map(glyf_size).sum();
            // ties go to quadratic, more renderers understand it
            if cubic < quad {
                trace!("{glyph_name} contour {contour_idx} stays cubic, {cubic} < {quad} bytes");
                continue;
            }
        }
        for (glyph, contour) in glyphs.iter_mut().zip(converted) {
            glyph.contours[contour_idx] = contour;
        }
    }
    Ok(())
}

/// Drop on-curve points exactly midway between two quadratic off-curves.
///
/// With several masters a point is only dropped if it is implied in all of them.
pub fn drop_implied_oncurves(glyphs: &mut [&mut Glyph]) {
    let Some(first) = glyphs.first() else {
        return;
    };
    for contour_idx in 0..first.contours.len() {
        let Some(len) = glyphs[0].contours.get(contour_idx).map(Contour::len) else {
            continue;
        };
        let implied: Vec<bool> = (0..len)
            .map(|idx| {
                glyphs.iter().all(|g| {
                    g.contours
                        .get(contour_idx)
                        .is_some_and(|c| c.len() == len && is_implied(c.points(), idx))
                })
            })
            .collect();
        if !implied.contains(&true) {
            continue;
        }
        for glyph in glyphs.iter_mut() {
            let contour = &mut glyph.contours[contour_idx];
            let mut idx = 0;
            contour.0.retain(|_| {
                idx += 1;
                !implied[idx - 1]
            });
        }
    }
}

fn is_implied(points: &[ContourPoint], idx: usize) -> bool {
    let n = points.len();
    if n < 3 || !points[idx].kind.is_on_curve() {
        return false;
    }
    let prev = points[(idx + n - 1) % n];
    let next = points[(idx + 1) % n];
    if prev.kind != PointKind::OffCurveQuad || next.kind != PointKind::OffCurveQuad {
        return false;
    }
    let mid = prev.point().midpoint(next.point());
    mid.distance(points[idx].point()) < 1e-9
}

/// Make outer contours wind the way the target wants.
///
/// TrueType wants outer contours clockwise, PostScript counter-clockwise. We flip
/// every contour of a glyph when the glyph's overall winding is the wrong way, so
/// counters stay opposite their outlines. The decision is made on the reference
/// glyph and applied to all so masters stay compatible.
pub fn normalize_direction(glyphs: &mut [&mut Glyph], reference: usize, clockwise: bool) {
    let Some(glyph) = glyphs.get(reference) else {
        return;
    };
    let area: f64 = glyph.contours.iter().map(Contour::signed_area).sum();
    let is_clockwise = area < 0.0;
    if area == 0.0 || is_clockwise == clockwise {
        return;
    }
    for glyph in glyphs.iter_mut() {
        glyph.contours.iter_mut().for_each(Contour::reverse);
    }
}

/// Exact cubic equivalent of a contour's quadratic splines.
pub fn elevate_quadratics(contour: &Contour) -> Contour {
    if !contour.has_quad() {
        return contour.clone();
    }
    let segments: Vec<Segment> = contour
        .segments()
        .into_iter()
        .flat_map(|segment| match segment {
            Segment::Quad(..) => segment
                .quads()
                .into_iter()
                .map(|q| {
                    let c1 = q.p0 + (q.p1 - q.p0) * (2.0 / 3.0);
                    let c2 = q.p2 + (q.p1 - q.p2) * (2.0 / 3.0);
                    Segment::Cubic(q.p0, c1, c2, q.p2)
                })
                .collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect();
    Contour::from_segments(&segments)
}
