//! glyf outlines: integer points, composites, and the point streams gvar varies.

use kiln_ir::ir::{Glyph, PointKind};
use kiln_types::types::GlyphName;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use write_fonts::OtRound;

use crate::error::GlyphProblem;

/// The four phantom points that follow every glyph's points in gvar.
pub const PHANTOM_POINTS: usize = 4;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyfPoint {
    pub x: i16,
    pub y: i16,
    pub on_curve: bool,
    /// Off-curve point of a cubic curve, only in the cubic glyf variant
    pub cubic: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SimpleGlyph {
    pub contours: Vec<Vec<GlyfPoint>>,
    /// The outline was left overlapping
    pub overlap_simple: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GlyfComponent {
    pub base: GlyphName,
    pub dx: i16,
    pub dy: i16,
    /// xx, yx, xy, yy
    pub transform: [f64; 4],
    pub use_my_metrics: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum GlyfGlyph {
    Empty,
    Simple(SimpleGlyph),
    Composite(Vec<GlyfComponent>),
}

fn to_i16(value: f64) -> Result<i16, GlyphProblem> {
    if !(i16::MIN as f64..=i16::MAX as f64).contains(&value.round()) {
        return Err(GlyphProblem::CoordinateOutOfRange(value));
    }
    Ok(value.ot_round())
}

impl GlyfGlyph {
    /// Glyphs must have either contours or components by now, never both.
    pub fn from_ir(glyph: &Glyph) -> Result<GlyfGlyph, GlyphProblem> {
        match (glyph.contours.is_empty(), glyph.components.is_empty()) {
            (true, true) => Ok(GlyfGlyph::Empty),
            (false, false) => Err(GlyphProblem::HasComponentsAndPath),
            (false, true) => {
                let contours = glyph
                    .contours
                    .iter()
                    .map(|contour| {
                        contour
                            .points()
                            .iter()
                            .map(|p| {
                                Ok(GlyfPoint {
                                    x: to_i16(p.x)?,
                                    y: to_i16(p.y)?,
                                    on_curve: p.kind.is_on_curve(),
                                    cubic: p.kind == PointKind::OffCurveCubic,
                                })
                            })
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(GlyfGlyph::Simple(SimpleGlyph {
                    contours,
                    overlap_simple: false,
                }))
            }
            (true, false) => glyph
                .components
                .iter()
                .map(|component| {
                    let [xx, yx, xy, yy, dx, dy] = component.transform.as_coeffs();
                    Ok(GlyfComponent {
                        base: component.base.clone(),
                        dx: to_i16(dx)?,
                        dy: to_i16(dy)?,
                        transform: [xx, yx, xy, yy],
                        use_my_metrics: component.use_my_metrics,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(GlyfGlyph::Composite),
        }
    }

    /// xMin, yMin, xMax, yMax of a simple glyph.
    pub fn bbox(&self) -> Option<[i16; 4]> {
        let GlyfGlyph::Simple(simple) = self else {
            return None;
        };
        simple
            .contours
            .iter()
            .flatten()
            .fold(None, |bbox: Option<[i16; 4]>, p| {
                Some(match bbox {
                    None => [p.x, p.y, p.x, p.y],
                    Some([x0, y0, x1, y1]) => [x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)],
                })
            })
    }

    pub fn num_points(&self) -> usize {
        match self {
            GlyfGlyph::Empty => 0,
            GlyfGlyph::Simple(simple) => simple.contours.iter().map(Vec::len).sum(),
            GlyfGlyph::Composite(components) => components.len(),
        }
    }
}

/// <https://docs.microsoft.com/en-us/typography/opentype/spec/tt_instructing_glyphs#phantoms>
fn add_phantom_points(advance: f64, points: &mut Vec<Point>) {
    // lsb is always xMin so leftSideX is 0
    points.push(Point::new(0.0, 0.0));
    points.push(Point::new(advance, 0.0));
    // vertical phantoms don't vary
    points.push(Point::new(0.0, 0.0));
    points.push(Point::new(0.0, 0.0));
}

/// The points gvar varies: every contour point, or one per component offset,
/// followed by the phantom points.
pub fn point_seq(glyph: &Glyph) -> Vec<Point> {
    let mut points: Vec<Point> = if glyph.components.is_empty() {
        glyph
            .contours
            .iter()
            .flat_map(|c| c.points().iter().map(|p| p.point()))
            .collect()
    } else {
        glyph
            .components
            .iter()
            .map(|c| {
                let [.., dx, dy] = c.transform.as_coeffs();
                Point::new(dx, dy)
            })
            .collect()
    };
    add_phantom_points(OtRound::<i16>::ot_round(glyph.width) as f64, &mut points);
    points
}

/// Index of the last point of each contour in [point_seq], phantoms included.
///
/// Component offsets and phantom points are each a contour of their own for IUP.
pub fn contour_ends(glyph: &Glyph) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut end = 0;
    if glyph.components.is_empty() {
        for contour in glyph.contours.iter().filter(|c| !c.is_empty()) {
            end += contour.len();
            ends.push(end - 1);
        }
    } else {
        for _ in glyph.components.iter() {
            end += 1;
            ends.push(end - 1);
        }
    }
    for _ in 0..PHANTOM_POINTS {
        end += 1;
        ends.push(end - 1);
    }
    ends
}
