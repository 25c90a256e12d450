//! Serde types for the font model kiln compiles.
//!
//! Sources (or whatever loader produced them) hand us a [Designspace]; every stage
//! afterwards reads from or rewrites the glyphs of its masters.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use kiln_types::{
    coords::{DesignLocation, NormalizedLocation},
    types::{Axis, GlyphName},
};
use kurbo::{Affine, BezPath, CubicBez, Line, ParamCurveArea, PathEl, Point, QuadBez};
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    layout::LayoutRules,
    serde::{KernSideSerdeRepr, MasterSerdeRepr},
};

/// Possible types of a point in a glyph contour.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    OnCurve,
    OffCurveQuad,
    OffCurveCubic,
}

impl PointKind {
    pub fn is_on_curve(self) -> bool {
        self == PointKind::OnCurve
    }
}

/// A single point in a glyph contour.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct ContourPoint {
    pub x: f64,
    pub y: f64,
    pub kind: PointKind,
}

impl ContourPoint {
    pub fn new(x: f64, y: f64, kind: PointKind) -> ContourPoint {
        ContourPoint { x, y, kind }
    }

    pub fn on(x: f64, y: f64) -> ContourPoint {
        ContourPoint::new(x, y, PointKind::OnCurve)
    }

    pub fn quad(x: f64, y: f64) -> ContourPoint {
        ContourPoint::new(x, y, PointKind::OffCurveQuad)
    }

    pub fn cubic(x: f64, y: f64) -> ContourPoint {
        ContourPoint::new(x, y, PointKind::OffCurveCubic)
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// One drawing step of a contour, always starting and ending on an on-curve point.
///
/// Quadratic splines may have any number of off-curve points, with on-curve points
/// implied halfway between consecutive ones.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Line(Point, Point),
    Quad(Point, Vec<Point>, Point),
    Cubic(Point, Point, Point, Point),
}

impl Segment {
    pub fn start(&self) -> Point {
        match self {
            Segment::Line(p0, _) | Segment::Quad(p0, _, _) | Segment::Cubic(p0, ..) => *p0,
        }
    }

    pub fn end(&self) -> Point {
        match self {
            Segment::Line(_, p1) | Segment::Quad(_, _, p1) | Segment::Cubic(.., p1) => *p1,
        }
    }

    /// Quadratic beziers making up a spline segment, with implied on-curves filled in.
    pub fn quads(&self) -> Vec<QuadBez> {
        let Segment::Quad(p0, offs, p1) = self else {
            return Vec::new();
        };
        let mut quads = Vec::with_capacity(offs.len());
        let mut start = *p0;
        for (i, off) in offs.iter().enumerate() {
            let end = offs.get(i + 1).map(|next| off.midpoint(*next)).unwrap_or(*p1);
            quads.push(QuadBez::new(start, *off, end));
            start = end;
        }
        quads
    }

    fn signed_area(&self) -> f64 {
        match self {
            Segment::Line(p0, p1) => Line::new(*p0, *p1).signed_area(),
            Segment::Quad(..) => self.quads().iter().map(|q| q.signed_area()).sum(),
            Segment::Cubic(p0, p1, p2, p3) => CubicBez::new(*p0, *p1, *p2, *p3).signed_area(),
        }
    }
}

/// A single closed glyph contour consisting of a list of points.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Contour(pub Vec<ContourPoint>);

impl Contour {
    pub fn new(points: Vec<ContourPoint>) -> Contour {
        Contour(points)
    }

    pub fn points(&self) -> &[ContourPoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = PointKind> + '_ {
        self.0.iter().map(|p| p.kind)
    }

    pub fn has_cubic(&self) -> bool {
        self.kinds().any(|k| k == PointKind::OffCurveCubic)
    }

    pub fn has_quad(&self) -> bool {
        self.kinds().any(|k| k == PointKind::OffCurveQuad)
    }

    /// Check the point pattern, returning the index of the first bad point.
    ///
    /// Off-curve runs must be of a single kind and cubic runs must hold exactly two
    /// points. A contour made only of quadratic off-curves is legal.
    pub fn validate(&self) -> Result<(), usize> {
        if self.0.is_empty() {
            return Err(0);
        }
        let Some(start) = self.first_on_curve() else {
            return match self.0.iter().position(|p| p.kind != PointKind::OffCurveQuad) {
                Some(bad) => Err(bad),
                None => Ok(()),
            };
        };
        let n = self.0.len();
        let mut run: Vec<usize> = Vec::new();
        for step in 1..=n {
            let idx = (start + step) % n;
            let kind = self.0[idx].kind;
            if kind.is_on_curve() {
                if let Some(bad) = bad_off_curve_run(&self.0, &run) {
                    return Err(bad);
                }
                run.clear();
            } else {
                run.push(idx);
            }
        }
        Ok(())
    }

    pub fn first_on_curve(&self) -> Option<usize> {
        self.0.iter().position(|p| p.kind.is_on_curve())
    }

    /// Segments of the contour, starting from the first on-curve point.
    ///
    /// Assumes the contour validated.
    pub fn segments(&self) -> Vec<Segment> {
        let n = self.0.len();
        if n == 0 {
            return Vec::new();
        }
        let Some(start) = self.first_on_curve() else {
            // all off-curve quadratic: begin at the implied point between last and first
            let offs: Vec<_> = self.0.iter().map(|p| p.point()).collect();
            let implied = offs[n - 1].midpoint(offs[0]);
            return vec![Segment::Quad(implied, offs, implied)];
        };
        let mut segments = Vec::new();
        let mut prev = self.0[start].point();
        let mut offs: Vec<ContourPoint> = Vec::new();
        for step in 1..=n {
            let pt = self.0[(start + step) % n];
            if !pt.kind.is_on_curve() {
                offs.push(pt);
                continue;
            }
            let end = pt.point();
            let segment = match offs.first().map(|p| p.kind) {
                None => Segment::Line(prev, end),
                Some(PointKind::OffCurveCubic) if offs.len() == 2 => {
                    Segment::Cubic(prev, offs[0].point(), offs[1].point(), end)
                }
                _ => Segment::Quad(prev, offs.iter().map(|p| p.point()).collect(), end),
            };
            segments.push(segment);
            offs.clear();
            prev = end;
        }
        segments
    }

    /// Rebuild a contour from connected segments.
    pub fn from_segments(segments: &[Segment]) -> Contour {
        let mut points = Vec::new();
        if let Some(first) = segments.first() {
            let p = first.start();
            points.push(ContourPoint::on(p.x, p.y));
        }
        for (i, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Line(..) => (),
                Segment::Quad(_, offs, _) => {
                    points.extend(offs.iter().map(|p| ContourPoint::quad(p.x, p.y)))
                }
                Segment::Cubic(_, c0, c1, _) => {
                    points.push(ContourPoint::cubic(c0.x, c0.y));
                    points.push(ContourPoint::cubic(c1.x, c1.y));
                }
            }
            // the last segment closes back on the first point
            if i + 1 < segments.len() {
                let end = segment.end();
                points.push(ContourPoint::on(end.x, end.y));
            }
        }
        Contour(points)
    }

    /// Convert to a closed kurbo path, expanding implied on-curve points.
    pub fn to_bez(&self) -> BezPath {
        let mut path = BezPath::new();
        let segments = self.segments();
        let Some(first) = segments.first() else {
            return path;
        };
        path.move_to(first.start());
        for segment in segments.iter() {
            match segment {
                Segment::Line(_, p1) => path.line_to(*p1),
                Segment::Quad(..) => {
                    for q in segment.quads() {
                        path.quad_to(q.p1, q.p2);
                    }
                }
                Segment::Cubic(_, p1, p2, p3) => path.curve_to(*p1, *p2, *p3),
            }
        }
        path.close_path();
        path
    }

    /// Split a kurbo path into contours, one per subpath.
    ///
    /// The explicit closing point kurbo paths tend to carry is folded into the start.
    pub fn from_bez(path: &BezPath) -> Vec<Contour> {
        let mut contours = Vec::new();
        let mut segments: Vec<Segment> = Vec::new();
        let mut start = Point::ZERO;
        let mut current = Point::ZERO;
        let mut flush = |segments: &mut Vec<Segment>, start: Point, current: Point| {
            if current.distance(start) > 1e-9 {
                segments.push(Segment::Line(current, start));
            }
            if !segments.is_empty() {
                contours.push(Contour::from_segments(segments));
            }
            segments.clear();
        };
        for el in path.elements() {
            match *el {
                PathEl::MoveTo(p) => {
                    flush(&mut segments, start, current);
                    start = p;
                    current = p;
                }
                PathEl::LineTo(p) => {
                    segments.push(Segment::Line(current, p));
                    current = p;
                }
                PathEl::QuadTo(p1, p2) => {
                    segments.push(Segment::Quad(current, vec![p1], p2));
                    current = p2;
                }
                PathEl::CurveTo(p1, p2, p3) => {
                    segments.push(Segment::Cubic(current, p1, p2, p3));
                    current = p3;
                }
                PathEl::ClosePath => {
                    flush(&mut segments, start, current);
                    current = start;
                }
            }
        }
        flush(&mut segments, start, current);
        contours
    }

    /// Reverse the drawing direction, keeping the first point in place.
    pub fn reverse(&mut self) {
        if self.0.len() > 1 {
            self.0[1..].reverse();
        }
    }

    /// Area enclosed by the contour; positive when counter-clockwise with y up.
    pub fn signed_area(&self) -> f64 {
        self.segments().iter().map(Segment::signed_area).sum()
    }

    pub fn is_clockwise(&self) -> bool {
        self.signed_area() < 0.0
    }

    pub fn apply_affine(&mut self, affine: Affine) {
        for pt in self.0.iter_mut() {
            let p = affine * pt.point();
            pt.x = p.x;
            pt.y = p.y;
        }
        // a mirroring transform flips direction; undo that so winding is preserved
        if affine.determinant() < 0.0 {
            self.reverse();
        }
    }
}

fn bad_off_curve_run(points: &[ContourPoint], run: &[usize]) -> Option<usize> {
    let first = run.first()?;
    let kind = points[*first].kind;
    if let Some(mixed) = run.iter().find(|i| points[**i].kind != kind) {
        return Some(*mixed);
    }
    if kind == PointKind::OffCurveCubic && run.len() != 2 {
        return Some(run[run.len().min(2) - 1]);
    }
    None
}

/// A single glyph component, reference to another glyph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Component {
    /// The name of the referenced glyph.
    pub base: GlyphName,
    /// Affine transformation to apply to the referenced glyph.
    #[serde(with = "crate::serde::affine2x3", default = "identity")]
    pub transform: Affine,
    #[serde(default)]
    pub use_my_metrics: bool,
}

fn identity() -> Affine {
    Affine::IDENTITY
}

impl Component {
    pub fn new(base: impl Into<GlyphName>, transform: Affine) -> Component {
        Component {
            base: base.into(),
            transform,
            use_my_metrics: false,
        }
    }

    /// True if the 2x2 part of the transform is anything but identity
    pub fn is_transformed(&self) -> bool {
        let [xx, yx, xy, yy, _, _] = self.transform.as_coeffs();
        [xx, yx, xy, yy] != [1.0, 0.0, 0.0, 1.0]
    }
}

/// A named attachment point, e.g. "top" on a base or "_top" on a mark.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Anchor {
    pub name: String,
    pub x: f64,
    pub y: f64,
}

impl Anchor {
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Anchor {
        Anchor {
            name: name.into(),
            x,
            y,
        }
    }

    /// Mark anchors are named for the base anchor they attach to, with a leading _
    pub fn is_mark(&self) -> bool {
        self.name.starts_with('_')
    }

    pub fn is_cursive(&self) -> bool {
        self.name == "entry" || self.name == "exit"
    }
}

/// A glyph as drawn in one master.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Glyph {
    pub name: GlyphName,
    #[serde(default)]
    pub codepoints: Vec<u32>,
    #[serde(default = "export_default")]
    pub export: bool,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub contours: Vec<Contour>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
}

fn export_default() -> bool {
    true
}

impl Glyph {
    pub fn new(name: impl Into<GlyphName>) -> Glyph {
        Glyph {
            name: name.into(),
            codepoints: Vec::new(),
            export: true,
            width: 0.0,
            height: None,
            contours: Vec::new(),
            components: Vec::new(),
            anchors: Vec::new(),
        }
    }

    pub fn is_composite(&self) -> bool {
        !self.components.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty() && self.components.is_empty()
    }

    pub fn anchor(&self, name: &str) -> Option<&Anchor> {
        self.anchors.iter().find(|a| a.name == name)
    }
}

/// A named snapshot of a glyph set at a fixed location in design space.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "MasterSerdeRepr", into = "MasterSerdeRepr")]
pub struct Master {
    pub name: String,
    pub location: DesignLocation,
    pub glyphs: IndexMap<GlyphName, Glyph>,
    pub kerning: Kerning,
}

impl Master {
    pub fn new(name: impl Into<String>, location: DesignLocation) -> Master {
        Master {
            name: name.into(),
            location,
            glyphs: IndexMap::new(),
            kerning: Kerning::default(),
        }
    }

    pub fn add_glyph(&mut self, glyph: Glyph) -> &mut Master {
        self.glyphs.insert(glyph.name.clone(), glyph);
        self
    }

    pub fn glyph(&self, name: &str) -> Option<&Glyph> {
        self.glyphs.get(name)
    }
}

/// One side of a kerning pair.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(from = "KernSideSerdeRepr", into = "KernSideSerdeRepr")]
pub enum KernSide {
    Glyph(GlyphName),
    Group(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KernPair {
    pub left: KernSide,
    pub right: KernSide,
    pub value: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Kerning {
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<GlyphName>>,
    #[serde(default)]
    pub pairs: Vec<KernPair>,
}

impl Kerning {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The glyphs a side stands for.
    pub fn glyphs<'a>(&'a self, side: &'a KernSide) -> Vec<&'a GlyphName> {
        match side {
            KernSide::Glyph(name) => vec![name],
            KernSide::Group(group) => self
                .groups
                .get(group)
                .map(|members| members.iter().collect())
                .unwrap_or_default(),
        }
    }
}

/// A named location to produce a static font for.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub style_name: Option<String>,
    pub location: DesignLocation,
}

/// Everything a build starts from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Designspace {
    pub family_name: String,
    #[serde(default = "upem_default")]
    pub units_per_em: u16,
    #[serde(default)]
    pub axes: Vec<Axis>,
    pub masters: Vec<Master>,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub glyph_order: Option<Vec<GlyphName>>,
    #[serde(default)]
    pub layout: LayoutRules,
}

fn upem_default() -> u16 {
    1000
}

impl Designspace {
    pub fn is_variable(&self) -> bool {
        self.masters.len() > 1
    }

    /// Normalized location of each master, in master order.
    pub fn master_locations(&self) -> Result<Vec<NormalizedLocation>, Error> {
        self.masters
            .iter()
            .map(|m| m.location.to_normalized(&self.axes).map_err(Error::from))
            .collect()
    }

    /// Index of the one master at the default location.
    pub fn default_master_idx(&self) -> Result<usize, Error> {
        let locations = self.master_locations()?;
        let defaults: Vec<_> = locations
            .iter()
            .enumerate()
            .filter(|(_, loc)| loc.is_default())
            .map(|(i, _)| i)
            .collect();
        match defaults.as_slice() {
            [] => Err(Error::NoDefaultMaster),
            [idx] => Ok(*idx),
            _ => Err(Error::MultipleDefaultMasters(
                defaults
                    .iter()
                    .map(|i| self.masters[*i].name.clone())
                    .collect(),
            )),
        }
    }

    pub fn default_master(&self) -> Result<&Master, Error> {
        Ok(&self.masters[self.default_master_idx()?])
    }

    /// The glyph order of the output: explicit if provided, otherwise the default
    /// master's, with .notdef first either way.
    pub fn glyph_order(&self) -> Result<Vec<GlyphName>, Error> {
        let default = self.default_master()?;
        let mut order: Vec<GlyphName> = match &self.glyph_order {
            Some(explicit) => {
                let mut order: Vec<_> = explicit
                    .iter()
                    .filter(|n| default.glyphs.contains_key(n.as_str()))
                    .cloned()
                    .collect();
                // anything the explicit order forgot goes at the end
                order.extend(
                    default
                        .glyphs
                        .keys()
                        .filter(|n| !explicit.contains(n))
                        .cloned(),
                );
                order
            }
            None => default.glyphs.keys().cloned().collect(),
        };
        if let Some(pos) = order.iter().position(|n| *n == GlyphName::NOTDEF) {
            let notdef = order.remove(pos);
            order.insert(0, notdef);
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use kiln_types::types::Tag;
    use pretty_assertions::assert_eq;

    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Contour {
        Contour::new(vec![
            ContourPoint::on(x, y),
            ContourPoint::on(x, y + size),
            ContourPoint::on(x + size, y + size),
            ContourPoint::on(x + size, y),
        ])
    }

    #[test]
    fn clockwise_square_has_negative_area() {
        let c = square(0.0, 0.0, 10.0);
        assert_eq!(-100.0, c.signed_area());
        assert!(c.is_clockwise());
    }

    #[test]
    fn reverse_keeps_start() {
        let mut c = square(0.0, 0.0, 10.0);
        c.reverse();
        assert_eq!(ContourPoint::on(0.0, 0.0), c.0[0]);
        assert_eq!(ContourPoint::on(10.0, 0.0), c.0[1]);
        assert_eq!(100.0, c.signed_area());
    }

    #[test]
    fn validate_finds_lone_cubic_offcurve() {
        let c = Contour::new(vec![
            ContourPoint::on(0.0, 0.0),
            ContourPoint::cubic(0.0, 10.0),
            ContourPoint::on(10.0, 10.0),
        ]);
        assert_eq!(Err(1), c.validate());
    }

    #[test]
    fn validate_finds_mixed_offcurves() {
        let c = Contour::new(vec![
            ContourPoint::on(0.0, 0.0),
            ContourPoint::cubic(0.0, 10.0),
            ContourPoint::quad(5.0, 10.0),
            ContourPoint::on(10.0, 10.0),
        ]);
        assert_eq!(Err(2), c.validate());
    }

    #[test]
    fn all_offcurve_quadratic_is_valid() {
        let c = Contour::new(vec![
            ContourPoint::quad(0.0, 0.0),
            ContourPoint::quad(0.0, 10.0),
            ContourPoint::quad(10.0, 10.0),
            ContourPoint::quad(10.0, 0.0),
        ]);
        assert_eq!(Ok(()), c.validate());
        assert_eq!(1, c.segments().len());
        assert_eq!(4, c.segments()[0].quads().len());
    }

    #[test]
    fn wrapping_offcurves_form_a_segment() {
        let c = Contour::new(vec![
            ContourPoint::cubic(0.0, 5.0),
            ContourPoint::on(0.0, 10.0),
            ContourPoint::on(10.0, 10.0),
            ContourPoint::on(10.0, 0.0),
            ContourPoint::cubic(5.0, 0.0),
        ]);
        assert_eq!(Ok(()), c.validate());
        let segments = c.segments();
        assert_eq!(3, segments.len());
        assert!(matches!(segments[2], Segment::Cubic(..)));
    }

    #[test]
    fn bez_round_trip_keeps_points() {
        let c = Contour::new(vec![
            ContourPoint::on(0.0, 0.0),
            ContourPoint::cubic(0.0, 5.0),
            ContourPoint::cubic(5.0, 10.0),
            ContourPoint::on(10.0, 10.0),
            ContourPoint::on(10.0, 0.0),
        ]);
        assert_eq!(vec![c.clone()], Contour::from_bez(&c.to_bez()));
    }

    #[test]
    fn mirroring_preserves_direction() {
        let mut c = square(0.0, 0.0, 10.0);
        c.apply_affine(Affine::FLIP_X);
        assert!(c.is_clockwise());
    }

    #[test]
    fn glyph_order_puts_notdef_first() {
        let mut master = Master::new("Regular", DesignLocation::new());
        master.add_glyph(Glyph::new("A"));
        master.add_glyph(Glyph::new(".notdef"));
        let ds = Designspace {
            family_name: "Test".to_string(),
            units_per_em: 1000,
            axes: Vec::new(),
            masters: vec![master],
            instances: Vec::new(),
            glyph_order: None,
            layout: LayoutRules::default(),
        };
        assert_eq!(
            vec![GlyphName::NOTDEF, GlyphName::new("A")],
            ds.glyph_order().unwrap()
        );
    }

    #[test]
    fn two_default_masters_is_an_error() {
        let axis = Axis::new("Weight", Tag::new(b"wght"), 400.0, 400.0, 700.0, Vec::new());
        let masters = ["a", "b"]
            .into_iter()
            .map(|n| Master::new(n, DesignLocation::for_pos(&[("Weight", 400.0)])))
            .collect();
        let ds = Designspace {
            family_name: "Test".to_string(),
            units_per_em: 1000,
            axes: vec![axis],
            masters,
            instances: Vec::new(),
            glyph_order: None,
            layout: LayoutRules::default(),
        };
        assert!(matches!(
            ds.default_master_idx(),
            Err(Error::MultipleDefaultMasters(..))
        ));
    }

    #[test]
    fn designspace_yaml() {
        let yml = r#"
family_name: Test
axes:
  - name: Weight
    tag: wght
    min: 400
    default: 400
    max: 700
masters:
  - name: Regular
    location: { Weight: 400 }
    glyphs:
      - name: A
        codepoints: [65]
        width: 600
        contours:
          - - { x: 0, y: 0, kind: on_curve }
            - { x: 300, y: 700, kind: on_curve }
            - { x: 600, y: 0, kind: on_curve }
      - name: Aacute
        components:
          - base: A
          - base: acute
            transform: { dx: 200, dy: 100 }
    kerning:
      groups:
        public.kern1.A: [A, Aacute]
      pairs:
        - { left: public.kern1.A, right: V, value: -50 }
"#;
        let ds: Designspace = serde_yaml::from_str(yml).unwrap();
        let master = &ds.masters[0];
        assert_eq!(1000, ds.units_per_em);
        assert_eq!(
            vec!["A", "Aacute"],
            master.glyphs.keys().map(|n| n.as_str()).collect::<Vec<_>>()
        );
        let aacute = master.glyph("Aacute").unwrap();
        assert_eq!(Affine::translate((200.0, 100.0)), aacute.components[1].transform);
        assert_eq!(
            KernSide::Group("public.kern1.A".to_string()),
            master.kerning.pairs[0].left
        );
        assert_eq!(KernSide::Glyph("V".into()), master.kerning.pairs[0].right);

        let round_tripped: Designspace =
            serde_yaml::from_str(&serde_yaml::to_string(&ds).unwrap()).unwrap();
        assert_eq!(ds, round_tripped);
    }
}
