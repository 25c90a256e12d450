//! Are the masters interpolatable?
//!
//! Every glyph present in more than one master must have the same contours, point
//! kinds, and components, in the same order. Nothing here mutates the font.

use std::fmt::Display;

use indexmap::IndexMap;
use kiln_types::types::GlyphName;
use log::{debug, warn};
use rayon::prelude::*;

use crate::{
    error::Error,
    ir::{Glyph, Master},
};

/// Why two masters can't interpolate a glyph.
#[derive(Debug, Clone, PartialEq)]
pub enum IncompatibilityKind {
    /// The first contour index that exists in only one master
    ContourCount { contour: usize, counts: (usize, usize) },
    PointCount { contour: usize, counts: (usize, usize) },
    PointKind { contour: usize, point: usize },
    /// The first component index whose base differs or exists in only one master
    Component { component: usize },
    /// Advisory, mark positioning may misbehave but the glyph still interpolates
    AnchorNames { names: (Vec<String>, Vec<String>) },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Incompatibility {
    pub glyph_name: GlyphName,
    pub masters: (String, String),
    pub kind: IncompatibilityKind,
}

impl Incompatibility {
    pub fn is_advisory(&self) -> bool {
        matches!(self.kind, IncompatibilityKind::AnchorNames { .. })
    }
}

impl Display for Incompatibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (a, b) = &self.masters;
        write!(f, "'{}' between '{a}' and '{b}': ", self.glyph_name)?;
        match &self.kind {
            IncompatibilityKind::ContourCount { contour, counts } => write!(
                f,
                "contour count {} vs {}, first mismatch at contour {contour}",
                counts.0, counts.1
            ),
            IncompatibilityKind::PointCount { contour, counts } => write!(
                f,
                "contour {contour} has {} vs {} points",
                counts.0, counts.1
            ),
            IncompatibilityKind::PointKind { contour, point } => {
                write!(f, "contour {contour} point {point} differs in kind")
            }
            IncompatibilityKind::Component { component } => {
                write!(f, "component {component} differs")
            }
            IncompatibilityKind::AnchorNames { names } => {
                write!(f, "anchors {:?} vs {:?}", names.0, names.1)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Compatibility {
    Compatible,
    Incompatible(Incompatibility),
}

/// Compare one glyph as drawn in two masters.
///
/// Structural problems come first; anchor names are only examined when the outlines
/// are compatible. Swapping the arguments swaps the master names and counts in the
/// report, nothing else.
pub fn compare_glyphs(
    (master_a, a): (&str, &Glyph),
    (master_b, b): (&str, &Glyph),
) -> Option<Incompatibility> {
    let kind = structural_mismatch(a, b).or_else(|| {
        let names = |g: &Glyph| {
            let mut names: Vec<_> = g.anchors.iter().map(|a| a.name.clone()).collect();
            names.sort();
            names
        };
        let (names_a, names_b) = (names(a), names(b));
        (names_a != names_b).then_some(IncompatibilityKind::AnchorNames {
            names: (names_a, names_b),
        })
    })?;
    Some(Incompatibility {
        glyph_name: a.name.clone(),
        masters: (master_a.to_string(), master_b.to_string()),
        kind,
    })
}

fn structural_mismatch(a: &Glyph, b: &Glyph) -> Option<IncompatibilityKind> {
    for (idx, (ca, cb)) in a.contours.iter().zip(b.contours.iter()).enumerate() {
        if ca.len() != cb.len() {
            return Some(IncompatibilityKind::PointCount {
                contour: idx,
                counts: (ca.len(), cb.len()),
            });
        }
        if let Some(point) = ca.kinds().zip(cb.kinds()).position(|(ka, kb)| ka != kb) {
            return Some(IncompatibilityKind::PointKind {
                contour: idx,
                point,
            });
        }
    }
    if a.contours.len() != b.contours.len() {
        return Some(IncompatibilityKind::ContourCount {
            contour: a.contours.len().min(b.contours.len()),
            counts: (a.contours.len(), b.contours.len()),
        });
    }
    let bases_a = a.components.iter().map(|c| &c.base);
    let bases_b = b.components.iter().map(|c| &c.base);
    if let Some(component) = bases_a.zip(bases_b).position(|(ba, bb)| ba != bb) {
        return Some(IncompatibilityKind::Component { component });
    }
    if a.components.len() != b.components.len() {
        return Some(IncompatibilityKind::Component {
            component: a.components.len().min(b.components.len()),
        });
    }
    None
}

/// Check one glyph across every master that has it, against the first that does.
pub fn check_glyph(
    masters: &[Master],
    glyph_name: &GlyphName,
) -> (Compatibility, Vec<Incompatibility>) {
    let mut present = masters
        .iter()
        .filter_map(|m| m.glyph(glyph_name.as_str()).map(|g| (m.name.as_str(), g)));
    let Some(reference) = present.next() else {
        return (Compatibility::Compatible, Vec::new());
    };
    let mut advisories = Vec::new();
    for other in present {
        match compare_glyphs(reference, other) {
            None => (),
            Some(problem) if problem.is_advisory() => advisories.push(problem),
            Some(problem) => return (Compatibility::Incompatible(problem), advisories),
        }
    }
    (Compatibility::Compatible, advisories)
}

/// Per glyph results, in glyph order of first appearance.
#[derive(Debug, Default)]
pub struct CompatibilityReport {
    pub results: IndexMap<GlyphName, Compatibility>,
    pub advisories: Vec<Incompatibility>,
}

impl CompatibilityReport {
    pub fn is_compatible(&self) -> bool {
        self.incompatibilities().next().is_none()
    }

    pub fn incompatibilities(&self) -> impl Iterator<Item = &Incompatibility> {
        self.results.values().filter_map(|c| match c {
            Compatibility::Compatible => None,
            Compatibility::Incompatible(problem) => Some(problem),
        })
    }

    /// Fatal: turn any incompatibility into an error.
    pub fn into_result(self) -> Result<(), Error> {
        let problems: Vec<_> = self.incompatibilities().cloned().collect();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::IncompatibleMasters(problems))
        }
    }

    /// Advisory: log whatever we found and carry on.
    pub fn log_warnings(&self) {
        for problem in self.incompatibilities().chain(self.advisories.iter()) {
            warn!("Incompatible masters: {problem}");
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CompatibilityChecker;

impl CompatibilityChecker {
    pub fn check(&self, masters: &[Master]) -> CompatibilityReport {
        let mut names: IndexMap<&GlyphName, usize> = IndexMap::new();
        for master in masters {
            for name in master.glyphs.keys() {
                *names.entry(name).or_default() += 1;
            }
        }
        let shared: Vec<_> = names
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name.clone())
            .collect();
        debug!(
            "Checking {} glyphs across {} masters for compatibility",
            shared.len(),
            masters.len()
        );

        let checked: Vec<_> = shared
            .par_iter()
            .map(|name| (name.clone(), check_glyph(masters, name)))
            .collect();
        let mut report = CompatibilityReport::default();
        for (name, (result, advisories)) in checked {
            report.results.insert(name, result);
            report.advisories.extend(advisories);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use kiln_types::coords::DesignLocation;
    use pretty_assertions::assert_eq;

    use crate::ir::{Anchor, Component, Contour, ContourPoint};

    use super::*;

    fn triangle(offset: f64) -> Contour {
        Contour::new(vec![
            ContourPoint::on(offset, 0.0),
            ContourPoint::on(offset + 50.0, 100.0),
            ContourPoint::on(offset + 100.0, 0.0),
        ])
    }

    fn glyph(name: &str, contours: usize, offset: f64) -> Glyph {
        let mut glyph = Glyph::new(name);
        glyph.contours = (0..contours).map(|i| triangle(i as f64 * 200.0 + offset)).collect();
        glyph
    }

    fn master(name: &str, glyphs: Vec<Glyph>) -> Master {
        let mut master = Master::new(name, DesignLocation::new());
        for glyph in glyphs {
            master.add_glyph(glyph);
        }
        master
    }

    #[test]
    fn identical_structure_is_compatible() {
        let masters = vec![
            master("Light", vec![glyph("A", 4, 0.0)]),
            master("Bold", vec![glyph("A", 4, 10.0)]),
        ];
        let report = CompatibilityChecker.check(&masters);
        assert_eq!(Some(&Compatibility::Compatible), report.results.get("A"));
        assert!(report.is_compatible());
    }

    #[test]
    fn contour_count_mismatch_names_first_missing_contour() {
        let masters = vec![
            master("Light", vec![glyph("B", 3, 0.0)]),
            master("Bold", vec![glyph("B", 4, 0.0)]),
        ];
        let report = CompatibilityChecker.check(&masters);
        let Some(Compatibility::Incompatible(problem)) = report.results.get("B") else {
            panic!("Expected an incompatibility, got {report:?}");
        };
        assert_eq!(GlyphName::new("B"), problem.glyph_name);
        assert_eq!(
            IncompatibilityKind::ContourCount {
                contour: 3,
                counts: (3, 4)
            },
            problem.kind
        );
        assert!(matches!(
            report.into_result(),
            Err(Error::IncompatibleMasters(problems)) if problems.len() == 1
        ));
    }

    #[test]
    fn comparison_is_symmetric() {
        let mut curvy = glyph("C", 2, 0.0);
        curvy.contours[1].0[1].kind = crate::ir::PointKind::OffCurveQuad;
        let plain = glyph("C", 2, 0.0);
        let ab = compare_glyphs(("a", &plain), ("b", &curvy)).unwrap();
        let ba = compare_glyphs(("b", &curvy), ("a", &plain)).unwrap();
        assert_eq!(ab.kind, ba.kind);
        assert_eq!(
            IncompatibilityKind::PointKind {
                contour: 1,
                point: 1
            },
            ab.kind
        );
        assert!(compare_glyphs(("a", &plain), ("b", &plain)).is_none());
    }

    #[test]
    fn component_order_matters() {
        let mut a = Glyph::new("Aacute");
        a.components = vec![
            Component::new("A", kurbo::Affine::IDENTITY),
            Component::new("acute", kurbo::Affine::IDENTITY),
        ];
        let mut b = a.clone();
        b.components.reverse();
        assert_eq!(
            Some(IncompatibilityKind::Component { component: 0 }),
            compare_glyphs(("a", &a), ("b", &b)).map(|p| p.kind)
        );
    }

    #[test]
    fn anchors_are_advisory() {
        let mut light = glyph("A", 1, 0.0);
        light.anchors.push(Anchor::new("top", 50.0, 100.0));
        let masters = vec![
            master("Light", vec![light]),
            master("Bold", vec![glyph("A", 1, 0.0)]),
        ];
        let report = CompatibilityChecker.check(&masters);
        assert!(report.is_compatible());
        assert_eq!(1, report.advisories.len());
    }

    #[test]
    fn glyph_in_one_master_is_not_checked() {
        let masters = vec![
            master("Light", vec![glyph("A", 1, 0.0), glyph("Z", 1, 0.0)]),
            master("Bold", vec![glyph("A", 1, 0.0)]),
        ];
        let report = CompatibilityChecker.check(&masters);
        assert!(!report.results.contains_key("Z"));
    }
}
