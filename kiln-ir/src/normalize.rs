//! ContourNormalizer: get outlines ready for a binary glyph table.
//!
//! Validates point patterns, resolves components, removes overlaps, applies the
//! curve policy, and fixes contour direction. Per glyph work runs on the rayon pool;
//! problems are collected and reported together unless asked to fail fast.

use std::collections::BTreeSet;

use indexmap::IndexSet;
use kiln_types::types::GlyphName;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::{
    components::{
        decompose_components, decompose_mixed, flatten_components, propagate_use_my_metrics,
    },
    curves::{
        apply_curve_policy, drop_implied_oncurves, elevate_quadratics, normalize_direction,
        CurvePolicy,
    },
    error::{BadGlyph, BadGlyphKind, Error},
    ir::{Glyph, Master},
    orchestration::Flags,
    overlaps::OverlapBackend,
};

/// Which kind of outlines the target wants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlineFormat {
    /// glyf, with a curve policy and tolerance in font units
    TrueType { policy: CurvePolicy, tolerance: f64 },
    /// CFF or CFF2 charstrings, cubic only
    PostScript,
}

#[derive(Debug)]
pub struct NormalizeOptions {
    pub flags: Flags,
    pub overlaps: Box<dyn OverlapBackend>,
    pub format: OutlineFormat,
    /// Building a variable font; overlaps can't be removed without breaking compatibility
    pub variable: bool,
}

/// What normalization found out along the way.
#[derive(Debug, Default, PartialEq)]
pub struct NormalizeReport {
    /// Glyphs left overlapping, to be flagged OVERLAP_SIMPLE
    pub overlaps_kept: BTreeSet<GlyphName>,
}

#[derive(Debug)]
pub struct ContourNormalizer {
    options: NormalizeOptions,
}

fn aggregate(mut errors: Vec<BadGlyph>) -> Result<(), Error> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(Error::BadGlyph(errors.remove(0))),
        _ => Err(Error::GlyphErrors(errors)),
    }
}

impl ContourNormalizer {
    pub fn new(options: NormalizeOptions) -> ContourNormalizer {
        ContourNormalizer { options }
    }

    fn is_truetype(&self) -> bool {
        matches!(self.options.format, OutlineFormat::TrueType { .. })
    }

    pub fn run(
        &self,
        masters: &mut [Master],
        default_master: usize,
    ) -> Result<NormalizeReport, Error> {
        validate_contours(masters)?;
        self.resolve_components(masters)?;
        let report = self.overlaps(masters);
        self.per_glyph(masters, default_master)?;

        if self.is_truetype() && self.options.flags.contains(Flags::AUTO_USE_MY_METRICS) {
            propagate_use_my_metrics(masters, default_master);
        }
        Ok(report)
    }

    fn resolve_components(&self, masters: &mut [Master]) -> Result<(), Error> {
        let mut errors = Vec::new();
        for master in masters.iter_mut() {
            let result = if self.is_truetype() {
                decompose_mixed(master).and_then(|_| {
                    if self.options.flags.contains(Flags::FLATTEN_COMPONENTS) {
                        flatten_components(master)
                    } else {
                        Ok(())
                    }
                })
            } else {
                // charstrings can't reference other glyphs
                decompose_components(master, |_, _| true)
            };
            if let Err(e) = result {
                errors.extend(e);
            }
        }
        errors.dedup();
        aggregate(errors)
    }

    fn overlaps(&self, masters: &mut [Master]) -> NormalizeReport {
        let backend = &self.options.overlaps;
        let remove = self.options.flags.contains(Flags::REMOVE_OVERLAPS);
        if self.options.variable {
            // Look but don't touch
            let kept = Mutex::new(BTreeSet::new());
            for master in masters.iter() {
                master
                    .glyphs
                    .values()
                    .collect::<Vec<_>>()
                    .into_par_iter()
                    .filter(|g| !g.contours.is_empty() && backend.union(&g.contours) != g.contours)
                    .for_each(|g| {
                        kept.lock().insert(g.name.clone());
                    });
            }
            let overlaps_kept = kept.into_inner();
            if remove && !overlaps_kept.is_empty() {
                info!(
                    "Variable font: {} overlapping glyphs keep their overlaps",
                    overlaps_kept.len()
                );
            }
            return NormalizeReport { overlaps_kept };
        }
        if !remove {
            debug!("Keeping overlaps");
            return NormalizeReport::default();
        }
        debug!("Removing overlaps with {}", backend.name());
        for master in masters.iter_mut() {
            master
                .glyphs
                .values_mut()
                .collect::<Vec<_>>()
                .into_par_iter()
                .for_each(|g| backend.remove_overlaps(g));
        }
        NormalizeReport::default()
    }

    /// Curves, implied on-curves, and direction, for one glyph in every master at once.
    fn normalize_glyph(&self, glyphs: &mut [&mut Glyph], reference: usize) -> Result<(), BadGlyph> {
        let flags = self.options.flags;
        match self.options.format {
            OutlineFormat::TrueType { policy, tolerance } => {
                apply_curve_policy(glyphs, policy, tolerance)?;
                if flags.contains(Flags::DROP_IMPLIED_ONCURVES) {
                    drop_implied_oncurves(glyphs);
                }
            }
            OutlineFormat::PostScript => {
                for glyph in glyphs.iter_mut() {
                    glyph.contours = glyph.contours.iter().map(elevate_quadratics).collect();
                }
            }
        }
        if !flags.contains(Flags::KEEP_DIRECTION) {
            normalize_direction(glyphs, reference, self.is_truetype());
        }
        Ok(())
    }

    fn per_glyph(&self, masters: &mut [Master], default_master: usize) -> Result<(), Error> {
        let names: Vec<GlyphName> = masters
            .get(default_master)
            .into_iter()
            .chain(masters.iter())
            .flat_map(|m| m.glyphs.keys().cloned())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();

        let readonly: &[Master] = masters;
        let normalize = |name: &GlyphName| -> Result<Vec<(usize, Glyph)>, BadGlyph> {
            let mut copies: Vec<(usize, Glyph)> = readonly
                .iter()
                .enumerate()
                .filter_map(|(i, m)| m.glyph(name.as_str()).map(|g| (i, g.clone())))
                .collect();
            let reference = copies
                .iter()
                .position(|(i, _)| *i == default_master)
                .unwrap_or(0);
            let mut refs: Vec<&mut Glyph> = copies.iter_mut().map(|(_, g)| g).collect();
            self.normalize_glyph(&mut refs, reference)?;
            Ok(copies)
        };

        let converted: Vec<Vec<(usize, Glyph)>> = if self.options.flags.contains(Flags::FAIL_FAST) {
            names
                .par_iter()
                .map(normalize)
                .collect::<Result<_, _>>()
                .map_err(Error::BadGlyph)?
        } else {
            let (ok, errors): (Vec<_>, Vec<_>) = names
                .par_iter()
                .map(normalize)
                .partition(|r| r.is_ok());
            let errors: Vec<BadGlyph> = errors.into_iter().filter_map(Result::err).collect();
            for error in errors.iter().filter(|e| e.is_tolerance_exceeded()) {
                warn!("{error}");
            }
            aggregate(errors)?;
            ok.into_iter().filter_map(Result::ok).collect()
        };

        for copies in converted {
            for (master_idx, glyph) in copies {
                masters[master_idx].glyphs.insert(glyph.name.clone(), glyph);
            }
        }
        Ok(())
    }
}

/// Every contour of every glyph must have a valid point pattern.
pub fn validate_contours(masters: &[Master]) -> Result<(), Error> {
    let errors: Vec<BadGlyph> = masters
        .par_iter()
        .flat_map_iter(|m| m.glyphs.values())
        .filter_map(|glyph| {
            glyph
                .contours
                .iter()
                .enumerate()
                .find_map(|(contour, c)| c.validate().err().map(|point| (contour, point)))
                .map(|(contour, point)| {
                    BadGlyph::new(
                        glyph.name.clone(),
                        BadGlyphKind::OddPointPattern { contour, point },
                    )
                })
        })
        .collect();
    aggregate(errors)
}
