//! VariableFontAssembler: per glyph deltas for a
//! [gvar](https://learn.microsoft.com/en-us/typography/opentype/spec/gvar) table.

use std::collections::{BTreeSet, HashMap, HashSet};

use kiln_ir::{
    ir::{Designspace, Glyph, Master},
    variations::{VariationModel, VariationRegion},
};
use kiln_types::{
    coords::NormalizedLocation,
    types::{Axis, GlyphName},
};
use kurbo::{Point, Vec2};
use log::{debug, trace};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use write_fonts::{types::F2Dot14, OtRound};

use crate::{
    error::{Error, GlyphProblem},
    glyf::{contour_ends, point_seq},
    iup::{iup_delta_optimize, verify, DEFAULT_TOLERANCE},
};

/// The deltas for one region of the designspace.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TupleVariation {
    /// One per axis, in font axis order
    pub peak: Vec<F2Dot14>,
    /// Start and end, only when they aren't implied by the peak
    pub intermediate: Option<(Vec<F2Dot14>, Vec<F2Dot14>)>,
    /// None where the delta is inferred
    pub deltas: Vec<Option<(i16, i16)>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GlyphVariations {
    pub glyph_name: GlyphName,
    pub variations: Vec<TupleVariation>,
}

/// <https://learn.microsoft.com/en-us/typography/opentype/spec/otvaroverview#variation-data>
#[derive(Debug, Default)]
struct TupleBuilder {
    min: Vec<F2Dot14>,
    peak: Vec<F2Dot14>,
    max: Vec<F2Dot14>,
    implied: bool,
}

impl TupleBuilder {
    fn new(region: &VariationRegion, axes: &[Axis]) -> TupleBuilder {
        let mut builder = TupleBuilder {
            implied: true,
            ..Default::default()
        };
        for axis in axes {
            let (min, peak, max) = region
                .get(&axis.name)
                .map(|tent| tent.bounds())
                .unwrap_or_default();
            builder.implied &= min == peak.min(0.0) && max == peak.max(0.0);
            builder.min.push(F2Dot14::from_f32(min as f32));
            builder.peak.push(F2Dot14::from_f32(peak as f32));
            builder.max.push(F2Dot14::from_f32(max as f32));
        }
        trace!("{builder:?}");
        builder
    }

    fn build(self, deltas: Vec<Option<(i16, i16)>>) -> TupleVariation {
        TupleVariation {
            peak: self.peak,
            intermediate: (!self.implied).then_some((self.min, self.max)),
            deltas,
        }
    }
}

fn round_delta(v: Vec2) -> (i16, i16) {
    (v.x.ot_round(), v.y.ot_round())
}

#[derive(Debug)]
pub struct VariableFontAssembler {
    axes: Vec<Axis>,
    locations: Vec<NormalizedLocation>,
    default_master: usize,
    optimize: bool,
    // models for glyphs only some masters have, keyed by master indices
    models: Mutex<HashMap<BTreeSet<usize>, VariationModel>>,
}

impl VariableFontAssembler {
    /// `optimize` turns on IUP.
    pub fn new(designspace: &Designspace, optimize: bool) -> Result<VariableFontAssembler, Error> {
        Ok(VariableFontAssembler {
            axes: designspace.axes.clone(),
            locations: designspace.master_locations()?,
            default_master: designspace.default_master_idx()?,
            optimize,
            models: Mutex::new(HashMap::new()),
        })
    }

    fn model(&self, masters: &BTreeSet<usize>) -> Result<VariationModel, Error> {
        if let Some(model) = self.models.lock().get(masters) {
            return Ok(model.clone());
        }
        let locations: HashSet<_> = masters.iter().map(|i| self.locations[*i].clone()).collect();
        let model =
            VariationModel::new(locations, &self.axes).map_err(kiln_ir::error::Error::from)?;
        self.models.lock().insert(masters.clone(), model.clone());
        Ok(model)
    }

    /// Deltas for one glyph across every master that has it.
    pub fn glyph_variations(
        &self,
        masters: &[Master],
        glyph_name: &GlyphName,
    ) -> Result<GlyphVariations, Error> {
        let bad = |problem| Error::GlyphError(glyph_name.clone(), problem);
        let glyphs: Vec<(usize, &Glyph)> = masters
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.glyph(glyph_name.as_str()).map(|g| (i, g)))
            .collect();
        let Some((_, default_glyph)) = glyphs.iter().find(|(i, _)| *i == self.default_master) else {
            return Err(bad(GlyphProblem::MissingFromDefault));
        };

        let present: BTreeSet<usize> = glyphs.iter().map(|(i, _)| *i).collect();
        let model = self.model(&present)?;
        let point_seqs: HashMap<NormalizedLocation, Vec<Point>> = glyphs
            .iter()
            .map(|(i, g)| (self.locations[*i].clone(), point_seq(g)))
            .collect();
        let deltas = model
            .deltas::<Point, Vec2>(&point_seqs)
            .map_err(|e| bad(GlyphProblem::NotInterpolatable(e.to_string())))?;

        let coords = point_seq(default_glyph);
        let ends = contour_ends(default_glyph);
        let mut variations = Vec::new();
        for (region, deltas) in deltas {
            if region.is_default() {
                continue;
            }
            let rounded: Vec<(i16, i16)> = deltas.into_iter().map(round_delta).collect();
            if rounded.iter().all(|d| *d == (0, 0)) {
                continue;
            }
            let sparse = if self.optimize {
                let full: Vec<Vec2> = rounded
                    .iter()
                    .map(|(x, y)| Vec2::new(*x as f64, *y as f64))
                    .collect();
                let sparse = iup_delta_optimize(&full, &coords, &ends, DEFAULT_TOLERANCE);
                if let Some(idx) = verify(&full, &sparse, &coords, &ends, DEFAULT_TOLERANCE) {
                    return Err(Error::OptimizationInvariant {
                        stage: "IUP",
                        glyph_name: glyph_name.clone(),
                        detail: format!(
                            "point {idx} infers a different delta than {:?}",
                            full[idx]
                        ),
                    });
                }
                sparse.into_iter().map(|d| d.map(round_delta)).collect()
            } else {
                rounded.into_iter().map(Some).collect()
            };
            variations.push(TupleBuilder::new(&region, &self.axes).build(sparse));
        }
        Ok(GlyphVariations {
            glyph_name: glyph_name.clone(),
            variations,
        })
    }

    /// Variations for every glyph in `glyph_order`, in order.
    pub fn assemble(
        &self,
        masters: &[Master],
        glyph_order: &[GlyphName],
    ) -> Result<Vec<GlyphVariations>, Error> {
        let results: Vec<_> = glyph_order
            .par_iter()
            .map(|name| self.glyph_variations(masters, name))
            .collect();
        let mut variations = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(v) => variations.push(v),
                Err(Error::GlyphError(name, problem)) => errors.push((name, problem)),
                Err(e) => return Err(e),
            }
        }
        if !errors.is_empty() {
            return Err(Error::GlyphErrors(errors));
        }
        debug!(
            "{} of {} glyphs vary",
            variations.iter().filter(|v| !v.variations.is_empty()).count(),
            variations.len()
        );
        Ok(variations)
    }
}

#[cfg(test)]
mod tests {
    use kiln_ir::{
        ir::{Contour, ContourPoint, Designspace, Glyph, Master},
        layout::LayoutRules,
    };
    use kiln_types::{
        coords::DesignLocation,
        types::{Axis, GlyphName, Tag},
    };
    use pretty_assertions::assert_eq;
    use write_fonts::types::F2Dot14;

    use crate::error::{Error, GlyphProblem};

    use super::VariableFontAssembler;

    fn square(size: f64) -> Glyph {
        let mut glyph = Glyph::new("square");
        glyph.width = size + 100.0;
        glyph.contours.push(Contour::new(vec![
            ContourPoint::on(50.0, 0.0),
            ContourPoint::on(50.0, size),
            ContourPoint::on(50.0 + size, size),
            ContourPoint::on(50.0 + size, 0.0),
        ]));
        glyph
    }

    fn master(name: &str, wght: f64, size: f64) -> Master {
        let mut master = Master::new(name, DesignLocation::for_pos(&[("Weight", wght)]));
        master.add_glyph(square(size));
        master
    }

    fn designspace(masters: Vec<Master>) -> Designspace {
        Designspace {
            family_name: "Test".to_string(),
            units_per_em: 1000,
            axes: vec![Axis::new(
                "Weight",
                Tag::new(b"wght"),
                400.0,
                400.0,
                700.0,
                Vec::new(),
            )],
            masters,
            instances: Vec::new(),
            glyph_order: None,
            layout: LayoutRules::default(),
        }
    }

    #[test]
    fn full_deltas_without_iup() {
        let ds = designspace(vec![
            master("Regular", 400.0, 100.0),
            master("Bold", 700.0, 140.0),
        ]);
        let assembler = VariableFontAssembler::new(&ds, false).unwrap();
        let gv = assembler
            .glyph_variations(&ds.masters, &GlyphName::from("square"))
            .unwrap();
        assert_eq!(1, gv.variations.len());
        let tuple = &gv.variations[0];
        assert_eq!(vec![F2Dot14::from_f32(1.0)], tuple.peak);
        assert_eq!(None, tuple.intermediate);
        assert_eq!(
            vec![
                Some((0, 0)),
                Some((0, 40)),
                Some((40, 40)),
                Some((40, 0)),
                Some((0, 0)),
                Some((40, 0)),
                Some((0, 0)),
                Some((0, 0)),
            ],
            tuple.deltas
        );
    }

    #[test]
    fn iup_drops_inferable_deltas() {
        let ds = designspace(vec![
            master("Regular", 400.0, 100.0),
            master("Bold", 700.0, 140.0),
        ]);
        let assembler = VariableFontAssembler::new(&ds, true).unwrap();
        let gv = assembler
            .glyph_variations(&ds.masters, &GlyphName::from("square"))
            .unwrap();
        let deltas = &gv.variations[0].deltas;
        assert_eq!(8, deltas.len());
        assert!(deltas[..4].iter().any(Option::is_none));
        // the advance is a phantom, it must survive
        assert_eq!(Some((40, 0)), deltas[5]);
    }

    #[test]
    fn static_glyph_has_no_variations() {
        let ds = designspace(vec![
            master("Regular", 400.0, 100.0),
            master("Bold", 700.0, 100.0),
        ]);
        let assembler = VariableFontAssembler::new(&ds, true).unwrap();
        let all = assembler
            .assemble(&ds.masters, &[GlyphName::from("square")])
            .unwrap();
        assert!(all[0].variations.is_empty());
    }

    #[test]
    fn intermediate_master() {
        let ds = designspace(vec![
            master("Regular", 400.0, 100.0),
            master("Medium", 550.0, 130.0),
            master("Bold", 700.0, 140.0),
        ]);
        let assembler = VariableFontAssembler::new(&ds, false).unwrap();
        let gv = assembler
            .glyph_variations(&ds.masters, &GlyphName::from("square"))
            .unwrap();
        assert_eq!(2, gv.variations.len());
        let medium = gv
            .variations
            .iter()
            .find(|v| v.peak == vec![F2Dot14::from_f32(0.5)])
            .unwrap();
        assert_eq!(
            Some((vec![F2Dot14::from_f32(0.0)], vec![F2Dot14::from_f32(1.0)])),
            medium.intermediate
        );
    }

    #[test]
    fn missing_from_default() {
        let mut bold = master("Bold", 700.0, 140.0);
        bold.add_glyph(Glyph::new("extra"));
        let ds = designspace(vec![master("Regular", 400.0, 100.0), bold]);
        let assembler = VariableFontAssembler::new(&ds, false).unwrap();
        match assembler.assemble(&ds.masters, &[GlyphName::from("extra")]) {
            Err(Error::GlyphErrors(errors)) => {
                assert_eq!(
                    vec![(GlyphName::from("extra"), GlyphProblem::MissingFromDefault)],
                    errors
                )
            }
            other => panic!("expected glyph errors, got {other:?}"),
        }
    }

    #[test]
    fn incompatible_point_counts() {
        let mut bold = master("Bold", 700.0, 140.0);
        bold.glyphs["square"].contours[0]
            .0
            .push(ContourPoint::on(0.0, 0.0));
        let ds = designspace(vec![master("Regular", 400.0, 100.0), bold]);
        let assembler = VariableFontAssembler::new(&ds, false).unwrap();
        assert!(matches!(
            assembler.glyph_variations(&ds.masters, &GlyphName::from("square")),
            Err(Error::GlyphError(_, GlyphProblem::NotInterpolatable(_)))
        ));
    }
}
