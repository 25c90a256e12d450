//! Variable CFF2 charstrings: one program for every master, with the differences
//! carried as blend operands indexing a variation store.
//!
//! See <https://learn.microsoft.com/en-us/typography/opentype/spec/cff2charstr#syntax-for-font-variations-support-operators>.

use std::collections::{BTreeSet, HashMap, HashSet};

use kiln_ir::{
    components::resolved_contours,
    ir::{Designspace, Master},
    variations::{VariationModel, VariationRegion},
};
use kiln_types::{
    coords::NormalizedLocation,
    types::{Axis, GlyphName},
};
use log::{debug, trace};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use write_fonts::types::F2Dot14;

use crate::error::{Error, GlyphProblem};

use super::{
    charstring::{CharString, Number, Operator, Token},
    Flavor,
};

/// (start, peak, end) on one axis.
pub type RegionAxis = (F2Dot14, F2Dot14, F2Dot14);

/// The regions blend deltas are for, as a CFF2 VariationStore holds them.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct VariationStore {
    /// Per region, one entry per axis in font axis order
    pub regions: Vec<Vec<RegionAxis>>,
    /// Per item variation data, indices into regions; charstrings select one with vsindex
    pub var_data: Vec<Vec<u16>>,
}

fn axis_scalar((start, peak, end): RegionAxis, v: f64) -> f64 {
    let (start, peak, end) = (start.to_f32() as f64, peak.to_f32() as f64, end.to_f32() as f64);
    if peak == 0.0 || start > peak || peak > end || (start < 0.0 && end > 0.0) || v == peak {
        return 1.0;
    }
    if v <= start || v >= end {
        return 0.0;
    }
    if v < peak {
        (v - start) / (peak - start)
    } else {
        (end - v) / (end - peak)
    }
}

impl VariationStore {
    /// How much each region of each item variation data applies at a location.
    pub fn scalars_at(&self, axes: &[Axis], location: &NormalizedLocation) -> Vec<Vec<f64>> {
        let region_scalars: Vec<f64> = self
            .regions
            .iter()
            .map(|region| {
                region
                    .iter()
                    .zip(axes)
                    .map(|(tent, axis)| {
                        let v = location.get(&axis.name).map(|p| p.to_f64()).unwrap_or_default();
                        axis_scalar(*tent, v)
                    })
                    .product()
            })
            .collect();
        self.var_data
            .iter()
            .map(|data| data.iter().map(|r| region_scalars[*r as usize]).collect())
            .collect()
    }

    /// Scalars that draw the default.
    pub fn default_scalars(&self) -> Vec<Vec<f64>> {
        self.var_data.iter().map(|d| vec![0.0; d.len()]).collect()
    }
}

fn region_axes(region: &VariationRegion, axes: &[Axis]) -> Vec<RegionAxis> {
    axes.iter()
        .map(|axis| {
            let (min, peak, max) = region
                .get(&axis.name)
                .map(|tent| tent.bounds())
                .unwrap_or_default();
            (
                F2Dot14::from_f32(min as f32),
                F2Dot14::from_f32(peak as f32),
                F2Dot14::from_f32(max as f32),
            )
        })
        .collect()
}

/// Deltas of coordinates that were snapped to integers are integers, give or take float error.
fn snap(value: f64) -> Number {
    let rounded = value.round();
    if (value - rounded).abs() < 1e-6 {
        Number::from_f64(rounded)
    } else {
        Number::from_f64(value)
    }
}

/// One glyph's blended program, before it knows its vsindex.
#[derive(Debug)]
struct BlendedGlyph {
    masters: BTreeSet<usize>,
    /// Non-default regions, in the order blend deltas list them
    regions: Vec<VariationRegion>,
    charstring: CharString,
}

/// Builds variable CFF2 charstrings from compatible masters.
#[derive(Debug)]
pub struct CharStringBlender {
    axes: Vec<Axis>,
    locations: Vec<NormalizedLocation>,
    default_master: usize,
    round_tolerance: f64,
    // models for glyphs only some masters have, keyed by master indices
    models: Mutex<HashMap<BTreeSet<usize>, VariationModel>>,
}

impl CharStringBlender {
    pub fn new(designspace: &Designspace, round_tolerance: f64) -> Result<Self, Error> {
        Ok(CharStringBlender {
            axes: designspace.axes.clone(),
            locations: designspace.master_locations()?,
            default_master: designspace.default_master_idx()?,
            round_tolerance,
            models: Mutex::new(HashMap::new()),
        })
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn master_locations(&self) -> &[NormalizedLocation] {
        &self.locations
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

    /// The generic program of every master that has the glyph.
    pub fn master_charstrings(
        &self,
        masters: &[Master],
        glyph_name: &GlyphName,
    ) -> Result<Vec<(usize, CharString)>, Error> {
        masters
            .iter()
            .enumerate()
            .filter(|(_, m)| m.glyph(glyph_name.as_str()).is_some())
            .map(|(i, master)| {
                let contours =
                    resolved_contours(master, glyph_name).map_err(kiln_ir::error::Error::from)?;
                let cs = CharString::from_contours(&contours, self.round_tolerance, Flavor::Cff2);
                Ok((i, cs))
            })
            .collect()
    }

    fn blend_glyph(
        &self,
        masters: &[Master],
        glyph_name: &GlyphName,
    ) -> Result<BlendedGlyph, Error> {
        let bad = |problem| Error::GlyphError(glyph_name.clone(), problem);
        let sources = self.master_charstrings(masters, glyph_name)?;
        let Some((_, default)) = sources.iter().find(|(i, _)| *i == self.default_master) else {
            return Err(bad(GlyphProblem::MissingFromDefault));
        };
        let commands = default.commands();
        let shape = |cs: &CharString| -> Vec<(usize, Token)> {
            cs.commands().iter().map(|(args, op)| (args.len(), *op)).collect()
        };
        let default_shape = shape(default);
        if let Some((i, _)) = sources.iter().find(|(_, cs)| shape(cs) != default_shape) {
            return Err(bad(GlyphProblem::NotInterpolatable(format!(
                "master '{}' draws with different commands",
                masters[*i].name
            ))));
        }

        let present: BTreeSet<usize> = sources.iter().map(|(i, _)| *i).collect();
        let model = self.model(&present)?;
        let operands: HashMap<NormalizedLocation, Vec<f64>> = sources
            .iter()
            .map(|(i, cs)| {
                let values = cs
                    .commands()
                    .into_iter()
                    .flat_map(|(args, _)| args.into_iter().map(Number::to_f64))
                    .collect();
                (self.locations[*i].clone(), values)
            })
            .collect();
        let deltas = model
            .deltas::<f64, f64>(&operands)
            .map_err(|e| bad(GlyphProblem::NotInterpolatable(e.to_string())))?;
        let (regions, deltas): (Vec<_>, Vec<_>) = deltas
            .into_iter()
            .filter(|(region, _)| !region.is_default())
            .unzip();

        let max_stack = Flavor::Cff2.max_stack();
        let mut charstring = CharString::default();
        let mut offset = 0;
        for (args, op) in commands {
            let range = offset..offset + args.len();
            offset = range.end;
            let varies = deltas
                .iter()
                .any(|d| d[range.clone()].iter().any(|v| snap(*v) != Number::Int(0)));
            if !varies {
                charstring.0.extend(args.into_iter().map(Token::Number));
                charstring.0.push(op);
                continue;
            }
            let needed = args.len() * (regions.len() + 1) + 1;
            if needed > max_stack {
                return Err(bad(GlyphProblem::NotInterpolatable(format!(
                    "blending {} operands over {} regions needs {needed} stack slots",
                    args.len(),
                    regions.len()
                ))));
            }
            let mut operands = args;
            for arg in range.clone() {
                operands.extend(deltas.iter().map(|d| snap(d[arg])));
            }
            operands.push(Number::Int(range.len() as i32));
            charstring.push(&operands, Operator::Blend);
            charstring.0.push(op);
        }
        trace!("{glyph_name} blends over {} regions", regions.len());
        Ok(BlendedGlyph {
            masters: present,
            regions,
            charstring,
        })
    }

    /// Blended charstrings in glyph order and the store their deltas refer to.
    pub fn blend(
        &self,
        masters: &[Master],
        glyph_order: &[GlyphName],
    ) -> Result<(Vec<CharString>, VariationStore), Error> {
        let results: Vec<_> = glyph_order
            .par_iter()
            .map(|name| self.blend_glyph(masters, name))
            .collect();
        let mut blended = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(glyph) => blended.push(glyph),
                Err(Error::GlyphError(name, problem)) => errors.push((name, problem)),
                Err(e) => return Err(e),
            }
        }
        if !errors.is_empty() {
            return Err(Error::GlyphErrors(errors));
        }

        let mut store = VariationStore::default();
        let mut regions: Vec<VariationRegion> = Vec::new();
        let mut data_for: HashMap<BTreeSet<usize>, usize> = HashMap::new();
        let mut charstrings = Vec::with_capacity(blended.len());
        for glyph in blended {
            let uses_blend = glyph
                .charstring
                .tokens()
                .contains(&Token::Operator(Operator::Blend));
            if !uses_blend {
                charstrings.push(glyph.charstring);
                continue;
            }
            let vsindex = match data_for.get(&glyph.masters) {
                Some(idx) => *idx,
                None => {
                    let mut indices = Vec::with_capacity(glyph.regions.len());
                    for region in glyph.regions.iter() {
                        let idx = match regions.iter().position(|r| r == region) {
                            Some(idx) => idx,
                            None => {
                                regions.push(region.clone());
                                store.regions.push(region_axes(region, &self.axes));
                                regions.len() - 1
                            }
                        };
                        indices.push(idx as u16);
                    }
                    store.var_data.push(indices);
                    data_for.insert(glyph.masters.clone(), store.var_data.len() - 1);
                    store.var_data.len() - 1
                }
            };
            let mut charstring = glyph.charstring;
            if vsindex != 0 {
                let mut prefixed = CharString::default();
                prefixed.push(&[Number::Int(vsindex as i32)], Operator::VsIndex);
                prefixed.0.extend(charstring.0);
                charstring = prefixed;
            }
            charstrings.push(charstring);
        }
        debug!(
            "{} regions in {} item variation data",
            store.regions.len(),
            store.var_data.len()
        );
        Ok((charstrings, store))
    }
}
