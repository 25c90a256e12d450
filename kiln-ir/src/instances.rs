//! Static instances interpolated from the masters.

use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;
use kiln_types::coords::{NormalizedCoord, NormalizedLocation};
use kurbo::Affine;
use log::{debug, warn};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::{
    error::{BadGlyph, BadGlyphKind, Error},
    ir::{Designspace, Glyph, Instance, KernPair, Kerning, Master},
    variations::VariationModel,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceOptions {
    /// Round coordinates, advances, anchors and kerning to integers
    pub round: bool,
    /// Permit instances outside the space the masters span
    pub extrapolate: bool,
}

/// The instances to build, optionally only those of one family.
pub fn select_instances<'a>(
    designspace: &'a Designspace,
    family_name: Option<&str>,
) -> Vec<&'a Instance> {
    let selected: Vec<_> = designspace
        .instances
        .iter()
        .filter(|i| {
            family_name.map_or(true, |family| {
                i.family_name.as_deref().unwrap_or(&designspace.family_name) == family
            })
        })
        .collect();
    if let (Some(family), true) = (family_name, selected.is_empty()) {
        warn!("No instance belongs to family '{family}'");
    }
    selected
}

/// Normalize an instance location, refusing anything outside the axis ranges
/// unless extrapolation is allowed.
pub fn instance_location(
    designspace: &Designspace,
    instance: &Instance,
    extrapolate: bool,
) -> Result<NormalizedLocation, Error> {
    // rejects unknown axes
    let mut normalized = instance.location.to_normalized(&designspace.axes)?;
    for axis in designspace.axes.iter() {
        let Some(pos) = instance.location.get(&axis.name) else {
            continue;
        };
        let (min, max) = axis.design_range();
        if *pos >= min && *pos <= max {
            continue;
        }
        if !extrapolate {
            return Err(Error::InstanceOutsideDesignspace {
                instance: instance.name.clone(),
                axis: axis.name.clone(),
                value: pos.to_f64(),
            });
        }
        // keep going along the outermost segment
        let default = axis.default_design().to_f64();
        let edge = if *pos > max { max } else { min }.to_f64();
        let extended = if edge == default {
            0.0
        } else {
            let sign = if *pos > max { 1.0 } else { -1.0 };
            sign * (pos.to_f64() - default) / (edge - default)
        };
        normalized.insert(axis.name.clone(), NormalizedCoord::new(extended));
    }
    Ok(normalized)
}

/// Round half up, as OpenType does, staying in f64
fn ot_round(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Every number that varies in a glyph, in a fixed order.
fn glyph_numbers(glyph: &Glyph) -> Vec<f64> {
    let mut numbers = Vec::new();
    for contour in glyph.contours.iter() {
        for point in contour.points() {
            numbers.push(point.x);
            numbers.push(point.y);
        }
    }
    for component in glyph.components.iter() {
        numbers.extend(component.transform.as_coeffs());
    }
    for anchor in glyph.anchors.iter() {
        numbers.push(anchor.x);
        numbers.push(anchor.y);
    }
    numbers.push(glyph.width);
    if let Some(height) = glyph.height {
        numbers.push(height);
    }
    numbers
}

/// What must agree across masters for [glyph_numbers] to line up.
fn glyph_structure(glyph: &Glyph) -> (Vec<usize>, usize, Vec<&str>, bool) {
    (
        glyph.contours.iter().map(|c| c.len()).collect(),
        glyph.components.len(),
        glyph.anchors.iter().map(|a| a.name.as_str()).collect(),
        glyph.height.is_some(),
    )
}

/// Inverse of [glyph_numbers], writing into a glyph of the same structure.
fn set_glyph_numbers(glyph: &mut Glyph, numbers: &[f64], round: bool) {
    let mut values = numbers.iter().map(|v| if round { ot_round(*v) } else { *v });
    let mut next = || values.next().unwrap_or_default();
    for contour in glyph.contours.iter_mut() {
        for point in contour.0.iter_mut() {
            point.x = next();
            point.y = next();
        }
    }
    for component in glyph.components.iter_mut() {
        let coeffs = [next(), next(), next(), next(), next(), next()];
        component.transform = Affine::new(coeffs);
    }
    for anchor in glyph.anchors.iter_mut() {
        anchor.x = next();
        anchor.y = next();
    }
    glyph.width = next();
    if glyph.height.is_some() {
        glyph.height = Some(next());
    }
}

/// Interpolates glyphs at arbitrary locations.
///
/// A glyph missing from some masters is interpolated from those that have it, so we
/// keep one model per distinct set of contributing masters.
pub struct Interpolator<'a> {
    designspace: &'a Designspace,
    locations: Vec<NormalizedLocation>,
    default_master: usize,
    models: Mutex<HashMap<BTreeSet<usize>, VariationModel>>,
}

impl<'a> Interpolator<'a> {
    pub fn new(designspace: &'a Designspace) -> Result<Interpolator<'a>, Error> {
        Ok(Interpolator {
            designspace,
            locations: designspace.master_locations()?,
            default_master: designspace.default_master_idx()?,
            models: Mutex::new(HashMap::new()),
        })
    }

    fn model(&self, masters: &BTreeSet<usize>) -> Result<VariationModel, Error> {
        if let Some(model) = self.models.lock().get(masters) {
            return Ok(model.clone());
        }
        let locations: HashSet<_> = masters.iter().map(|i| self.locations[*i].clone()).collect();
        let model = VariationModel::new(locations, &self.designspace.axes)?;
        self.models.lock().insert(masters.clone(), model.clone());
        Ok(model)
    }

    /// The glyph interpolated at location.
    pub fn glyph(
        &self,
        glyph_name: &str,
        location: &NormalizedLocation,
        options: InstanceOptions,
    ) -> Result<Glyph, Error> {
        let masters = &self.designspace.masters;
        let Some(default) = masters[self.default_master].glyph(glyph_name) else {
            return Err(BadGlyph::new(
                glyph_name,
                BadGlyphKind::MissingFromMaster(masters[self.default_master].name.clone()),
            )
            .into());
        };
        let sources: Vec<(usize, &Glyph)> = masters
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.glyph(glyph_name).map(|g| (i, g)))
            .collect();

        let mut result = default.clone();
        if sources.len() == 1 {
            set_glyph_numbers(&mut result, &glyph_numbers(default), options.round);
            return Ok(result);
        }

        let structure = glyph_structure(default);
        if let Some((i, _)) = sources.iter().find(|(_, g)| glyph_structure(g) != structure) {
            let why = format!("master '{}' differs in shape from the default", masters[*i].name);
            return Err(BadGlyph::new(glyph_name, BadGlyphKind::NotInterpolatable(why)).into());
        }

        let contributing: BTreeSet<usize> = sources.iter().map(|(i, _)| *i).collect();
        let model = self.model(&contributing)?;
        let point_seqs: HashMap<NormalizedLocation, Vec<f64>> = sources
            .iter()
            .map(|(i, glyph)| (self.locations[*i].clone(), glyph_numbers(glyph)))
            .collect();
        let numbers = model
            .interpolate(location, &point_seqs, options.extrapolate)
            .map_err(|e| {
                BadGlyph::new(glyph_name, BadGlyphKind::NotInterpolatable(e.to_string()))
            })?;
        set_glyph_numbers(&mut result, &numbers, options.round);
        Ok(result)
    }

    /// Kerning at location; pairs a master lacks count as zero there.
    pub fn kerning(
        &self,
        location: &NormalizedLocation,
        options: InstanceOptions,
    ) -> Result<Kerning, Error> {
        let masters = &self.designspace.masters;
        let mut pairs: IndexMap<(_, _), Vec<f64>> = IndexMap::new();
        for (idx, master) in masters.iter().enumerate() {
            for pair in master.kerning.pairs.iter() {
                pairs
                    .entry((pair.left.clone(), pair.right.clone()))
                    .or_insert_with(|| vec![0.0; masters.len()])[idx] = pair.value;
            }
        }
        let all: BTreeSet<usize> = (0..masters.len()).collect();
        let model = self.model(&all)?;
        let keys: Vec<_> = pairs.keys().cloned().collect();
        // one "point" per pair
        let point_seqs: HashMap<NormalizedLocation, Vec<f64>> = (0..masters.len())
            .map(|m| {
                (
                    self.locations[m].clone(),
                    pairs.values().map(|values| values[m]).collect(),
                )
            })
            .collect();
        let values = model.interpolate(location, &point_seqs, options.extrapolate)?;

        let mut groups = masters[self.default_master].kerning.groups.clone();
        for master in masters.iter() {
            for (name, members) in master.kerning.groups.iter() {
                groups.entry(name.clone()).or_insert_with(|| members.clone());
            }
        }
        Ok(Kerning {
            groups,
            pairs: keys
                .into_iter()
                .zip(values)
                .map(|((left, right), value)| KernPair {
                    left,
                    right,
                    value: if options.round { ot_round(value) } else { value },
                })
                .filter(|p| p.value != 0.0)
                .collect(),
        })
    }
}

/// Build the master-shaped glyph set of an instance.
pub fn interpolate_instance(
    designspace: &Designspace,
    instance: &Instance,
    options: InstanceOptions,
) -> Result<Master, Error> {
    let location = instance_location(designspace, instance, options.extrapolate)?;
    debug!("Interpolating {} at {location:?}", instance.name);
    let interpolator = Interpolator::new(designspace)?;
    let default = designspace.default_master()?;

    let results: Vec<Result<Glyph, Error>> = default
        .glyphs
        .keys()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|name| interpolator.glyph(name.as_str(), &location, options))
        .collect();

    let mut master = Master::new(instance.name.clone(), instance.location.clone());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(glyph) => {
                master.add_glyph(glyph);
            }
            Err(Error::BadGlyph(bad)) => errors.push(bad),
            Err(e) => return Err(e),
        }
    }
    if !errors.is_empty() {
        return Err(Error::GlyphErrors(errors));
    }
    master.kerning = interpolator.kerning(&location, options)?;
    Ok(master)
}
