//! Subdivides variation space so masters can be turned into deltas, and back.
//!
//! The model matches `fontTools.varLib.models.VariationModel`, see
//! <https://github.com/fonttools/fonttools/blob/main/Lib/fontTools/varLib/models.py>.
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::{self, Debug, Display},
    ops::{Add, Mul, Sub},
};

use kiln_types::{
    coords::{NormalizedCoord, NormalizedLocation},
    types::Axis,
};
use log::{log_enabled, trace};
use ordered_float::OrderedFloat;

use crate::error::{DeltaError, VariationModelError};

/// Masters placed in variation space, each with the region it controls.
#[derive(Debug, Clone, PartialEq)]
pub struct VariationModel {
    axes: Vec<String>,
    default: NormalizedLocation,
    /// A master is only influenced by the masters before it.
    masters: Vec<ModelMaster>,
    /// Per axis extent of the masters, always including 0.
    extents: BTreeMap<String, (f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
struct ModelMaster {
    location: NormalizedLocation,
    support: VariationRegion,
    /// (index of an earlier master, how much of its delta applies here)
    weights: Vec<(usize, f64)>,
}

impl VariationModel {
    /// `axes` in order of importance; earlier axes are preferred when splitting regions.
    pub fn new(
        locations: HashSet<NormalizedLocation>,
        axes: &[Axis],
    ) -> Result<Self, VariationModelError> {
        if let Some(axis) = axes.iter().find(|a| a.is_point()) {
            return Err(VariationModelError::PointAxis(axis.name.clone()));
        }
        let axes: Vec<String> = axes.iter().map(|a| a.name.clone()).collect();

        let mut filled = Vec::with_capacity(locations.len());
        for location in locations {
            if location.axis_names().any(|name| !axes.contains(name)) {
                return Err(VariationModelError::UnknownAxes(location));
            }
            filled.push(fill(&axes, &location));
        }
        let on_axis = on_axis_positions(&filled);
        filled.sort_by_cached_key(|loc| sort_key(&axes, &on_axis, loc));
        filled.dedup();

        let mut extents: BTreeMap<String, (f64, f64)> =
            axes.iter().map(|a| (a.clone(), (0.0, 0.0))).collect();
        for (name, pos) in filled.iter().flat_map(|l| l.iter()) {
            if let Some((min, max)) = extents.get_mut(name) {
                *min = min.min(pos.to_f64());
                *max = max.max(pos.to_f64());
            }
        }

        let supports = supports(&axes, &filled, &extents);
        let masters: Vec<_> = filled
            .into_iter()
            .enumerate()
            .map(|(i, location)| {
                let weights = supports[..i]
                    .iter()
                    .enumerate()
                    .map(|(j, support)| (j, support.scalar_at(&location)))
                    .filter(|(_, w)| *w != 0.0)
                    .collect();
                ModelMaster {
                    location,
                    support: supports[i].clone(),
                    weights,
                }
            })
            .collect();

        if log_enabled!(log::Level::Trace) {
            for master in masters.iter() {
                trace!(
                    "{:?} supports {:?} weights {:?}",
                    master.location,
                    master.support,
                    master.weights
                );
            }
        }

        Ok(VariationModel {
            default: fill(&axes, &NormalizedLocation::new()),
            axes,
            masters,
            extents,
        })
    }

    /// Master locations, in the order deltas are produced.
    pub fn locations(&self) -> impl Iterator<Item = &NormalizedLocation> {
        self.masters.iter().map(|m| &m.location)
    }

    pub fn default_location(&self) -> &NormalizedLocation {
        &self.default
    }

    /// Absolute positions at master locations to a delta per region.
    ///
    /// Every location must be one of the model's masters, the default must be present and
    /// every sequence must have the same length. The first result is the default region
    /// whose deltas are the default positions themselves.
    ///
    /// P is a position (a [kurbo::Point], or f64 in 1d) and V the vector between two of them.
    pub fn deltas<P, V>(
        &self,
        point_seqs: &HashMap<NormalizedLocation, Vec<P>>,
    ) -> Result<Vec<(VariationRegion, Vec<V>)>, DeltaError>
    where
        P: Copy + Default + Sub<P, Output = V>,
        V: Copy + Mul<f64, Output = V> + Sub<V, Output = V>,
    {
        let point_seqs: HashMap<_, _> = point_seqs
            .iter()
            .map(|(loc, seq)| (fill(&self.axes, loc), seq))
            .collect();
        let Some(defaults) = point_seqs.get(&self.default) else {
            return Err(DeltaError::DefaultUndefined);
        };
        if let Some(unknown) = point_seqs
            .keys()
            .find(|loc| !self.masters.iter().any(|m| m.location == **loc))
        {
            return Err(DeltaError::UnknownLocation(unknown.clone()));
        }
        if point_seqs.values().any(|seq| seq.len() != defaults.len()) {
            return Err(DeltaError::InconsistentNumbersOfPoints);
        }

        let mut result: Vec<(VariationRegion, Vec<V>)> = Vec::new();
        let mut produced: Vec<Option<usize>> = vec![None; self.masters.len()];
        for (i, master) in self.masters.iter().enumerate() {
            let Some(points) = point_seqs.get(&master.location) else {
                continue;
            };
            // what earlier masters already contribute here is not part of this delta
            let earlier: Vec<(&[V], f64)> = master
                .weights
                .iter()
                .filter_map(|(j, w)| produced[*j].map(|r| (result[r].1.as_slice(), *w)))
                .collect();
            let deltas: Vec<V> = points
                .iter()
                .enumerate()
                .map(|(p, point)| {
                    earlier
                        .iter()
                        .fold(*point - P::default(), |delta, (other, w)| delta - other[p] * *w)
                })
                .collect();
            produced[i] = Some(result.len());
            result.push((master.support.clone(), deltas));
        }
        Ok(result)
    }

    /// How much each region, in [Self::locations] order, applies at a location.
    ///
    /// With `extrapolate` the outermost regions keep scaling past the last master.
    pub fn scalars_at(&self, location: &NormalizedLocation, extrapolate: bool) -> Vec<f64> {
        let location = fill(&self.axes, location);
        let extents = extrapolate.then_some(&self.extents);
        self.masters
            .iter()
            .map(|m| m.support.scalar_with(&location, extents))
            .collect()
    }

    /// Point sequences at any location, given a sequence for every master.
    pub fn interpolate<P, V>(
        &self,
        location: &NormalizedLocation,
        point_seqs: &HashMap<NormalizedLocation, Vec<P>>,
        extrapolate: bool,
    ) -> Result<Vec<P>, DeltaError>
    where
        P: Copy + Default + Sub<P, Output = V> + Add<V, Output = P>,
        V: Copy + Mul<f64, Output = V> + Sub<V, Output = V>,
    {
        let given: HashSet<_> = point_seqs.keys().map(|l| fill(&self.axes, l)).collect();
        if let Some(missing) = self.locations().find(|l| !given.contains(*l)) {
            return Err(DeltaError::UnknownLocation(missing.clone()));
        }
        let deltas = self.deltas::<P, V>(point_seqs)?;
        let scalars = self.scalars_at(location, extrapolate);
        let weighted: Vec<_> = deltas
            .iter()
            .zip(scalars)
            .filter(|(_, scalar)| *scalar != 0.0)
            .collect();
        let len = deltas.first().map(|(_, d)| d.len()).unwrap_or_default();
        Ok((0..len)
            .map(|p| {
                weighted
                    .iter()
                    .fold(P::default(), |pos, ((_, d), scalar)| pos + d[p] * *scalar)
            })
            .collect())
    }
}

/// The location with a coordinate for exactly the model's axes.
fn fill(axes: &[String], location: &NormalizedLocation) -> NormalizedLocation {
    axes.iter()
        .map(|name| {
            let pos = location
                .get(name)
                .copied()
                .unwrap_or_else(|| NormalizedCoord::new(0.0));
            (name.clone(), pos)
        })
        .collect()
}

fn non_zero(location: &NormalizedLocation) -> impl Iterator<Item = (&String, &NormalizedCoord)> {
    location.iter().filter(|(_, pos)| pos.to_f64() != 0.0)
}

/// Positions of masters that sit on a single axis.
fn on_axis_positions(
    locations: &[NormalizedLocation],
) -> HashMap<String, HashSet<NormalizedCoord>> {
    let mut on_axis: HashMap<String, HashSet<NormalizedCoord>> = HashMap::new();
    for location in locations {
        let mut active = non_zero(location);
        if let (Some((name, pos)), None) = (active.next(), active.next()) {
            on_axis.entry(name.clone()).or_default().insert(*pos);
        }
    }
    on_axis
}

type SortKey = (usize, i32, Vec<usize>, Vec<i8>, Vec<OrderedFloat<f64>>);

/// Orders masters so the most influential come first.
///
/// Fewer active axes first, then more positions shared with on-axis masters, then by the
/// importance of the active axes, their direction and their distance from the default.
fn sort_key(
    axes: &[String],
    on_axis: &HashMap<String, HashSet<NormalizedCoord>>,
    location: &NormalizedLocation,
) -> SortKey {
    let active: Vec<(usize, f64)> = axes
        .iter()
        .enumerate()
        .filter_map(|(i, name)| location.get(name).map(|pos| (i, pos.to_f64())))
        .filter(|(_, pos)| *pos != 0.0)
        .collect();
    let on_points = non_zero(location)
        .filter(|(name, pos)| on_axis.get(*name).is_some_and(|p| p.contains(*pos)))
        .count();
    (
        active.len(),
        -(on_points as i32),
        active.iter().map(|(i, _)| *i).collect(),
        active.iter().map(|(_, pos)| if *pos < 0.0 { -1 } else { 1 }).collect(),
        active.iter().map(|(_, pos)| OrderedFloat(pos.abs())).collect(),
    )
}

/// The region each master controls.
///
/// A master starts out owning the box from the default to the edge of the designspace
/// in its direction. Earlier masters with the same active axes that fall inside that box
/// cut it down, along whichever axes lose the least.
fn supports(
    axes: &[String],
    locations: &[NormalizedLocation],
    extents: &BTreeMap<String, (f64, f64)>,
) -> Vec<VariationRegion> {
    let boxes: Vec<VariationRegion> = locations
        .iter()
        .map(|location| {
            let mut region = VariationRegion::new();
            for name in axes {
                let peak = location.get(name).map(|p| p.to_f64()).unwrap_or_default();
                let (min, max) = match extents.get(name) {
                    Some(extent) if peak != 0.0 => *extent,
                    _ => (0.0, 0.0),
                };
                region.insert(name.clone(), (min, peak, max).into());
            }
            region
        })
        .collect();

    let mut result = Vec::with_capacity(boxes.len());
    for (i, start) in boxes.iter().enumerate() {
        let mut region = start.clone();
        let active = region.active_axes();
        for earlier in boxes[..i].iter() {
            if earlier.active_axes() != active {
                continue;
            }
            let inside = region.iter().all(|(name, tent)| {
                earlier.get(name).is_some_and(|e| {
                    e.peak == tent.peak || (tent.min < e.peak && e.peak < tent.max)
                })
            });
            if !inside {
                continue;
            }

            let mut cuts: Vec<(&String, Tent)> = Vec::new();
            let mut best = f64::NEG_INFINITY;
            for name in axes.iter().filter(|n| active.contains(n.as_str())) {
                let (Some(e), Some(tent)) = (earlier.get(name), region.get(name)) else {
                    continue;
                };
                let (cut, ratio) = tent.cut_at(e.peak);
                let Some(cut) = cut else {
                    continue;
                };
                if ratio > best {
                    cuts.clear();
                    best = ratio;
                }
                if ratio == best {
                    cuts.push((name, cut));
                }
            }
            for (name, cut) in cuts {
                region.insert(name.clone(), cut);
            }
        }
        result.push(region);
    }
    result
}

/// A chunk of variation space, a [Tent] per axis.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct VariationRegion {
    tents: BTreeMap<String, Tent>,
}

impl VariationRegion {
    pub fn new() -> Self {
        Self::default()
    }

    /// How much of this region applies at a location, as `supportScalar` with `ot=True`.
    pub fn scalar_at(&self, location: &NormalizedLocation) -> f64 {
        self.scalar_with(location, None)
    }

    fn scalar_with(
        &self,
        location: &NormalizedLocation,
        extents: Option<&BTreeMap<String, (f64, f64)>>,
    ) -> f64 {
        let mut scalar = 1.0;
        for (name, tent) in self.tents.iter() {
            let (lower, peak, upper) = tent.bounds();
            if peak == 0.0 || !tent.is_valid() {
                continue;
            }
            let v = location.get(name).map(|p| p.to_f64()).unwrap_or_default();
            if v == peak {
                continue;
            }
            // linear continuation of the outermost slope
            if let Some(&(axis_min, axis_max)) = extents.and_then(|e| e.get(name)) {
                if v < axis_min && lower <= axis_min {
                    if peak <= axis_min && peak < upper {
                        scalar *= (v - upper) / (peak - upper);
                        continue;
                    }
                    if axis_min < peak {
                        scalar *= (v - lower) / (peak - lower);
                        continue;
                    }
                } else if axis_max < v && axis_max <= upper {
                    if axis_max <= peak && lower < peak {
                        scalar *= (v - lower) / (peak - lower);
                        continue;
                    }
                    if peak < axis_max {
                        scalar *= (v - upper) / (peak - upper);
                        continue;
                    }
                }
            }
            if v <= lower || upper <= v {
                return 0.0;
            }
            scalar *= if v < peak {
                (v - lower) / (peak - lower)
            } else {
                (v - upper) / (peak - upper)
            };
        }
        scalar
    }

    pub fn insert(&mut self, axis_name: String, tent: Tent) {
        self.tents.insert(axis_name, tent);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Tent)> {
        self.tents.iter()
    }

    pub fn get(&self, axis_name: &str) -> Option<&Tent> {
        self.tents.get(axis_name)
    }

    fn active_axes(&self) -> HashSet<String> {
        self.tents
            .iter()
            .filter(|(_, t)| t.is_active())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Applies everywhere, the region of the default master.
    pub fn is_default(&self) -> bool {
        !self.tents.values().any(Tent::is_active)
    }
}

/// Influence along one axis: nothing at min, rising to full at peak, nothing again at max.
///
/// One of min and max is always 0.
#[derive(Default, Clone, Copy, PartialEq)]
pub struct Tent {
    pub min: NormalizedCoord,
    pub peak: NormalizedCoord,
    pub max: NormalizedCoord,
}

impl Tent {
    pub fn new(min: NormalizedCoord, peak: NormalizedCoord, max: NormalizedCoord) -> Self {
        let zero = NormalizedCoord::new(0.0);
        if peak > zero {
            Tent { min: zero, peak, max }
        } else {
            Tent { min, peak, max: zero }
        }
    }

    pub fn bounds(&self) -> (f64, f64, f64) {
        (self.min.to_f64(), self.peak.to_f64(), self.max.to_f64())
    }

    fn is_active(&self) -> bool {
        self.bounds() != (0.0, 0.0, 0.0)
    }

    /// Ordered, and not straddling zero where every delta must vanish.
    fn is_valid(&self) -> bool {
        let (min, peak, max) = self.bounds();
        min <= peak && peak <= max && !(min < 0.0 && max > 0.0)
    }

    /// Moves the side facing `at` in to `at`, and what fraction of that side that keeps.
    fn cut_at(&self, at: NormalizedCoord) -> (Option<Tent>, f64) {
        let (min, peak, max) = self.bounds();
        let at_f64 = at.to_f64();
        if at < self.peak {
            let cut = Tent { min: at, ..*self };
            (Some(cut), (at_f64 - peak) / (min - peak))
        } else if at > self.peak {
            let cut = Tent { max: at, ..*self };
            (Some(cut), (at_f64 - peak) / (max - peak))
        } else {
            (None, 0.0)
        }
    }
}

impl Debug for Tent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl Display for Tent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (min, peak, max) = self.bounds();
        let invalid = if self.is_valid() { "" } else { "!" };
        write!(f, "{invalid}({min}, {peak}, {max})")
    }
}

impl From<(f64, f64, f64)> for Tent {
    fn from((min, peak, max): (f64, f64, f64)) -> Self {
        Tent::new(
            NormalizedCoord::new(min),
            NormalizedCoord::new(peak),
            NormalizedCoord::new(max),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use kiln_types::{
        coords::{NormalizedCoord, NormalizedLocation},
        types::{Axis, Tag},
    };
    use kurbo::{Point, Vec2};
    use more_asserts::assert_lt;
    use pretty_assertions::assert_eq;

    use super::{Tent, VariationModel, VariationRegion};

    fn axis(name: &str) -> Axis {
        let tag = match name {
            "wght" => b"wght",
            "wdth" => b"wdth",
            "opsz" => b"opsz",
            _ => panic!("no axis {name}"),
        };
        Axis::new(name, Tag::new(tag), -1.0, 0.0, 1.0, Vec::new())
    }

    fn loc(positions: &[(&str, f64)]) -> NormalizedLocation {
        NormalizedLocation::for_pos(positions)
    }

    fn region(tents: &[(&str, (f64, f64, f64))]) -> VariationRegion {
        let mut region = VariationRegion::new();
        for (name, (min, peak, max)) in tents {
            let tent = Tent {
                min: NormalizedCoord::new(*min),
                peak: NormalizedCoord::new(*peak),
                max: NormalizedCoord::new(*max),
            };
            region.insert(name.to_string(), tent);
        }
        region
    }

    fn model(locations: &[NormalizedLocation], axes: &[&str]) -> VariationModel {
        let axes: Vec<_> = axes.iter().map(|a| axis(a)).collect();
        VariationModel::new(locations.iter().cloned().collect(), &axes).unwrap()
    }

    fn weights(model: &VariationModel) -> Vec<Vec<(usize, f64)>> {
        model.masters.iter().map(|m| m.weights.clone()).collect()
    }

    fn assert_close(expected: &[Vec<(usize, f64)>], actual: &[Vec<(usize, f64)>]) {
        assert_eq!(expected.len(), actual.len(), "{expected:?} != {actual:?}");
        for (e, a) in expected.iter().zip(actual) {
            assert_eq!(e.len(), a.len(), "{expected:?} != {actual:?}");
            for ((ei, ew), (ai, aw)) in e.iter().zip(a) {
                assert_eq!(ei, ai);
                assert_lt!((ew - aw).abs(), 1e-6, "{expected:?} != {actual:?}");
            }
        }
    }

    #[test]
    fn empty_region_applies_everywhere() {
        assert!(VariationRegion::new().is_default());
        assert_eq!(1.0, VariationRegion::new().scalar_at(&loc(&[("wght", 0.7)])));
    }

    #[test]
    fn scalar_falls_off_on_both_sides_of_the_peak() {
        let region = region(&[("wght", (0.0, 0.5, 1.0))]);
        assert_eq!(0.5, region.scalar_at(&loc(&[("wght", 0.25)])));
        assert_eq!(1.0, region.scalar_at(&loc(&[("wght", 0.5)])));
        assert_eq!(0.5, region.scalar_at(&loc(&[("wght", 0.75)])));
        assert_eq!(0.0, region.scalar_at(&loc(&[("wght", -0.5)])));
    }

    #[test]
    fn default_tent_is_inactive() {
        let tent = Tent::default();
        assert_eq!((0.0, 0.0, 0.0), tent.bounds());
        assert!(!tent.is_active());
        assert_eq!(NormalizedCoord::new(0.0), NormalizedCoord::default());
    }

    #[test]
    fn scalar_ignores_axes_the_region_does_not_use() {
        let region = region(&[("wght", (0.0, 1.0, 1.0))]);
        assert_eq!(1.0, region.scalar_at(&loc(&[("wght", 1.0), ("wdth", 1.0)])));
    }

    #[test]
    fn single_master() {
        let model = model(&[NormalizedLocation::new()], &["wght"]);
        assert_eq!(vec![&loc(&[("wght", 0.0)])], model.locations().collect::<Vec<_>>());
        assert_close(&[vec![]], &weights(&model));
    }

    #[test]
    fn default_then_on_axis_then_corners() {
        let locations = [
            loc(&[("wght", 1.0), ("wdth", 1.0)]),
            loc(&[("wdth", -1.0)]),
            loc(&[("wght", 1.0)]),
            loc(&[("wght", -1.0)]),
            NormalizedLocation::new(),
        ];
        let model = model(&locations, &["wght", "wdth"]);
        assert_eq!(
            vec![
                loc(&[("wght", 0.0), ("wdth", 0.0)]),
                loc(&[("wght", -1.0), ("wdth", 0.0)]),
                loc(&[("wght", 1.0), ("wdth", 0.0)]),
                loc(&[("wght", 0.0), ("wdth", -1.0)]),
                loc(&[("wght", 1.0), ("wdth", 1.0)]),
            ],
            model.locations().cloned().collect::<Vec<_>>()
        );
        // the corner gets all of the default and of the bold master
        assert_close(
            &[vec![], vec![(0, 1.0)], vec![(0, 1.0)], vec![(0, 1.0)], vec![(0, 1.0), (2, 1.0)]],
            &weights(&model),
        );
    }

    #[test]
    fn intermediate_masters_cut_the_outer_region() {
        let locations = [
            NormalizedLocation::new(),
            loc(&[("opsz", 0.25)]),
            loc(&[("opsz", 0.75)]),
            loc(&[("opsz", 1.0)]),
        ];
        let model = model(&locations, &["opsz"]);
        let supports: Vec<_> = model.masters.iter().map(|m| m.support.clone()).collect();
        assert_eq!(
            vec![
                region(&[("opsz", (0.0, 0.0, 0.0))]),
                region(&[("opsz", (0.0, 0.25, 1.0))]),
                region(&[("opsz", (0.25, 0.75, 1.0))]),
                region(&[("opsz", (0.75, 1.0, 1.0))]),
            ],
            supports
        );
        assert_close(
            &[vec![], vec![(0, 1.0)], vec![(0, 1.0), (1, 1.0 / 3.0)], vec![(0, 1.0)]],
            &weights(&model),
        );
    }

    #[test]
    fn corner_deltas_subtract_what_the_axes_give() {
        let origin = loc(&[("wght", 0.0), ("wdth", 0.0)]);
        let bold = loc(&[("wght", 1.0), ("wdth", 0.0)]);
        let wide = loc(&[("wght", 0.0), ("wdth", 1.0)]);
        let bold_wide = loc(&[("wght", 1.0), ("wdth", 1.0)]);
        let model = model(
            &[origin.clone(), bold.clone(), wide.clone(), bold_wide.clone()],
            &["wght", "wdth"],
        );
        let point_seqs = HashMap::from([
            (origin, vec![Point::new(100.0, 50.0)]),
            (bold, vec![Point::new(120.0, 50.0)]),
            (wide, vec![Point::new(140.0, 60.0)]),
            (bold_wide, vec![Point::new(150.0, 55.0)]),
        ]);
        let none = (0.0, 0.0, 0.0);
        let up = (0.0, 1.0, 1.0);
        assert_eq!(
            vec![
                (region(&[("wght", none), ("wdth", none)]), vec![Vec2::new(100.0, 50.0)]),
                (region(&[("wght", up), ("wdth", none)]), vec![Vec2::new(20.0, 0.0)]),
                (region(&[("wght", none), ("wdth", up)]), vec![Vec2::new(40.0, 10.0)]),
                // bold and wide together would give (160, 60)
                (region(&[("wght", up), ("wdth", up)]), vec![Vec2::new(-10.0, -5.0)]),
            ],
            model.deltas(&point_seqs).unwrap()
        );
    }

    #[test]
    fn deltas_need_the_default() {
        let model = model(&[NormalizedLocation::new(), loc(&[("wght", 1.0)])], &["wght"]);
        let point_seqs = HashMap::from([(loc(&[("wght", 1.0)]), vec![1.0])]);
        assert!(model.deltas::<f64, f64>(&point_seqs).is_err());
    }

    #[test]
    fn deltas_of_a_subset_of_masters() {
        let model = model(
            &[NormalizedLocation::new(), loc(&[("wght", -1.0)]), loc(&[("wght", 1.0)])],
            &["wght"],
        );
        let point_seqs = HashMap::from([
            (NormalizedLocation::new(), vec![10.0]),
            (loc(&[("wght", 1.0)]), vec![16.0]),
        ]);
        assert_eq!(
            vec![
                (region(&[("wght", (0.0, 0.0, 0.0))]), vec![10.0]),
                (region(&[("wght", (0.0, 1.0, 1.0))]), vec![6.0]),
            ],
            model.deltas(&point_seqs).unwrap()
        );
    }

    #[test]
    fn interpolate_and_extrapolate() {
        let light = loc(&[("wght", -1.0)]);
        let bold = loc(&[("wght", 1.0)]);
        let model = model(&[light.clone(), NormalizedLocation::new(), bold.clone()], &["wght"]);
        let point_seqs = HashMap::from([
            (light, vec![Point::new(0.0, 0.0)]),
            (NormalizedLocation::new(), vec![Point::new(40.0, 0.0)]),
            (bold, vec![Point::new(100.0, 20.0)]),
        ]);

        let at = |pos: f64, extrapolate: bool| {
            model
                .interpolate(&loc(&[("wght", pos)]), &point_seqs, extrapolate)
                .unwrap()
        };
        assert_eq!(vec![Point::new(20.0, 0.0)], at(-0.5, false));
        assert_eq!(vec![Point::new(70.0, 10.0)], at(0.5, false));
        // beyond the masters nothing changes unless asked to
        assert_eq!(vec![Point::new(40.0, 0.0)], at(1.5, false));
        assert_eq!(vec![Point::new(130.0, 30.0)], at(1.5, true));
        assert_eq!(vec![Point::new(-20.0, 0.0)], at(-1.5, true));
    }

    #[test]
    fn interpolate_needs_every_master() {
        let model = model(&[NormalizedLocation::new(), loc(&[("wght", 1.0)])], &["wght"]);
        let point_seqs = HashMap::from([(NormalizedLocation::new(), vec![1.0])]);
        assert!(model
            .interpolate::<f64, f64>(&loc(&[("wght", 0.5)]), &point_seqs, false)
            .is_err());
    }

    #[test]
    fn unknown_axis_is_rejected() {
        let locations = HashSet::from([loc(&[("wdth", 1.0)])]);
        assert!(VariationModel::new(locations, &[axis("wght")]).is_err());
    }

    #[test]
    fn point_axis_is_rejected() {
        let point = Axis::new("wght", Tag::new(b"wght"), 400.0, 400.0, 400.0, Vec::new());
        assert!(VariationModel::new(HashSet::new(), &[point]).is_err());
    }
}
