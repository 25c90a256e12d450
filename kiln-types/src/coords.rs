//! Coordinates in user, design, and normalized space.
//!
//! Mixing up coordinate spaces is an easy mistake to make and a hard one to spot, so
//! each space gets its own type and conversions are always explicit.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{error::Error, piecewise_linear_map::PiecewiseLinearMap, types::Axis};

/// A coordinate in whatever space the designer drew in.
#[derive(
    Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct DesignCoord(OrderedFloat<f64>);

/// A coordinate the end user sees, e.g. Weight 400.
#[derive(
    Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct UserCoord(OrderedFloat<f64>);

/// A coordinate used within the font, in [-1, 1] with the default at 0.
#[derive(
    Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct NormalizedCoord(OrderedFloat<f64>);

macro_rules! coord_impl {
    ($ty:ident) => {
        impl $ty {
            /// We do *not* provide From because conversion should be deliberate
            pub fn new(value: impl Into<OrderedFloat<f64>>) -> $ty {
                $ty(value.into())
            }

            pub fn to_f64(self) -> f64 {
                self.0.into_inner()
            }
        }
    };
}

coord_impl!(DesignCoord);
coord_impl!(UserCoord);
coord_impl!(NormalizedCoord);

/// Per-axis positions, keyed by axis name.
///
/// Hashable and ordered so it can key maps of masters or glyph sources.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Location<T>(BTreeMap<String, T>);

pub type DesignLocation = Location<DesignCoord>;
pub type UserLocation = Location<UserCoord>;
pub type NormalizedLocation = Location<NormalizedCoord>;

impl<T> Location<T> {
    pub fn new() -> Location<T> {
        Location(BTreeMap::new())
    }

    pub fn insert(&mut self, axis: impl Into<String>, pos: T) -> &mut Location<T> {
        self.0.insert(axis.into(), pos);
        self
    }

    pub fn get(&self, axis: &str) -> Option<&T> {
        self.0.get(axis)
    }

    pub fn contains(&self, axis: &str) -> bool {
        self.0.contains_key(axis)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &T)> {
        self.0.iter()
    }

    pub fn axis_names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn retain(&mut self, pred: impl Fn(&String, &mut T) -> bool) {
        self.0.retain(pred)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<T> Default for Location<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(String, T)> for Location<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Location(BTreeMap::from_iter(iter))
    }
}

impl NormalizedLocation {
    /// Convenience for tests and literals: `[("wght", 1.0)]`
    pub fn for_pos(positions: &[(&str, f64)]) -> NormalizedLocation {
        positions
            .iter()
            .map(|(axis, pos)| (axis.to_string(), NormalizedCoord::new(*pos)))
            .collect()
    }

    /// True if every axis position is zero
    pub fn is_default(&self) -> bool {
        self.0.values().all(|v| v.to_f64() == 0.0)
    }

    pub fn has_non_zero(&self, axis: &str) -> bool {
        self.get(axis).map(|v| v.to_f64() != 0.0).unwrap_or(false)
    }
}

impl DesignLocation {
    pub fn for_pos(positions: &[(&str, f64)]) -> DesignLocation {
        positions
            .iter()
            .map(|(axis, pos)| (axis.to_string(), DesignCoord::new(*pos)))
            .collect()
    }

    /// Normalize against the provided axes.
    ///
    /// Axes the location doesn't mention are placed at their default, i.e. 0.
    pub fn to_normalized(&self, axes: &[Axis]) -> Result<NormalizedLocation, Error> {
        if let Some(unknown) = self
            .axis_names()
            .find(|name| !axes.iter().any(|a| &a.name == *name))
        {
            return Err(Error::UnknownAxis(unknown.clone()));
        }
        Ok(axes
            .iter()
            .map(|axis| {
                let pos = self
                    .get(&axis.name)
                    .map(|dc| dc.to_normalized(&axis.converter))
                    .unwrap_or_else(|| NormalizedCoord::new(0.0));
                (axis.name.clone(), pos)
            })
            .collect())
    }
}

/// Converts between design, user, and normalized coordinates for one axis.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CoordConverter {
    user_to_design: PiecewiseLinearMap,
    design_to_user: PiecewiseLinearMap,
    design_to_normalized: PiecewiseLinearMap,
    normalized_to_design: PiecewiseLinearMap,
}

impl CoordConverter {
    /// Build from user:design examples, the default being at `default_idx`.
    pub fn new(mut mappings: Vec<(UserCoord, DesignCoord)>, default_idx: usize) -> CoordConverter {
        if mappings.is_empty() {
            mappings.push((UserCoord::new(0.0), DesignCoord::new(0.0)));
        }
        let default_idx = default_idx.min(mappings.len() - 1);
        let user_to_design =
            PiecewiseLinearMap::new(mappings.iter().map(|(u, d)| (u.0, d.0)).collect());

        let design_default = mappings[default_idx].1;
        let design_min = mappings.iter().map(|(_, d)| *d).min().unwrap_or(design_default);
        let design_max = mappings.iter().map(|(_, d)| *d).max().unwrap_or(design_default);

        let mut examples = Vec::new();
        if design_min < design_default {
            examples.push((design_min.0, OrderedFloat(-1.0)));
        }
        examples.push((design_default.0, OrderedFloat(0.0)));
        if design_max > design_default {
            examples.push((design_max.0, OrderedFloat(1.0)));
        }
        let design_to_normalized = PiecewiseLinearMap::new(examples);

        CoordConverter {
            design_to_user: user_to_design.reverse(),
            user_to_design,
            normalized_to_design: design_to_normalized.reverse(),
            design_to_normalized,
        }
    }

    /// A converter for an axis whose design and user coordinates are identical.
    pub fn unmapped(min: UserCoord, default: UserCoord, max: UserCoord) -> CoordConverter {
        CoordConverter::new(
            vec![
                (min, DesignCoord::new(min.0)),
                (default, DesignCoord::new(default.0)),
                (max, DesignCoord::new(max.0)),
            ],
            1,
        )
    }
}

impl DesignCoord {
    pub fn to_user(self, converter: &CoordConverter) -> UserCoord {
        UserCoord::new(converter.design_to_user.map(self.to_f64()))
    }

    pub fn to_normalized(self, converter: &CoordConverter) -> NormalizedCoord {
        NormalizedCoord::new(converter.design_to_normalized.map(self.to_f64()))
    }
}

impl UserCoord {
    pub fn to_design(self, converter: &CoordConverter) -> DesignCoord {
        DesignCoord::new(converter.user_to_design.map(self.to_f64()))
    }

    pub fn to_normalized(self, converter: &CoordConverter) -> NormalizedCoord {
        self.to_design(converter).to_normalized(converter)
    }
}

impl NormalizedCoord {
    pub fn to_design(self, converter: &CoordConverter) -> DesignCoord {
        DesignCoord::new(converter.normalized_to_design.map(self.to_f64()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    // 200 and 500 (user) are pushed well toward the left and right
    fn bendy() -> CoordConverter {
        CoordConverter::new(
            vec![
                (UserCoord::new(100.0), DesignCoord::new(0.0)),
                (UserCoord::new(200.0), DesignCoord::new(1.0)),
                (UserCoord::new(400.0), DesignCoord::new(10.0)),
                (UserCoord::new(500.0), DesignCoord::new(19.0)),
                (UserCoord::new(900.0), DesignCoord::new(20.0)),
            ],
            2,
        )
    }

    #[test]
    fn design_to_normalized_is_linear_each_side_of_default() {
        let converter = bendy();
        assert_eq!(-1.0, DesignCoord::new(0.0).to_normalized(&converter).to_f64());
        assert_eq!(-0.5, DesignCoord::new(5.0).to_normalized(&converter).to_f64());
        assert_eq!(0.0, DesignCoord::new(10.0).to_normalized(&converter).to_f64());
        assert_eq!(0.5, DesignCoord::new(15.0).to_normalized(&converter).to_f64());
        assert_eq!(1.0, DesignCoord::new(20.0).to_normalized(&converter).to_f64());
    }

    #[test]
    fn user_to_normalized_bends() {
        let converter = bendy();
        assert_eq!(0.5, UserCoord::new(150.0).to_design(&converter).to_f64());
        let norm = UserCoord::new(300.0).to_normalized(&converter).to_f64();
        assert!((norm + 0.45).abs() < 1e-9, "{norm}");
        assert_eq!(
            10.0,
            NormalizedCoord::new(0.0).to_design(&converter).to_f64()
        );
    }

    #[test]
    fn location_yaml_is_a_plain_map() {
        let loc = DesignLocation::for_pos(&[("Weight", 400.0)]);
        let yml = serde_yaml::to_string(&loc).unwrap();
        assert_eq!("Weight: 400.0\n", yml);
        assert_eq!(loc, serde_yaml::from_str(&yml).unwrap());
    }
}
