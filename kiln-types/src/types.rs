//! Basic types shared by every part of the pipeline.

use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

pub use write_fonts::types::Tag;

use crate::coords::{CoordConverter, DesignCoord, UserCoord};

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlyphName(SmolStr);

impl GlyphName {
    pub const NOTDEF: GlyphName = GlyphName(SmolStr::new_inline(".notdef"));

    pub fn new(s: impl AsRef<str>) -> Self {
        Self(SmolStr::new(s))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for GlyphName {
    fn from(value: &str) -> Self {
        GlyphName(value.into())
    }
}

impl From<String> for GlyphName {
    fn from(value: String) -> Self {
        GlyphName(value.into())
    }
}

impl Debug for GlyphName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for GlyphName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// HashSet<GlyphName>::contains("a") works thanks to this
impl std::borrow::Borrow<str> for GlyphName {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq<&str> for GlyphName {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// A variation axis.
///
/// Sources describe axes in user units plus an optional user:design map; that is
/// also how we (de)serialize them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "AxisSerdeRepr", into = "AxisSerdeRepr")]
pub struct Axis {
    pub name: String,
    pub tag: Tag,
    pub min: UserCoord,
    pub default: UserCoord,
    pub max: UserCoord,
    pub hidden: bool,
    pub converter: CoordConverter,
    map: Vec<(UserCoord, DesignCoord)>,
}

impl Axis {
    pub fn new(
        name: impl Into<String>,
        tag: Tag,
        min: f64,
        default: f64,
        max: f64,
        map: Vec<(f64, f64)>,
    ) -> Axis {
        AxisSerdeRepr {
            name: name.into(),
            tag: tag.to_string(),
            min,
            default,
            max,
            hidden: false,
            map,
        }
        .into()
    }

    /// Min, default, and max all in the same place
    pub fn is_point(&self) -> bool {
        self.min == self.default && self.max == self.default
    }

    pub fn default_design(&self) -> DesignCoord {
        self.default.to_design(&self.converter)
    }

    pub fn design_range(&self) -> (DesignCoord, DesignCoord) {
        (
            self.min.to_design(&self.converter),
            self.max.to_design(&self.converter),
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct AxisSerdeRepr {
    name: String,
    tag: String,
    min: f64,
    default: f64,
    max: f64,
    #[serde(default)]
    hidden: bool,
    /// (user, design) pairs
    #[serde(default)]
    map: Vec<(f64, f64)>,
}

impl From<AxisSerdeRepr> for Axis {
    fn from(value: AxisSerdeRepr) -> Self {
        let min = UserCoord::new(value.min);
        let default = UserCoord::new(value.default);
        let max = UserCoord::new(value.max);
        let map: Vec<_> = value
            .map
            .iter()
            .map(|(u, d)| (UserCoord::new(*u), DesignCoord::new(*d)))
            .collect();
        let converter = if map.is_empty() {
            CoordConverter::unmapped(min, default, max)
        } else {
            let default_idx = map
                .iter()
                .position(|(u, _)| *u == default)
                .unwrap_or_else(|| {
                    log::warn!("Axis {} map has no entry for the default", value.name);
                    0
                });
            CoordConverter::new(map.clone(), default_idx)
        };
        Axis {
            tag: Tag::new_checked(value.tag.as_bytes()).unwrap_or_else(|_| {
                log::warn!("Axis {} has an invalid tag '{}'", value.name, value.tag);
                Tag::new(b"XXXX")
            }),
            name: value.name,
            min,
            default,
            max,
            hidden: value.hidden,
            converter,
            map,
        }
    }
}

impl From<Axis> for AxisSerdeRepr {
    fn from(value: Axis) -> Self {
        AxisSerdeRepr {
            name: value.name,
            tag: value.tag.to_string(),
            min: value.min.to_f64(),
            default: value.default.to_f64(),
            max: value.max.to_f64(),
            hidden: value.hidden,
            map: value
                .map
                .iter()
                .map(|(u, d)| (u.to_f64(), d.to_f64()))
                .collect(),
        }
    }
}
