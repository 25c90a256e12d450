use indexmap::IndexMap;
use kiln_types::coords::DesignLocation;
use serde::{Deserialize, Serialize};

use crate::ir::{Glyph, KernSide, Kerning, Master};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MasterSerdeRepr {
    pub name: String,
    #[serde(default)]
    pub location: DesignLocation,
    #[serde(default)]
    pub glyphs: Vec<Glyph>,
    #[serde(default)]
    pub kerning: Kerning,
}

impl From<MasterSerdeRepr> for Master {
    fn from(from: MasterSerdeRepr) -> Self {
        Master {
            name: from.name,
            location: from.location,
            glyphs: from
                .glyphs
                .into_iter()
                .map(|g| (g.name.clone(), g))
                .collect::<IndexMap<_, _>>(),
            kerning: from.kerning,
        }
    }
}

impl From<Master> for MasterSerdeRepr {
    fn from(from: Master) -> Self {
        MasterSerdeRepr {
            name: from.name,
            location: from.location,
            glyphs: from.glyphs.into_values().collect(),
            kerning: from.kerning,
        }
    }
}

const KERN_GROUP_PREFIX: &str = "public.kern";

/// Kerning sides are plain strings; groups are recognized by prefix.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(transparent)]
pub struct KernSideSerdeRepr(String);

impl From<KernSideSerdeRepr> for KernSide {
    fn from(from: KernSideSerdeRepr) -> Self {
        if from.0.starts_with(KERN_GROUP_PREFIX) {
            KernSide::Group(from.0)
        } else {
            KernSide::Glyph(from.0.into())
        }
    }
}

impl From<KernSide> for KernSideSerdeRepr {
    fn from(from: KernSide) -> Self {
        match from {
            KernSide::Glyph(name) => KernSideSerdeRepr(name.as_str().to_string()),
            KernSide::Group(group) => KernSideSerdeRepr(group),
        }
    }
}

/// A 2×3 affine transformation matrix, as stored in sources.
pub(crate) mod affine2x3 {
    use kurbo::Affine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    struct Affine2x3 {
        /// x-component of transformed x-basis vector.
        #[serde(default = "one")]
        xx: f64,
        /// y-component of transformed x-basis vector.
        #[serde(default)]
        yx: f64,
        /// x-component of transformed y-basis vector.
        #[serde(default)]
        xy: f64,
        /// y-component of transformed y-basis vector.
        #[serde(default = "one")]
        yy: f64,
        /// x-component of translation vector.
        #[serde(default)]
        dx: f64,
        /// y-component of translation vector.
        #[serde(default)]
        dy: f64,
    }

    fn one() -> f64 {
        1.0
    }

    pub fn serialize<S: Serializer>(affine: &Affine, serializer: S) -> Result<S::Ok, S::Error> {
        let [xx, yx, xy, yy, dx, dy] = affine.as_coeffs();
        Affine2x3 {
            xx,
            yx,
            xy,
            yy,
            dx,
            dy,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Affine, D::Error> {
        let a = Affine2x3::deserialize(deserializer)?;
        Ok(Affine::new([a.xx, a.yx, a.xy, a.yy, a.dx, a.dy]))
    }
}
