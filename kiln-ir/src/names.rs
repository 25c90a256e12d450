//! Glyph naming in the output: production names and dropping unexported glyphs.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::OnceLock,
};

use kiln_types::types::GlyphName;
use log::{debug, warn};
use regex::Regex;

use crate::{
    components::decompose_components,
    error::{BadGlyph, Error},
    glyph_data::GlyphData,
    ir::{Designspace, KernSide, Master},
};

/// Names that are fine to ship as-is: ASCII letters, digits, underscore and period,
/// not starting with a digit.
fn is_production_safe(name: &str) -> bool {
    static SAFE: OnceLock<Option<Regex>> = OnceLock::new();
    SAFE.get_or_init(|| Regex::new(r"^[A-Za-z_.][A-Za-z0-9_.]*$").ok())
        .as_ref()
        .map_or(true, |re| re.is_match(name))
}

/// `uniXXXX` for the BMP, `uXXXXX` beyond it.
pub fn uni_name(codepoint: u32) -> String {
    if codepoint <= 0xFFFF {
        format!("uni{codepoint:04X}")
    } else {
        format!("u{codepoint:05X}")
    }
}

/// Mapping from design names to production names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductionNames(HashMap<GlyphName, GlyphName>);

impl ProductionNames {
    /// Work out production names for every glyph of the master.
    ///
    /// Glyph data wins. Otherwise encoded glyphs get a uni name, unencoded glyphs
    /// derive theirs from the glyphs they are built from (`a.alt`, `f_i`), and
    /// anything else keeps its name if it's safe to ship. Collisions keep the
    /// design name.
    pub fn new(master: &Master, glyph_data: &GlyphData) -> ProductionNames {
        let codepoints: HashMap<&str, u32> = master
            .glyphs
            .values()
            .filter_map(|g| g.codepoints.first().map(|cp| (g.name.as_str(), *cp)))
            .collect();

        let mut names = HashMap::new();
        let mut taken: HashSet<GlyphName> = HashSet::new();
        for glyph in master.glyphs.values() {
            let name = glyph.name.as_str();
            let production = if let Some(explicit) = glyph_data.production_name(name) {
                explicit.to_string()
            } else if matches!(name, ".notdef" | "space" | ".null") {
                name.to_string()
            } else if let Some(cp) = glyph.codepoints.first() {
                uni_name(*cp)
            } else {
                derived_name(name, &codepoints).unwrap_or_else(|| name.to_string())
            };
            let production = GlyphName::from(production);
            if !taken.insert(production.clone()) {
                warn!("Production name {production} for {name} is already in use, keeping {name}");
                names.insert(glyph.name.clone(), glyph.name.clone());
                continue;
            }
            if !is_production_safe(production.as_str()) {
                warn!("Production name {production} for {name} may not work everywhere");
            }
            names.insert(glyph.name.clone(), production);
        }
        ProductionNames(names)
    }

    pub fn get(&self, name: &GlyphName) -> GlyphName {
        self.0.get(name).cloned().unwrap_or_else(|| name.clone())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `a.alt` => `uni0061.alt`, `f_i` => `uni00660069`, `u1F600_a` => `u1F600_uni0061`.
fn derived_name(name: &str, codepoints: &HashMap<&str, u32>) -> Option<String> {
    let (base, suffix) = match name.split_once('.') {
        Some((base, suffix)) if !base.is_empty() => (base, Some(suffix)),
        _ => (name, None),
    };
    let parts: Vec<u32> = base
        .split('_')
        .map(|part| codepoints.get(part).copied())
        .collect::<Option<_>>()?;
    let base = if parts.iter().all(|cp| *cp <= 0xFFFF) {
        let hex: String = parts.iter().map(|cp| format!("{cp:04X}")).collect();
        format!("uni{hex}")
    } else {
        parts
            .iter()
            .map(|cp| uni_name(*cp))
            .collect::<Vec<_>>()
            .join("_")
    };
    Some(match suffix {
        Some(suffix) => format!("{base}.{suffix}"),
        None => base,
    })
}

/// Drop glyphs marked not to export.
///
/// Components that reference a dropped glyph are decomposed first so the glyphs
/// that use them keep their outlines. Returns the dropped names.
pub fn subset_non_exported(designspace: &mut Designspace) -> Result<BTreeSet<GlyphName>, Error> {
    let default = designspace.default_master()?;
    let dropped: BTreeSet<GlyphName> = default
        .glyphs
        .values()
        .filter(|g| !g.export && g.name != GlyphName::NOTDEF)
        .map(|g| g.name.clone())
        .collect();
    if dropped.is_empty() {
        return Ok(dropped);
    }
    debug!("Dropping {} non-exported glyphs", dropped.len());

    let mut errors: Vec<BadGlyph> = Vec::new();
    for master in designspace.masters.iter_mut() {
        if let Err(e) = decompose_components(master, |_, component| {
            dropped.contains(&component.base)
        }) {
            errors.extend(e);
        }
        master.glyphs.retain(|name, _| !dropped.contains(name));
        for members in master.kerning.groups.values_mut() {
            members.retain(|m| !dropped.contains(m));
        }
        master.kerning.pairs.retain(|pair| {
            [&pair.left, &pair.right]
                .iter()
                .all(|side| !matches!(side, KernSide::Glyph(name) if dropped.contains(name)))
        });
    }
    if !errors.is_empty() {
        return Err(Error::GlyphErrors(errors));
    }
    if let Some(order) = designspace.glyph_order.as_mut() {
        order.retain(|name| !dropped.contains(name));
    }
    designspace.layout.retain_glyphs(|name| !dropped.contains(name));
    Ok(dropped)
}
