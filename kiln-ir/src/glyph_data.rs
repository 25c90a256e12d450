//! Per-glyph metadata that doesn't belong to any one master.
//!
//! A glyph data file is a YAML (or JSON) list of records:
//!
//! ```yaml
//! - name: a
//!   production_name: uni0061
//!   category: base
//! ```
//!
//! Missing information is inferred: a glyph's category comes from its anchors,
//! then from the Unicode general category of its first codepoint.

use std::{collections::HashMap, ffi::OsStr, path::Path};

use icu_properties::{props::GeneralCategory, CodePointMapData};
use kiln_types::types::GlyphName;
use serde::{Deserialize, Serialize};

use crate::{error::Error, ir::Glyph, source::read_to_string};

/// The GDEF glyph class of a glyph.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum GlyphCategory {
    Base,
    Ligature,
    Mark,
    Component,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GlyphRecord {
    pub name: GlyphName,
    #[serde(default)]
    pub production_name: Option<String>,
    #[serde(default)]
    pub category: Option<GlyphCategory>,
    #[serde(default)]
    pub codepoint: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlyphData {
    records: HashMap<GlyphName, GlyphRecord>,
}

impl GlyphData {
    pub fn new(records: impl IntoIterator<Item = GlyphRecord>) -> GlyphData {
        GlyphData {
            records: records.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<GlyphData, Error> {
        let raw = read_to_string(path)?;
        let records: Vec<GlyphRecord> = match path.extension().and_then(OsStr::to_str) {
            Some("json") => serde_json::from_str(&raw)
                .map_err(|e| Error::ParseError(path.to_path_buf(), e.to_string()))?,
            _ => serde_yaml::from_str(&raw)
                .map_err(|e| Error::ParseError(path.to_path_buf(), e.to_string()))?,
        };
        Ok(GlyphData::new(records))
    }

    pub fn get(&self, name: &str) -> Option<&GlyphRecord> {
        self.records.get(name)
    }

    pub fn production_name(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|r| r.production_name.as_deref())
    }

    /// Explicit category, then anchors, then Unicode.
    pub fn category(&self, glyph: &Glyph) -> Option<GlyphCategory> {
        let record = self.get(glyph.name.as_str());
        if let Some(category) = record.and_then(|r| r.category) {
            return Some(category);
        }
        if let Some(category) = category_from_anchors(glyph) {
            return Some(category);
        }
        record
            .and_then(|r| r.codepoint)
            .or_else(|| glyph.codepoints.first().copied())
            .and_then(category_from_unicode)
    }
}

/// `_top` marks a mark, `top_1` a ligature caret position, any other anchor a base.
fn category_from_anchors(glyph: &Glyph) -> Option<GlyphCategory> {
    if glyph.anchors.is_empty() {
        return None;
    }
    if glyph.anchors.iter().any(|a| a.is_mark()) {
        return Some(GlyphCategory::Mark);
    }
    let is_ligature = glyph.anchors.iter().any(|a| {
        a.name
            .rsplit_once('_')
            .is_some_and(|(_, idx)| !idx.is_empty() && idx.chars().all(|c| c.is_ascii_digit()))
    });
    if is_ligature {
        return Some(GlyphCategory::Ligature);
    }
    Some(GlyphCategory::Base)
}

pub fn category_from_unicode(codepoint: u32) -> Option<GlyphCategory> {
    match CodePointMapData::<GeneralCategory>::new().get32(codepoint) {
        GeneralCategory::NonspacingMark | GeneralCategory::EnclosingMark => {
            Some(GlyphCategory::Mark)
        }
        GeneralCategory::UppercaseLetter
        | GeneralCategory::LowercaseLetter
        | GeneralCategory::TitlecaseLetter
        | GeneralCategory::ModifierLetter
        | GeneralCategory::OtherLetter
        | GeneralCategory::SpacingMark
        | GeneralCategory::DecimalNumber
        | GeneralCategory::LetterNumber
        | GeneralCategory::OtherNumber => Some(GlyphCategory::Base),
        _ => None,
    }
}
