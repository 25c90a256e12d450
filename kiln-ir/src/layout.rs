//! High level layout rules: named lookups registered under feature tags.
//!
//! Rules are authored in the source (or an MTI file) and augmented by feature
//! writers. Their numbers (advances, anchor positions) are what binary layout
//! interpolation varies, so the model offers a way to visit all of them.

use std::collections::BTreeSet;

use kiln_types::types::{GlyphName, Tag};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LayoutRules {
    #[serde(default)]
    pub lookups: Vec<Lookup>,
    #[serde(default)]
    pub features: Vec<FeatureRecord>,
    #[serde(default)]
    pub gdef: Option<GdefClasses>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Lookup {
    pub name: String,
    pub kind: LookupKind,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    SingleSubst(Vec<(GlyphName, GlyphName)>),
    LigatureSubst(Vec<Ligature>),
    PairPos(Vec<PairAdjustment>),
    MarkToBase(Vec<MarkAttachment>),
    MarkToMark(Vec<MarkAttachment>),
    Cursive(Vec<CursiveRecord>),
}

impl LookupKind {
    pub fn is_substitution(&self) -> bool {
        matches!(self, LookupKind::SingleSubst(..) | LookupKind::LigatureSubst(..))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Ligature {
    pub components: Vec<GlyphName>,
    pub ligature: GlyphName,
}

/// Adjust the advance of the first glyph when followed by the second.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PairAdjustment {
    pub first: Vec<GlyphName>,
    pub second: Vec<GlyphName>,
    pub x_advance: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarkRecord {
    pub glyph: GlyphName,
    pub x: f64,
    pub y: f64,
}

/// Marks of one class and the glyphs they attach to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarkAttachment {
    pub class_name: String,
    pub marks: Vec<MarkRecord>,
    pub bases: Vec<MarkRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CursiveRecord {
    pub glyph: GlyphName,
    pub entry: Option<(f64, f64)>,
    pub exit: Option<(f64, f64)>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub tag: Tag,
    pub lookups: Vec<String>,
}

/// Explicit glyph classes for GDEF.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GdefClasses {
    #[serde(default)]
    pub bases: BTreeSet<GlyphName>,
    #[serde(default)]
    pub ligatures: BTreeSet<GlyphName>,
    #[serde(default)]
    pub marks: BTreeSet<GlyphName>,
    #[serde(default)]
    pub components: BTreeSet<GlyphName>,
}

impl GdefClasses {
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
            && self.ligatures.is_empty()
            && self.marks.is_empty()
            && self.components.is_empty()
    }
}

impl LayoutRules {
    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty() && self.gdef.is_none()
    }

    pub fn lookup(&self, name: &str) -> Option<&Lookup> {
        self.lookups.iter().find(|l| l.name == name)
    }

    pub fn feature(&self, tag: Tag) -> Option<&FeatureRecord> {
        self.features.iter().find(|f| f.tag == tag)
    }

    /// Add a lookup and register it under each feature, replacing any lookup of the same name.
    pub fn add_lookup(&mut self, name: impl Into<String>, kind: LookupKind, features: &[Tag]) {
        let name = name.into();
        match self.lookups.iter_mut().find(|l| l.name == name) {
            Some(existing) => existing.kind = kind,
            None => self.lookups.push(Lookup {
                name: name.clone(),
                kind,
            }),
        }
        for tag in features {
            let feature = match self.features.iter().position(|f| f.tag == *tag) {
                Some(idx) => &mut self.features[idx],
                None => {
                    self.features.push(FeatureRecord {
                        tag: *tag,
                        lookups: Vec::new(),
                    });
                    let last = self.features.len() - 1;
                    &mut self.features[last]
                }
            };
            if !feature.lookups.contains(&name) {
                feature.lookups.push(name.clone());
            }
        }
    }

    /// Visit every number in the rules, in a stable order.
    pub fn visit_numbers_mut(&mut self, mut visitor: impl FnMut(&mut f64)) {
        for lookup in self.lookups.iter_mut() {
            match &mut lookup.kind {
                LookupKind::SingleSubst(..) | LookupKind::LigatureSubst(..) => (),
                LookupKind::PairPos(pairs) => {
                    pairs.iter_mut().for_each(|p| visitor(&mut p.x_advance))
                }
                LookupKind::MarkToBase(attachments) | LookupKind::MarkToMark(attachments) => {
                    for attachment in attachments.iter_mut() {
                        for record in attachment
                            .marks
                            .iter_mut()
                            .chain(attachment.bases.iter_mut())
                        {
                            visitor(&mut record.x);
                            visitor(&mut record.y);
                        }
                    }
                }
                LookupKind::Cursive(records) => {
                    for record in records.iter_mut() {
                        for (x, y) in record.entry.iter_mut().chain(record.exit.iter_mut()) {
                            visitor(x);
                            visitor(y);
                        }
                    }
                }
            }
        }
    }

    pub fn numbers(&self) -> Vec<f64> {
        let mut numbers = Vec::new();
        self.clone().visit_numbers_mut(|v| numbers.push(*v));
        numbers
    }

    /// True if the rules differ at most in their numbers.
    pub fn same_structure(&self, other: &LayoutRules) -> bool {
        let zeroed = |rules: &LayoutRules| {
            let mut rules = rules.clone();
            rules.visit_numbers_mut(|v| *v = 0.0);
            rules
        };
        zeroed(self) == zeroed(other)
    }

    /// Every glyph a rule or class mentions.
    pub fn referenced_glyphs(&self) -> BTreeSet<GlyphName> {
        let mut glyphs = BTreeSet::new();
        for lookup in self.lookups.iter() {
            match &lookup.kind {
                LookupKind::SingleSubst(subs) => {
                    glyphs.extend(subs.iter().flat_map(|(a, b)| [a.clone(), b.clone()]))
                }
                LookupKind::LigatureSubst(ligs) => {
                    for lig in ligs {
                        glyphs.extend(lig.components.iter().cloned());
                        glyphs.insert(lig.ligature.clone());
                    }
                }
                LookupKind::PairPos(pairs) => {
                    for pair in pairs {
                        glyphs.extend(pair.first.iter().chain(pair.second.iter()).cloned());
                    }
                }
                LookupKind::MarkToBase(attachments) | LookupKind::MarkToMark(attachments) => {
                    for attachment in attachments {
                        glyphs.extend(
                            attachment
                                .marks
                                .iter()
                                .chain(attachment.bases.iter())
                                .map(|r| r.glyph.clone()),
                        );
                    }
                }
                LookupKind::Cursive(records) => {
                    glyphs.extend(records.iter().map(|r| r.glyph.clone()))
                }
            }
        }
        if let Some(gdef) = &self.gdef {
            glyphs.extend(
                gdef.bases
                    .iter()
                    .chain(gdef.ligatures.iter())
                    .chain(gdef.marks.iter())
                    .chain(gdef.components.iter())
                    .cloned(),
            );
        }
        glyphs
    }

    /// Rename glyphs throughout, e.g. to production names.
    pub fn rename_glyphs(&mut self, rename: impl Fn(&GlyphName) -> GlyphName) {
        let fix = |names: &mut Vec<GlyphName>| names.iter_mut().for_each(|n| *n = rename(n));
        for lookup in self.lookups.iter_mut() {
            match &mut lookup.kind {
                LookupKind::SingleSubst(subs) => subs.iter_mut().for_each(|(a, b)| {
                    *a = rename(a);
                    *b = rename(b);
                }),
                LookupKind::LigatureSubst(ligs) => ligs.iter_mut().for_each(|lig| {
                    fix(&mut lig.components);
                    lig.ligature = rename(&lig.ligature);
                }),
                LookupKind::PairPos(pairs) => pairs.iter_mut().for_each(|p| {
                    fix(&mut p.first);
                    fix(&mut p.second);
                }),
                LookupKind::MarkToBase(attachments) | LookupKind::MarkToMark(attachments) => {
                    for attachment in attachments.iter_mut() {
                        for record in attachment
                            .marks
                            .iter_mut()
                            .chain(attachment.bases.iter_mut())
                        {
                            record.glyph = rename(&record.glyph);
                        }
                    }
                }
                LookupKind::Cursive(records) => records
                    .iter_mut()
                    .for_each(|r| r.glyph = rename(&r.glyph)),
            }
        }
        if let Some(gdef) = self.gdef.as_mut() {
            for class in [
                &mut gdef.bases,
                &mut gdef.ligatures,
                &mut gdef.marks,
                &mut gdef.components,
            ] {
                *class = class.iter().map(&rename).collect();
            }
        }
    }

    /// Drop glyphs that no longer exist from every rule.
    pub fn retain_glyphs(&mut self, keep: impl Fn(&GlyphName) -> bool) {
        for lookup in self.lookups.iter_mut() {
            match &mut lookup.kind {
                LookupKind::SingleSubst(subs) => subs.retain(|(a, b)| keep(a) && keep(b)),
                LookupKind::LigatureSubst(ligs) => {
                    ligs.retain(|l| keep(&l.ligature) && l.components.iter().all(&keep))
                }
                LookupKind::PairPos(pairs) => {
                    for pair in pairs.iter_mut() {
                        pair.first.retain(&keep);
                        pair.second.retain(&keep);
                    }
                    pairs.retain(|p| !p.first.is_empty() && !p.second.is_empty());
                }
                LookupKind::MarkToBase(attachments) | LookupKind::MarkToMark(attachments) => {
                    for attachment in attachments.iter_mut() {
                        attachment.marks.retain(|r| keep(&r.glyph));
                        attachment.bases.retain(|r| keep(&r.glyph));
                    }
                    attachments.retain(|a| !a.marks.is_empty() && !a.bases.is_empty());
                }
                LookupKind::Cursive(records) => records.retain(|r| keep(&r.glyph)),
            }
        }
        if let Some(gdef) = self.gdef.as_mut() {
            for class in [
                &mut gdef.bases,
                &mut gdef.ligatures,
                &mut gdef.marks,
                &mut gdef.components,
            ] {
                class.retain(&keep);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kern(value: f64) -> LayoutRules {
        let mut rules = LayoutRules::default();
        rules.add_lookup(
            "kern_ltr",
            LookupKind::PairPos(vec![PairAdjustment {
                first: vec!["A".into()],
                second: vec!["V".into(), "W".into()],
                x_advance: value,
            }]),
            &[Tag::new(b"kern")],
        );
        rules
    }

    #[test]
    fn add_lookup_registers_feature_once() {
        let mut rules = kern(-50.0);
        rules.add_lookup("kern_ltr", LookupKind::PairPos(Vec::new()), &[Tag::new(b"kern")]);
        assert_eq!(1, rules.lookups.len());
        assert_eq!(vec!["kern_ltr".to_string()], rules.features[0].lookups);
    }

    #[test]
    fn structure_ignores_numbers() {
        assert!(kern(-50.0).same_structure(&kern(-80.0)));
        assert_eq!(vec![-80.0], kern(-80.0).numbers());
    }

    #[test]
    fn retain_drops_empty_pairs() {
        let mut rules = kern(-50.0);
        rules.retain_glyphs(|g| g != &"A");
        let LookupKind::PairPos(pairs) = &rules.lookups[0].kind else {
            panic!("Expected pair pos");
        };
        assert!(pairs.is_empty());
    }

    #[test]
    fn rename_reaches_every_glyph() {
        let mut rules = kern(-50.0);
        rules.rename_glyphs(|g| format!("{g}.alt").into());
        let names: Vec<_> = rules
            .referenced_glyphs()
            .into_iter()
            .map(|g| g.as_str().to_string())
            .collect();
        assert_eq!(vec!["A.alt", "V.alt", "W.alt"], names);
    }
}
