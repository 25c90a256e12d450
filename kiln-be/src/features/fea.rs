//! A feature-file flavored dump of layout rules, for humans.

use std::{fmt::Write, fs, path::Path};

use kiln_ir::layout::{LayoutRules, LookupKind};
use kiln_types::types::GlyphName;
use log::info;

use crate::error::Error;

fn glyph_class(glyphs: &[GlyphName]) -> String {
    match glyphs {
        [one] => one.to_string(),
        many => format!(
            "[{}]",
            many.iter().map(|g| g.as_str()).collect::<Vec<_>>().join(" ")
        ),
    }
}

fn anchor(point: Option<(f64, f64)>) -> String {
    match point {
        Some((x, y)) => format!("<anchor {x} {y}>"),
        None => "<anchor NULL>".to_string(),
    }
}

pub fn to_fea(rules: &LayoutRules) -> String {
    let mut fea = String::new();
    // writing to a String cannot fail
    let _ = write_fea(&mut fea, rules);
    fea
}

fn write_fea(fea: &mut String, rules: &LayoutRules) -> std::fmt::Result {
    if let Some(gdef) = &rules.gdef {
        let class = |glyphs: &std::collections::BTreeSet<GlyphName>| {
            glyph_class(&glyphs.iter().cloned().collect::<Vec<_>>())
        };
        writeln!(fea, "table GDEF {{")?;
        writeln!(
            fea,
            "    GlyphClassDef {}, {}, {}, {};",
            class(&gdef.bases),
            class(&gdef.ligatures),
            class(&gdef.marks),
            class(&gdef.components)
        )?;
        writeln!(fea, "}} GDEF;\n")?;
    }

    for lookup in rules.lookups.iter() {
        let name = &lookup.name;
        if let LookupKind::MarkToBase(attachments) | LookupKind::MarkToMark(attachments) =
            &lookup.kind
        {
            for attachment in attachments {
                for mark in attachment.marks.iter() {
                    writeln!(
                        fea,
                        "markClass {} {} @{}_{};",
                        mark.glyph,
                        anchor(Some((mark.x, mark.y))),
                        name,
                        attachment.class_name
                    )?;
                }
            }
        }
        writeln!(fea, "lookup {name} {{")?;
        match &lookup.kind {
            LookupKind::SingleSubst(subs) => {
                for (from, to) in subs {
                    writeln!(fea, "    sub {from} by {to};")?;
                }
            }
            LookupKind::LigatureSubst(ligatures) => {
                for lig in ligatures {
                    let components: Vec<_> = lig.components.iter().map(|g| g.as_str()).collect();
                    writeln!(fea, "    sub {} by {};", components.join(" "), lig.ligature)?;
                }
            }
            LookupKind::PairPos(pairs) => {
                for pair in pairs {
                    writeln!(
                        fea,
                        "    pos {} {} {};",
                        glyph_class(&pair.first),
                        glyph_class(&pair.second),
                        pair.x_advance
                    )?;
                }
            }
            LookupKind::MarkToBase(attachments) | LookupKind::MarkToMark(attachments) => {
                let keyword = if matches!(lookup.kind, LookupKind::MarkToBase(..)) {
                    "base"
                } else {
                    "mark"
                };
                for attachment in attachments {
                    for base in attachment.bases.iter() {
                        writeln!(
                            fea,
                            "    pos {keyword} {} {} mark @{name}_{};",
                            base.glyph,
                            anchor(Some((base.x, base.y))),
                            attachment.class_name
                        )?;
                    }
                }
            }
            LookupKind::Cursive(records) => {
                for record in records {
                    writeln!(
                        fea,
                        "    pos cursive {} {} {};",
                        record.glyph,
                        anchor(record.entry),
                        anchor(record.exit)
                    )?;
                }
            }
        }
        writeln!(fea, "}} {name};\n")?;
    }

    for feature in rules.features.iter() {
        writeln!(fea, "feature {} {{", feature.tag)?;
        for lookup in feature.lookups.iter() {
            writeln!(fea, "    lookup {lookup};")?;
        }
        writeln!(fea, "}} {};\n", feature.tag)?;
    }
    Ok(())
}

pub fn write_feature_file(path: &Path, rules: &LayoutRules) -> Result<(), Error> {
    fs::write(path, to_fea(rules)).map_err(|source| Error::FileIo {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote debug feature file {path:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use kiln_ir::layout::{
        CursiveRecord, LayoutRules, Ligature, LookupKind, MarkAttachment, MarkRecord,
        PairAdjustment,
    };
    use kiln_types::types::Tag;
    use pretty_assertions::assert_eq;

    use super::to_fea;

    #[test]
    fn dumps_rules() {
        let mut rules = LayoutRules::default();
        rules.add_lookup(
            "liga",
            LookupKind::LigatureSubst(vec![Ligature {
                components: vec!["f".into(), "i".into()],
                ligature: "f_i".into(),
            }]),
            &[Tag::new(b"liga")],
        );
        rules.add_lookup(
            "kern_pairs",
            LookupKind::PairPos(vec![PairAdjustment {
                first: vec!["a".into()],
                second: vec!["v".into(), "w".into()],
                x_advance: -40.0,
            }]),
            &[Tag::new(b"kern")],
        );
        rules.add_lookup(
            "mark_to_base",
            LookupKind::MarkToBase(vec![MarkAttachment {
                class_name: "top".to_string(),
                marks: vec![MarkRecord {
                    glyph: "acutecomb".into(),
                    x: 100.0,
                    y: 450.0,
                }],
                bases: vec![MarkRecord {
                    glyph: "a".into(),
                    x: 250.0,
                    y: 500.0,
                }],
            }]),
            &[Tag::new(b"mark")],
        );
        rules.add_lookup(
            "cursive",
            LookupKind::Cursive(vec![CursiveRecord {
                glyph: "kashida".into(),
                entry: Some((300.0, 0.0)),
                exit: None,
            }]),
            &[Tag::new(b"curs")],
        );
        assert_eq!(
            "lookup liga {\n    sub f i by f_i;\n} liga;\n\n\
             lookup kern_pairs {\n    pos a [v w] -40;\n} kern_pairs;\n\n\
             markClass acutecomb <anchor 100 450> @mark_to_base_top;\n\
             lookup mark_to_base {\n    pos base a <anchor 250 500> mark @mark_to_base_top;\n} mark_to_base;\n\n\
             lookup cursive {\n    pos cursive kashida <anchor 300 0> <anchor NULL>;\n} cursive;\n\n\
             feature liga {\n    lookup liga;\n} liga;\n\n\
             feature kern {\n    lookup kern_pairs;\n} kern;\n\n\
             feature mark {\n    lookup mark_to_base;\n} mark;\n\n\
             feature curs {\n    lookup cursive;\n} curs;\n\n",
            to_fea(&rules)
        );
    }
}
