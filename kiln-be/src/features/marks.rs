//! Mark attachment from anchors: `mark` for marks on bases, `mkmk` for marks on marks.
//!
//! A mark glyph carries `_top`, the glyphs it can sit on carry `top`.

use std::collections::BTreeMap;

use kiln_ir::{
    glyph_data::GlyphCategory,
    ir::Glyph,
    layout::{LayoutRules, LookupKind, MarkAttachment, MarkRecord},
};
use kiln_types::types::Tag;

use crate::error::Error;

use super::{FeatureContext, FeatureWriter, MARK_WRITER};

#[derive(Debug, Default)]
pub struct MarkFeatureWriter;

fn record(glyph: &Glyph, anchor_name: &str) -> Option<MarkRecord> {
    glyph.anchor(anchor_name).map(|a| MarkRecord {
        glyph: glyph.name.clone(),
        x: a.x,
        y: a.y,
    })
}

impl FeatureWriter for MarkFeatureWriter {
    fn name(&self) -> &'static str {
        MARK_WRITER
    }

    fn write(&self, context: FeatureContext, rules: &mut LayoutRules) -> Result<(), Error> {
        let glyphs = &context.master.glyphs;
        let is_mark =
            |glyph: &Glyph| context.glyph_data.category(glyph) == Some(GlyphCategory::Mark);

        // class name => marks in that class
        let mut classes: BTreeMap<&str, Vec<MarkRecord>> = BTreeMap::new();
        for glyph in glyphs.values().filter(|g| is_mark(g)) {
            for anchor in glyph.anchors.iter().filter(|a| a.is_mark()) {
                classes.entry(&anchor.name[1..]).or_default().push(MarkRecord {
                    glyph: glyph.name.clone(),
                    x: anchor.x,
                    y: anchor.y,
                });
            }
        }

        let mut to_base = Vec::new();
        let mut to_mark = Vec::new();
        for (class_name, marks) in classes {
            let (mark_bases, bases): (Vec<_>, Vec<_>) = glyphs
                .values()
                .filter_map(|g| record(g, class_name).map(|r| (is_mark(g), r)))
                .partition(|(mark, _)| *mark);
            let attachment = |bases: Vec<(bool, MarkRecord)>| MarkAttachment {
                class_name: class_name.to_string(),
                marks: marks.clone(),
                bases: bases.into_iter().map(|(_, r)| r).collect(),
            };
            if !bases.is_empty() {
                to_base.push(attachment(bases));
            }
            if !mark_bases.is_empty() {
                to_mark.push(attachment(mark_bases));
            }
        }

        if !to_base.is_empty() {
            rules.add_lookup("mark_to_base", LookupKind::MarkToBase(to_base), &[Tag::new(b"mark")]);
        }
        if !to_mark.is_empty() {
            rules.add_lookup("mark_to_mark", LookupKind::MarkToMark(to_mark), &[Tag::new(b"mkmk")]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kiln_ir::{
        glyph_data::GlyphData,
        ir::{Anchor, Glyph},
        layout::{LayoutRules, LookupKind, MarkAttachment, MarkRecord},
    };
    use pretty_assertions::assert_eq;

    use crate::features::{tests::test_master, FeatureContext, FeatureWriter};

    use super::MarkFeatureWriter;

    fn write(master: &kiln_ir::ir::Master) -> LayoutRules {
        let glyph_data = GlyphData::default();
        let mut rules = LayoutRules::default();
        MarkFeatureWriter
            .write(
                FeatureContext {
                    master,
                    glyph_data: &glyph_data,
                },
                &mut rules,
            )
            .unwrap();
        rules
    }

    #[test]
    fn marks_attach_to_bases_and_marks() {
        let rules = write(&test_master("Regular", 250.0));
        let mark = |glyph: &str, x: f64, y: f64| MarkRecord {
            glyph: glyph.into(),
            x,
            y,
        };
        assert_eq!(
            Some(&LookupKind::MarkToBase(vec![MarkAttachment {
                class_name: "top".to_string(),
                marks: vec![mark("acutecomb", 100.0, 450.0)],
                bases: vec![mark("a", 250.0, 500.0)],
            }])),
            rules.lookup("mark_to_base").map(|l| &l.kind)
        );
        assert_eq!(
            Some(&LookupKind::MarkToMark(vec![MarkAttachment {
                class_name: "top".to_string(),
                marks: vec![mark("acutecomb", 100.0, 450.0)],
                bases: vec![mark("acutecomb", 100.0, 650.0)],
            }])),
            rules.lookup("mark_to_mark").map(|l| &l.kind)
        );
    }

    #[test]
    fn classes_without_bases_are_skipped() {
        let mut master = test_master("Regular", 250.0);
        let mut dot = Glyph::new("dotbelowcomb");
        dot.codepoints = vec![0x323];
        dot.anchors = vec![Anchor::new("_bottom", 100.0, 0.0)];
        master.add_glyph(dot);
        let rules = write(&master);
        let Some(LookupKind::MarkToBase(attachments)) =
            rules.lookup("mark_to_base").map(|l| &l.kind)
        else {
            panic!("no mark to base in {rules:?}");
        };
        assert_eq!(
            vec!["top"],
            attachments.iter().map(|a| a.class_name.as_str()).collect::<Vec<_>>()
        );
    }
}
