//! Cursive attachment from `entry` and `exit` anchors.

use kiln_ir::layout::{CursiveRecord, LayoutRules, LookupKind};
use kiln_types::types::Tag;

use crate::error::Error;

use super::{FeatureContext, FeatureWriter, CURS_WRITER};

pub const CURS_LOOKUP: &str = "cursive";

#[derive(Debug, Default)]
pub struct CursFeatureWriter;

impl FeatureWriter for CursFeatureWriter {
    fn name(&self) -> &'static str {
        CURS_WRITER
    }

    fn write(&self, context: FeatureContext, rules: &mut LayoutRules) -> Result<(), Error> {
        let records: Vec<_> = context
            .master
            .glyphs
            .values()
            .filter_map(|glyph| {
                let point = |name| glyph.anchor(name).map(|a| (a.x, a.y));
                let (entry, exit) = (point("entry"), point("exit"));
                (entry.is_some() || exit.is_some()).then(|| CursiveRecord {
                    glyph: glyph.name.clone(),
                    entry,
                    exit,
                })
            })
            .collect();
        if !records.is_empty() {
            rules.add_lookup(CURS_LOOKUP, LookupKind::Cursive(records), &[Tag::new(b"curs")]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kiln_ir::{
        glyph_data::GlyphData,
        ir::{Anchor, Glyph},
        layout::{CursiveRecord, LayoutRules, LookupKind},
    };
    use pretty_assertions::assert_eq;

    use crate::features::{tests::test_master, FeatureContext, FeatureWriter};

    use super::{CursFeatureWriter, CURS_LOOKUP};

    #[test]
    fn entry_and_exit() {
        let mut master = test_master("Regular", 250.0);
        let mut kashida = Glyph::new("kashida");
        kashida.anchors = vec![Anchor::new("entry", 300.0, 0.0), Anchor::new("exit", 0.0, 0.0)];
        let mut initial = Glyph::new("beh.init");
        initial.anchors = vec![Anchor::new("exit", 5.0, 10.0)];
        master.add_glyph(kashida).add_glyph(initial);

        let glyph_data = GlyphData::default();
        let mut rules = LayoutRules::default();
        CursFeatureWriter
            .write(
                FeatureContext {
                    master: &master,
                    glyph_data: &glyph_data,
                },
                &mut rules,
            )
            .unwrap();
        assert_eq!(
            Some(&LookupKind::Cursive(vec![
                CursiveRecord {
                    glyph: "kashida".into(),
                    entry: Some((300.0, 0.0)),
                    exit: Some((0.0, 0.0)),
                },
                CursiveRecord {
                    glyph: "beh.init".into(),
                    entry: None,
                    exit: Some((5.0, 10.0)),
                },
            ])),
            rules.lookup(CURS_LOOKUP).map(|l| &l.kind)
        );
    }
}
