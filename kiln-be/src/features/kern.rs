//! Pair positioning from the kerning of the font model.

use kiln_ir::{
    ir::KernSide,
    layout::{LayoutRules, LookupKind, PairAdjustment},
};
use kiln_types::types::Tag;
use log::warn;

use crate::error::Error;

use super::{FeatureContext, FeatureWriter, KERN_WRITER};

pub const KERN_LOOKUP: &str = "kern_pairs";

#[derive(Debug, Default)]
pub struct KernFeatureWriter;

/// Specific pairs come first so they win over the classes they belong to.
fn specificity(left: &KernSide, right: &KernSide) -> u8 {
    match (left, right) {
        (KernSide::Glyph(..), KernSide::Glyph(..)) => 0,
        (KernSide::Glyph(..), KernSide::Group(..)) => 1,
        (KernSide::Group(..), KernSide::Glyph(..)) => 2,
        (KernSide::Group(..), KernSide::Group(..)) => 3,
    }
}

impl FeatureWriter for KernFeatureWriter {
    fn name(&self) -> &'static str {
        KERN_WRITER
    }

    fn write(&self, context: FeatureContext, rules: &mut LayoutRules) -> Result<(), Error> {
        let kerning = &context.master.kerning;
        if kerning.is_empty() {
            return Ok(());
        }
        let mut pairs: Vec<_> = kerning.pairs.iter().collect();
        pairs.sort_by_key(|p| specificity(&p.left, &p.right));

        let adjustments: Vec<_> = pairs
            .into_iter()
            .filter_map(|pair| {
                let first: Vec<_> = kerning.glyphs(&pair.left).into_iter().cloned().collect();
                let second: Vec<_> = kerning.glyphs(&pair.right).into_iter().cloned().collect();
                if first.is_empty() || second.is_empty() {
                    warn!("Skipping kerning {:?} {:?}, a side is empty", pair.left, pair.right);
                    return None;
                }
                Some(PairAdjustment {
                    first,
                    second,
                    x_advance: pair.value,
                })
            })
            .collect();
        if adjustments.is_empty() {
            return Ok(());
        }
        rules.add_lookup(KERN_LOOKUP, LookupKind::PairPos(adjustments), &[Tag::new(b"kern")]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kiln_ir::{
        glyph_data::GlyphData,
        ir::{KernPair, KernSide},
        layout::{LayoutRules, LookupKind},
    };
    use pretty_assertions::assert_eq;

    use crate::features::{tests::test_master, FeatureContext, FeatureWriter};

    use super::{KernFeatureWriter, KERN_LOOKUP};

    #[test]
    fn glyph_pairs_precede_group_pairs() {
        let mut master = test_master("Regular", 250.0);
        master
            .kerning
            .groups
            .insert("public.kern1.a".to_string(), vec!["a".into(), "acutecomb".into()]);
        master.kerning.pairs.insert(
            0,
            KernPair {
                left: KernSide::Group("public.kern1.a".to_string()),
                right: KernSide::Glyph("v".into()),
                value: -20.0,
            },
        );
        master.kerning.pairs.push(KernPair {
            left: KernSide::Group("public.kern1.missing".to_string()),
            right: KernSide::Glyph("v".into()),
            value: -5.0,
        });
        let glyph_data = GlyphData::default();
        let mut rules = LayoutRules::default();
        KernFeatureWriter
            .write(
                FeatureContext {
                    master: &master,
                    glyph_data: &glyph_data,
                },
                &mut rules,
            )
            .unwrap();

        let Some(LookupKind::PairPos(pairs)) = rules.lookup(KERN_LOOKUP).map(|l| &l.kind) else {
            panic!("no kerning in {rules:?}");
        };
        let summary: Vec<_> = pairs
            .iter()
            .map(|p| (p.first.len(), p.second.len(), p.x_advance))
            .collect();
        assert_eq!(vec![(1, 1, -40.0), (2, 1, -20.0)], summary);
    }

    #[test]
    fn no_kerning_no_lookup() {
        let mut master = test_master("Regular", 250.0);
        master.kerning.pairs.clear();
        let glyph_data = GlyphData::default();
        let mut rules = LayoutRules::default();
        KernFeatureWriter
            .write(
                FeatureContext {
                    master: &master,
                    glyph_data: &glyph_data,
                },
                &mut rules,
            )
            .unwrap();
        assert!(rules.is_empty());
    }
}
