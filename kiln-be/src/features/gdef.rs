//! GDEF glyph classes.

use kiln_ir::{
    glyph_data::GlyphCategory,
    layout::{GdefClasses, LayoutRules},
};
use log::debug;

use crate::error::Error;

use super::{FeatureContext, FeatureWriter, GDEF_WRITER};

/// Classifies every glyph by glyph data, then anchors, then Unicode.
///
/// Authored classes win; nothing is generated when the source has its own.
#[derive(Debug, Default)]
pub struct GdefFeatureWriter;

impl FeatureWriter for GdefFeatureWriter {
    fn name(&self) -> &'static str {
        GDEF_WRITER
    }

    fn write(&self, context: FeatureContext, rules: &mut LayoutRules) -> Result<(), Error> {
        if rules.gdef.as_ref().is_some_and(|g| !g.is_empty()) {
            debug!("Keeping authored GDEF classes");
            return Ok(());
        }
        let mut classes = GdefClasses::default();
        for glyph in context.master.glyphs.values() {
            let class = match context.glyph_data.category(glyph) {
                Some(GlyphCategory::Base) => &mut classes.bases,
                Some(GlyphCategory::Ligature) => &mut classes.ligatures,
                Some(GlyphCategory::Mark) => &mut classes.marks,
                Some(GlyphCategory::Component) => &mut classes.components,
                None => continue,
            };
            class.insert(glyph.name.clone());
        }
        if !classes.is_empty() {
            rules.gdef = Some(classes);
        }
        Ok(())
    }
}
