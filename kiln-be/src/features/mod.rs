//! Layout: feature writers over the font model, or interpolation of per-master binaries.
//!
//! Rule mode seeds the rules with what the source authored and lets each configured
//! [FeatureWriter] add to them. Binary mode reads one compiled layout per master and
//! interpolates its numbers at the location of the output.

use std::{fmt::Debug, path::PathBuf};

use kiln_ir::{glyph_data::GlyphData, ir::Master, layout::LayoutRules};
use kiln_types::{
    coords::NormalizedLocation,
    stages::{Registry, StageSpec},
    types::Axis,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub mod curs;
pub mod fea;
pub mod gdef;
pub mod interpolate;
pub mod kern;
pub mod marks;

pub const KERN_WRITER: &str = "KernFeatureWriter";
pub const MARK_WRITER: &str = "MarkFeatureWriter";
pub const CURS_WRITER: &str = "CursFeatureWriter";
pub const GDEF_WRITER: &str = "GdefFeatureWriter";

/// What a writer can see besides the rules generated so far.
#[derive(Debug, Clone, Copy)]
pub struct FeatureContext<'a> {
    pub master: &'a Master,
    pub glyph_data: &'a GlyphData,
}

/// Produces or augments layout rules from the font model.
pub trait FeatureWriter: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn write(&self, context: FeatureContext, rules: &mut LayoutRules) -> Result<(), Error>;
}

fn kern() -> Box<dyn FeatureWriter> {
    Box::new(kern::KernFeatureWriter)
}

fn mark() -> Box<dyn FeatureWriter> {
    Box::new(marks::MarkFeatureWriter)
}

fn curs() -> Box<dyn FeatureWriter> {
    Box::new(curs::CursFeatureWriter)
}

fn gdef() -> Box<dyn FeatureWriter> {
    Box::new(gdef::GdefFeatureWriter)
}

pub fn feature_writers() -> Registry<Box<dyn FeatureWriter>> {
    Registry::new("feature writer")
        .register(KERN_WRITER, kern, true)
        .register(MARK_WRITER, mark, true)
        .register(CURS_WRITER, curs, true)
        .register(GDEF_WRITER, gdef, true)
}

/// The layout of one output and how it was made.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum LayoutTable {
    Rules(LayoutRules),
    Interpolated(LayoutRules),
}

impl LayoutTable {
    pub fn rules(&self) -> &LayoutRules {
        match self {
            LayoutTable::Rules(rules) | LayoutTable::Interpolated(rules) => rules,
        }
    }

    pub fn rules_mut(&mut self) -> &mut LayoutRules {
        match self {
            LayoutTable::Rules(rules) | LayoutTable::Interpolated(rules) => rules,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutMode {
    Rules {
        writers: Vec<StageSpec>,
        generate_gdef: bool,
    },
    /// Directory of `<master name>.layout` files
    Binary(PathBuf),
}

impl Default for LayoutMode {
    fn default() -> Self {
        LayoutMode::Rules {
            writers: Vec::new(),
            generate_gdef: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayoutOptions {
    pub mode: LayoutMode,
    pub debug_feature_file: Option<PathBuf>,
}

/// Everything layout generation reads.
#[derive(Debug, Clone)]
pub struct LayoutInput<'a> {
    /// The glyphs of the output: the default master of a variable font, a master, or an instance
    pub reference: &'a Master,
    pub masters: &'a [Master],
    pub master_locations: &'a [NormalizedLocation],
    pub axes: &'a [Axis],
    pub location: NormalizedLocation,
    /// Rules from the source or an MTI file
    pub authored: &'a LayoutRules,
    pub glyph_data: &'a GlyphData,
    pub variable: bool,
}

#[derive(Debug)]
pub struct LayoutFeatureGenerator {
    writers: Vec<Box<dyn FeatureWriter>>,
    binary_dir: Option<PathBuf>,
    debug_feature_file: Option<PathBuf>,
}

impl LayoutFeatureGenerator {
    pub fn new(options: LayoutOptions) -> Result<LayoutFeatureGenerator, Error> {
        let (writers, binary_dir) = match options.mode {
            LayoutMode::Rules {
                writers,
                generate_gdef,
            } => {
                let mut writers = feature_writers().resolve(&writers)?;
                if !generate_gdef {
                    writers.retain(|w| w.name() != GDEF_WRITER);
                }
                (writers, None)
            }
            LayoutMode::Binary(dir) => (Vec::new(), Some(dir)),
        };
        Ok(LayoutFeatureGenerator {
            writers,
            binary_dir,
            debug_feature_file: options.debug_feature_file,
        })
    }

    pub fn writer_names(&self) -> Vec<&'static str> {
        self.writers.iter().map(|w| w.name()).collect()
    }

    pub fn generate(&self, input: &LayoutInput) -> Result<LayoutTable, Error> {
        let table = match &self.binary_dir {
            Some(dir) => {
                let layouts =
                    interpolate::load_layouts(dir, input.masters, input.master_locations)?;
                LayoutTable::Interpolated(interpolate::interpolate_layouts(
                    &layouts,
                    input.axes,
                    &input.location,
                )?)
            }
            None => LayoutTable::Rules(self.write_rules(input)?),
        };
        if let Some(path) = &self.debug_feature_file {
            fea::write_feature_file(path, table.rules())?;
        }
        Ok(table)
    }

    fn write_rules(&self, input: &LayoutInput) -> Result<LayoutRules, Error> {
        let mut rules = input.authored.clone();
        let context = FeatureContext {
            master: input.reference,
            glyph_data: input.glyph_data,
        };
        for writer in self.writers.iter() {
            let before = rules.lookups.len();
            writer.write(context, &mut rules)?;
            debug!(
                "{} added {} lookups",
                writer.name(),
                rules.lookups.len().saturating_sub(before)
            );
        }

        if input.variable {
            // written once against the default master, so every master must have what they use
            for glyph_name in rules.referenced_glyphs() {
                if let Some(master) = input
                    .masters
                    .iter()
                    .find(|m| !m.glyphs.contains_key(glyph_name.as_str()))
                {
                    return Err(Error::LayoutGlyphMissing {
                        glyph_name,
                        master: master.name.clone(),
                    });
                }
            }
        } else {
            rules.retain_glyphs(|g| input.reference.glyphs.contains_key(g.as_str()));
        }
        info!(
            "{} lookups in {} features for '{}'",
            rules.lookups.len(),
            rules.features.len(),
            input.reference.name
        );
        Ok(rules)
    }
}
