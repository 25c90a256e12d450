//! A compiled font and the writers that persist it.

use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use kiln_types::types::{Axis, GlyphName};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    cff::CffOutlines, error::Error, features::LayoutTable, glyf::GlyfGlyph,
    gvar::GlyphVariations,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Outlines {
    /// In glyph order
    Glyf(Vec<GlyfGlyph>),
    Cff(CffOutlines),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FontVariations {
    pub axes: Vec<Axis>,
    pub glyphs: Vec<GlyphVariations>,
}

/// All the tables of one output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CompiledFont {
    pub family_name: String,
    pub style_name: String,
    pub units_per_em: u16,
    pub glyph_order: Vec<GlyphName>,
    /// Advance widths in glyph order
    pub advances: Vec<u16>,
    pub cmap: BTreeMap<u32, GlyphName>,
    pub outlines: Outlines,
    pub variations: Option<FontVariations>,
    pub layout: LayoutTable,
}

impl CompiledFont {
    pub fn is_truetype(&self) -> bool {
        matches!(self.outlines, Outlines::Glyf(..))
    }

    /// Rename glyphs everywhere they are mentioned.
    pub fn rename_glyphs(&mut self, rename: impl Fn(&GlyphName) -> GlyphName) {
        self.glyph_order.iter_mut().for_each(|g| *g = rename(g));
        self.cmap.values_mut().for_each(|g| *g = rename(g));
        match &mut self.outlines {
            Outlines::Glyf(glyphs) => {
                for glyph in glyphs.iter_mut() {
                    if let GlyfGlyph::Composite(components) = glyph {
                        components.iter_mut().for_each(|c| c.base = rename(&c.base));
                    }
                }
            }
            Outlines::Cff(cff) => cff.glyph_order.iter_mut().for_each(|g| *g = rename(g)),
        }
        if let Some(variations) = self.variations.as_mut() {
            variations
                .glyphs
                .iter_mut()
                .for_each(|g| g.glyph_name = rename(&g.glyph_name));
        }
        self.layout.rules_mut().rename_glyphs(&rename);
    }
}

/// Persists a compiled font.
pub trait OutputWriter: Debug + Send + Sync {
    fn write(&self, font: CompiledFont, path: &Path) -> Result<(), Error>;
}

/// Writes the font with bincode.
///
/// The file appears only once complete, so a failed write never leaves a partial font behind.
#[derive(Debug, Default)]
pub struct BincodeWriter;

impl OutputWriter for BincodeWriter {
    fn write(&self, font: CompiledFont, path: &Path) -> Result<(), Error> {
        let io_err = |source| Error::FileIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let partial = path.with_extension("partial");
        let file = File::create(&partial).map_err(io_err)?;
        let mut buf = BufWriter::new(file);
        bincode::serialize_into(&mut buf, &font).map_err(|source| Error::Bincode {
            path: partial.clone(),
            source,
        })?;
        buf.flush().map_err(io_err)?;
        drop(buf);
        fs::rename(&partial, path).map_err(io_err)?;
        debug!("{} glyphs in {path:?}", font.glyph_order.len());
        info!("Wrote {path:?}");
        Ok(())
    }
}

pub fn read_font(path: &Path) -> Result<CompiledFont, Error> {
    let file = File::open(path).map_err(|source| Error::FileIo {
        path: path.to_path_buf(),
        source,
    })?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|source| Error::Bincode {
        path: path.to_path_buf(),
        source,
    })
}
