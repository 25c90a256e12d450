use std::{fmt::Display, io, path::PathBuf};

use kiln_types::{error::StageError, types::GlyphName};
use thiserror::Error;

use crate::cff::{charstring::ExecError, Flavor};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ir(#[from] kiln_ir::error::Error),
    #[error("IO failure for '{path}': {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unable to (de)serialize '{path}': {source}")]
    Bincode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error(transparent)]
    BackendUnavailable(#[from] StageError),
    #[error("The {subroutinizer} subroutinizer cannot write {flavor}")]
    UnsupportedFlavor {
        subroutinizer: &'static str,
        flavor: Flavor,
    },
    #[error("{0} outlines cannot vary, variable CFF outlines are CFF2")]
    NotVariable(Flavor),
    #[error("{stage} changed the result for '{glyph_name}': {detail}")]
    OptimizationInvariant {
        stage: &'static str,
        glyph_name: GlyphName,
        detail: String,
    },
    #[error("'{0}' {1}")]
    GlyphError(GlyphName, GlyphProblem),
    #[error("{} glyphs failed:\n{}", .0.len(), join_lines(.0))]
    GlyphErrors(Vec<(GlyphName, GlyphProblem)>),
    #[error("Layout of master '{master}' does not have the same structure as '{reference}'")]
    LayoutStructure { master: String, reference: String },
    #[error("Layout references '{glyph_name}', which master '{master}' does not have")]
    LayoutGlyphMissing {
        glyph_name: GlyphName,
        master: String,
    },
    #[error("Binary layout interpolation needs more than one master")]
    SingleMasterLayout,
}

fn join_lines(items: &[(GlyphName, GlyphProblem)]) -> String {
    items
        .iter()
        .map(|(name, problem)| format!("  '{name}' {problem}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlyphProblem {
    /// Components and contours together; should have been decomposed
    HasComponentsAndPath,
    /// A coordinate doesn't fit in the binary representation
    CoordinateOutOfRange(f64),
    NotInterpolatable(String),
    MissingFromDefault,
    BadCharString(ExecError),
}

impl Display for GlyphProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlyphProblem::HasComponentsAndPath => {
                write!(f, "has components *and* paths")
            }
            GlyphProblem::CoordinateOutOfRange(v) => {
                write!(f, "has a coordinate, {v}, that doesn't fit in 16 bits")
            }
            GlyphProblem::NotInterpolatable(why) => write!(f, "is not interpolatable: {why}"),
            GlyphProblem::MissingFromDefault => write!(f, "is missing from the default master"),
            GlyphProblem::BadCharString(e) => write!(f, "has a bad charstring: {e}"),
        }
    }
}
