use std::{fmt::Display, io, path::PathBuf};

use kiln_types::{coords::NormalizedLocation, error::StageError, types::GlyphName};
use thiserror::Error;

use crate::compatibility::Incompatibility;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO failure for '{path}': {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unable to parse '{0}': {1}")]
    ParseError(PathBuf, String),
    #[error("Unrecognized source '{0}'")]
    UnrecognizedSource(PathBuf),
    #[error(transparent)]
    Coords(#[from] kiln_types::error::Error),
    #[error(transparent)]
    BackendUnavailable(#[from] StageError),
    #[error("No master is at the default location")]
    NoDefaultMaster,
    #[error("Several masters are at the default location: {0:?}")]
    MultipleDefaultMasters(Vec<String>),
    #[error(transparent)]
    BadGlyph(#[from] BadGlyph),
    #[error("{} glyphs failed:\n{}", .0.len(), join_lines(.0))]
    GlyphErrors(Vec<BadGlyph>),
    #[error("Masters are not interpolation compatible:\n{}", join_lines(.0))]
    IncompatibleMasters(Vec<Incompatibility>),
    #[error("Instance '{instance}' is outside the designspace on '{axis}' ({value})")]
    InstanceOutsideDesignspace {
        instance: String,
        axis: String,
        value: f64,
    },
    #[error(transparent)]
    VariationModel(#[from] VariationModelError),
    #[error(transparent)]
    Delta(#[from] DeltaError),
    #[error("Bad MTI source at line {line}: {message}")]
    MtiParse { line: usize, message: String },
}

fn join_lines<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| format!("  {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A problem with one specific glyph.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("'{glyph_name}' {kind}")]
pub struct BadGlyph {
    pub glyph_name: GlyphName,
    pub kind: BadGlyphKind,
}

impl BadGlyph {
    pub fn new(glyph_name: impl Into<GlyphName>, kind: BadGlyphKind) -> Self {
        BadGlyph {
            glyph_name: glyph_name.into(),
            kind,
        }
    }

    /// True for problems that may be reported without stopping other glyphs
    pub fn is_tolerance_exceeded(&self) -> bool {
        matches!(self.kind, BadGlyphKind::ToleranceExceeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BadGlyphKind {
    OddPointPattern { contour: usize, point: usize },
    ComponentCycle(Vec<GlyphName>),
    MissingComponent(GlyphName),
    CubicInQuadraticTarget { contour: usize },
    ToleranceExceeded { contour: usize, tolerance: f64 },
    MissingFromMaster(String),
    UndefinedAtLocation(NormalizedLocation),
    InconsistentConversion(String),
    /// The masters disagree on structure so no instance can be blended
    NotInterpolatable(String),
}

impl Display for BadGlyphKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BadGlyphKind::OddPointPattern { contour, point } => {
                write!(f, "has a malformed point pattern at contour {contour}, point {point}")
            }
            BadGlyphKind::ComponentCycle(cycle) => {
                write!(f, "is part of a component cycle {cycle:?}")
            }
            BadGlyphKind::MissingComponent(base) => {
                write!(f, "references missing component '{base}'")
            }
            BadGlyphKind::CubicInQuadraticTarget { contour } => write!(
                f,
                "has cubic curves in contour {contour} but the target only takes quadratics"
            ),
            BadGlyphKind::ToleranceExceeded { contour, tolerance } => write!(
                f,
                "contour {contour} cannot be approximated within {tolerance} units"
            ),
            BadGlyphKind::MissingFromMaster(master) => {
                write!(f, "is missing from master '{master}'")
            }
            BadGlyphKind::UndefinedAtLocation(loc) => write!(f, "is undefined at {loc:?}"),
            BadGlyphKind::InconsistentConversion(why) => {
                write!(f, "converted inconsistently: {why}")
            }
            BadGlyphKind::NotInterpolatable(why) => write!(f, "cannot be interpolated: {why}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum VariationModelError {
    #[error("Axis '{0}' has min == default == max, it cannot vary")]
    PointAxis(String),
    #[error("Location {0:?} is not on any known axis")]
    UnknownAxes(NormalizedLocation),
}

#[derive(Debug, Error, PartialEq)]
pub enum DeltaError {
    #[error("The default must have a point sequence")]
    DefaultUndefined,
    #[error("Every point sequence must have the same length")]
    InconsistentNumbersOfPoints,
    #[error("{0:?} is not present in the variation model")]
    UnknownLocation(NormalizedLocation),
}
