use thiserror::Error;

use crate::coords::DesignCoord;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Location involves undefined axis '{0}'")]
    UnknownAxis(String),
    #[error("Axis '{axis}' default {default:?} is outside [{min:?}, {max:?}]")]
    DefaultOutOfRange {
        axis: String,
        min: DesignCoord,
        default: DesignCoord,
        max: DesignCoord,
    },
}

/// Failure to resolve an ordered list of pluggable stages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("No {kind} named '{name}' is available; choose from {available:?}")]
    Unavailable {
        kind: &'static str,
        name: String,
        available: Vec<String>,
    },
    #[error("'...' may appear at most once in the {0} list")]
    RepeatedEllipsis(&'static str),
    #[error("'None' disables all {0}s and cannot be combined with other entries")]
    NoneWithOthers(&'static str),
}
