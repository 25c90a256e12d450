use std::{io, path::PathBuf};

use kiln_types::error::StageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("'{0}' exists but is not a directory")]
    ExpectedDirectory(PathBuf),
    #[error("io failed for '{path}': '{source}'")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Missing file '{0}'")]
    FileExpected(PathBuf),
    #[error(transparent)]
    YamlSerError(#[from] serde_yaml::Error),
    #[error("Bad configuration: {0}")]
    Config(String),
    #[error(transparent)]
    BackendUnavailable(#[from] StageError),
    #[error(transparent)]
    FontIrError(#[from] kiln_ir::error::Error),
    #[error(transparent)]
    Backend(#[from] kiln_be::error::Error),
    #[error("Autohinting '{path}' failed: {message}")]
    Autohint { path: PathBuf, message: String },
    #[error("{} of {total} fonts failed: {}", .failed.len(), .failed.join(", "))]
    FontsFailed { failed: Vec<String>, total: usize },
    #[error("A task panicked: '{0}'")]
    Panic(String),
}
