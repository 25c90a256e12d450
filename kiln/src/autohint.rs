//! Hand TrueType fonts to an external autohinter.

use std::{
    env, fs,
    path::{Path, PathBuf},
    process::Command,
};

use log::{debug, info};

use crate::{report::error_report, Error};

/// Overrides the autohinter executable.
pub const AUTOHINT_ENV: &str = "KILN_AUTOHINT";

const TTFAUTOHINT: &str = "ttfautohint";

/// Runs `<program> [args] <in> <out>` and replaces the font with the hinted result.
#[derive(Debug, Clone, PartialEq)]
pub struct Autohinter {
    program: PathBuf,
    args: Vec<String>,
}

impl Autohinter {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Autohinter {
        Autohinter {
            program: program.into(),
            args,
        }
    }

    /// ttfautohint, unless the environment names another program.
    pub fn from_env(args: Vec<String>) -> Autohinter {
        let program = env::var_os(AUTOHINT_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(TTFAUTOHINT));
        Autohinter::new(program, args)
    }

    pub fn hint(&self, font: &Path) -> Result<(), Error> {
        let hinted = font.with_extension("hinted");
        let fail = |message: String| Error::Autohint {
            path: font.to_path_buf(),
            message,
        };
        debug!("{:?} {:?} {font:?} {hinted:?}", self.program, self.args);
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(font)
            .arg(&hinted)
            .output()
            .map_err(|e| fail(format!("unable to run {:?}: {e}", self.program)))?;
        if !output.status.success() {
            let _ = fs::remove_file(&hinted);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = error_report(&stderr).unwrap_or_else(|| stderr.trim().to_string());
            return Err(fail(format!(
                "{:?} exited with {}: {detail}",
                self.program, output.status
            )));
        }
        fs::rename(&hinted, font).map_err(|source| Error::FileIo {
            path: hinted.clone(),
            source,
        })?;
        info!("Autohinted {font:?}");
        Ok(())
    }
}
