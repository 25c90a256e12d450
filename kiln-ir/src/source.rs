//! Where a [Designspace] comes from.
//!
//! Parsing real design formats is someone else's job; kiln reads its own model
//! serialized as YAML or JSON. Anything that can produce a [Designspace] can be
//! plugged in by implementing [Source].

use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{error::Error, ir::Designspace};

/// Something that can be turned into a font model.
pub trait Source: Send + Sync {
    fn load(&self) -> Result<Designspace, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

/// The font model as kiln itself serializes it.
#[derive(Debug, Clone)]
pub struct SerializedSource {
    path: PathBuf,
    format: Format,
}

impl Source for SerializedSource {
    fn load(&self) -> Result<Designspace, Error> {
        let raw = read_to_string(&self.path)?;
        let designspace: Designspace = match self.format {
            Format::Yaml => serde_yaml::from_str(&raw)
                .map_err(|e| Error::ParseError(self.path.clone(), e.to_string()))?,
            Format::Json => serde_json::from_str(&raw)
                .map_err(|e| Error::ParseError(self.path.clone(), e.to_string()))?,
        };
        // fail early rather than in whichever stage first asks
        designspace.default_master_idx()?;
        debug!(
            "Loaded {} with {} masters, {} axes",
            self.path.display(),
            designspace.masters.len(),
            designspace.axes.len()
        );
        Ok(designspace)
    }
}

/// Pick a [Source] for a path based on its extension.
pub fn source_for(path: &Path) -> Result<Box<dyn Source>, Error> {
    let ext = path
        .extension()
        .and_then(OsStr::to_str)
        .ok_or_else(|| Error::UnrecognizedSource(path.to_path_buf()))?;
    let format = match ext {
        "yaml" | "yml" => Format::Yaml,
        "json" => Format::Json,
        _ => return Err(Error::UnrecognizedSource(path.to_path_buf())),
    };
    Ok(Box::new(SerializedSource {
        path: path.to_path_buf(),
        format,
    }))
}

pub(crate) fn read_to_string(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|source| Error::FileIo {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use tempfile::tempdir;

    use crate::error::Error;

    use super::source_for;

    const MINIMAL: &str = r#"
family_name: Test
axes:
  - name: Weight
    tag: wght
    min: 400
    default: 400
    max: 700
masters:
  - name: Regular
    location: { Weight: 400 }
    glyphs:
      - name: a
        width: 500
  - name: Bold
    location: { Weight: 700 }
    glyphs:
      - name: a
        width: 600
"#;

    #[test]
    fn loads_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.yaml");
        fs::write(&path, MINIMAL).unwrap();

        let designspace = source_for(&path).unwrap().load().unwrap();
        assert_eq!("Test", designspace.family_name);
        assert_eq!(2, designspace.masters.len());
        assert_eq!(0, designspace.default_master_idx().unwrap());
    }

    #[test]
    fn loads_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.json");
        let designspace: serde_yaml::Value = serde_yaml::from_str(MINIMAL).unwrap();
        fs::write(&path, serde_json::to_string(&designspace).unwrap()).unwrap();

        let designspace = source_for(&path).unwrap().load().unwrap();
        assert_eq!(500.0, designspace.masters[0].glyphs["a"].width);
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(matches!(
            source_for(Path::new("font.glyphs")),
            Err(Error::UnrecognizedSource(..))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let source = source_for(&dir.path().join("nope.yaml")).unwrap();
        assert!(matches!(source.load(), Err(Error::FileIo { .. })));
    }

    #[test]
    fn no_default_master() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.yaml");
        fs::write(&path, MINIMAL.replace("{ Weight: 400 }", "{ Weight: 500 }")).unwrap();
        assert!(matches!(
            source_for(&path).unwrap().load(),
            Err(Error::NoDefaultMaster)
        ));
    }
}
