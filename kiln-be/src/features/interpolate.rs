//! Interpolate layout compiled separately for each master.
//!
//! Every master contributes a bincode `<master name>.layout` file. The files must
//! agree on everything but their numbers; the numbers are then interpolated like
//! any other master data.

use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use kiln_ir::{ir::Master, layout::LayoutRules, variations::VariationModel};
use kiln_types::{coords::NormalizedLocation, types::Axis};
use log::debug;
use write_fonts::OtRound;

use crate::error::Error;

pub fn layout_file(dir: &Path, master_name: &str) -> PathBuf {
    dir.join(format!("{master_name}.layout"))
}

pub fn load_layout(path: &Path) -> Result<LayoutRules, Error> {
    let file = File::open(path).map_err(|source| Error::FileIo {
        path: path.to_path_buf(),
        source,
    })?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|source| Error::Bincode {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_layout(path: &Path, rules: &LayoutRules) -> Result<(), Error> {
    let file = File::create(path).map_err(|source| Error::FileIo {
        path: path.to_path_buf(),
        source,
    })?;
    bincode::serialize_into(BufWriter::new(file), rules).map_err(|source| Error::Bincode {
        path: path.to_path_buf(),
        source,
    })
}

/// A master's compiled layout and where the master sits.
#[derive(Debug, Clone)]
pub struct MasterLayout {
    pub master_name: String,
    pub location: NormalizedLocation,
    pub rules: LayoutRules,
}

pub fn load_layouts(
    dir: &Path,
    masters: &[Master],
    locations: &[NormalizedLocation],
) -> Result<Vec<MasterLayout>, Error> {
    if masters.len() < 2 {
        return Err(Error::SingleMasterLayout);
    }
    masters
        .iter()
        .zip(locations)
        .map(|(master, location)| {
            Ok(MasterLayout {
                master_name: master.name.clone(),
                location: location.clone(),
                rules: load_layout(&layout_file(dir, &master.name))?,
            })
        })
        .collect()
}

/// The layout at `location`, numbers rounded to font units.
pub fn interpolate_layouts(
    layouts: &[MasterLayout],
    axes: &[Axis],
    location: &NormalizedLocation,
) -> Result<LayoutRules, Error> {
    if layouts.len() < 2 {
        return Err(Error::SingleMasterLayout);
    }
    let reference = layouts
        .iter()
        .find(|l| l.location.is_default())
        .unwrap_or(&layouts[0]);
    if let Some(odd) = layouts.iter().find(|l| !l.rules.same_structure(&reference.rules)) {
        return Err(Error::LayoutStructure {
            master: odd.master_name.clone(),
            reference: reference.master_name.clone(),
        });
    }

    let locations: HashSet<_> = layouts.iter().map(|l| l.location.clone()).collect();
    let model = VariationModel::new(locations, axes).map_err(kiln_ir::error::Error::from)?;
    let numbers: HashMap<_, _> = layouts
        .iter()
        .map(|l| (l.location.clone(), l.rules.numbers()))
        .collect();
    let values = model
        .interpolate::<f64, f64>(location, &numbers, false)
        .map_err(kiln_ir::error::Error::from)?;
    debug!("Interpolated {} layout values at {location:?}", values.len());

    let mut result = reference.rules.clone();
    let mut values = values.into_iter();
    result.visit_numbers_mut(|v| {
        if let Some(value) = values.next() {
            *v = OtRound::<i16>::ot_round(value) as f64;
        }
    });
    Ok(result)
}
