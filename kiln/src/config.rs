//! Arguments, checked and turned into the options each stage takes.

use std::{fs, path::PathBuf};

use kiln_be::{
    cff::{subroutinize::COMPREFFOR, CffOptimizer, CffOptions, Flavor, OptimizeLevel},
    features::{feature_writers, LayoutMode, LayoutOptions},
};
use kiln_ir::{
    curves::CurvePolicy,
    filters,
    instances::InstanceOptions,
    ir::Designspace,
    orchestration::Flags,
    overlaps,
};
use kiln_types::stages::StageSpec;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{args::Target, Args, Error};

/// The settings of a single build.
///
/// Everything that can be wrong with the arguments alone is found by [Config::new],
/// before any font is touched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub args: Args,
}

fn stage_specs(raw: &[String]) -> Vec<StageSpec> {
    raw.iter().map(|s| StageSpec::from(s.as_str())).collect()
}

impl Config {
    pub fn new(args: Args) -> Result<Config, Error> {
        let config = Config { args };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        let args = &self.args;
        if args.output.is_empty() {
            return Err(Error::Config("nothing to build".to_string()));
        }
        if args.no_check_compatibility && self.has_variable_target() {
            return Err(Error::Config(
                "--no-check-compatibility cannot be used with variable fonts".to_string(),
            ));
        }
        if args.interpolate_binary_layout.is_some() && !args.feature_writer.is_empty() {
            return Err(Error::Config(
                "--interpolate-binary-layout and --feature-writer are mutually exclusive"
                    .to_string(),
            ));
        }
        if !(args.conversion_error > 0.0) {
            return Err(Error::Config(format!(
                "--conversion-error must be positive, not {}",
                args.conversion_error
            )));
        }
        if args.cff_round_tolerance < 0.0 {
            return Err(Error::Config(format!(
                "--cff-round-tolerance must not be negative, not {}",
                args.cff_round_tolerance
            )));
        }

        if args.subroutinize || args.no_subroutinize {
            warn!("--subroutinize and --no-subroutinize are deprecated, use --optimize-cff");
        }
        self.curve_policy()?;
        overlaps::backend(&args.overlaps_backend)?;
        feature_writers().resolve_names(&self.feature_writers())?;
        for target in args.output.iter() {
            filters::registry(target.is_cff()).resolve_names(&self.filters())?;
            if let Some(flavor) = target.cff_flavor() {
                if flavor == Flavor::Cff2 && args.subroutinizer.as_deref() == Some(COMPREFFOR) {
                    return Err(Error::Config(format!("{COMPREFFOR} cannot subroutinize CFF2")));
                }
                CffOptimizer::new(self.cff_options(flavor))?;
            }
        }
        debug!("{:?} passed validation", args.output);
        Ok(())
    }

    /// Checks that need the font.
    pub fn validate_source(&self, designspace: &Designspace) -> Result<(), Error> {
        if self.args.interpolate_binary_layout.is_some() && !designspace.is_variable() {
            return Err(Error::Config(
                "--interpolate-binary-layout needs a source with several masters".to_string(),
            ));
        }
        if self.has_variable_target() && !designspace.is_variable() {
            return Err(Error::Config(
                "a variable font needs a source with several masters".to_string(),
            ));
        }
        if self.args.interpolate && designspace.instances.is_empty() {
            warn!("--interpolate given but the source has no instances");
        }
        Ok(())
    }

    pub fn flags(&self) -> Flags {
        self.args.flags()
    }

    pub fn has_variable_target(&self) -> bool {
        self.args.output.iter().any(|t| t.is_variable())
    }

    pub fn curve_policy(&self) -> Result<CurvePolicy, Error> {
        self.args.ttf_curves.parse().map_err(Error::Config)
    }

    pub fn feature_writers(&self) -> Vec<StageSpec> {
        stage_specs(&self.args.feature_writer)
    }

    pub fn filters(&self) -> Vec<StageSpec> {
        stage_specs(&self.args.filter)
    }

    /// --optimize-cff wins over the deprecated --[no-]subroutinize.
    pub fn optimize_level(&self) -> OptimizeLevel {
        let args = &self.args;
        let deprecated = match (args.subroutinize, args.no_subroutinize) {
            (true, _) => Some(OptimizeLevel::Subroutinize),
            (_, true) => Some(OptimizeLevel::Specialize),
            _ => None,
        };
        match (args.optimize_cff, deprecated) {
            (Some(level), _) => OptimizeLevel::try_from(level).unwrap_or_default(),
            (None, Some(level)) => level,
            (None, None) => OptimizeLevel::default(),
        }
    }

    pub fn cff_options(&self, flavor: Flavor) -> CffOptions {
        CffOptions {
            flavor,
            level: self.optimize_level(),
            subroutinizer: self.args.subroutinizer.clone(),
            round_tolerance: self.args.cff_round_tolerance,
        }
    }

    pub fn instance_options(&self) -> InstanceOptions {
        InstanceOptions {
            round: self.args.round_instances,
            extrapolate: self.args.allow_extrapolation,
        }
    }

    /// Layout options for one font; `label` keeps debug feature files of different fonts apart.
    pub fn layout_options(&self, label: Option<&str>) -> LayoutOptions {
        let mode = match &self.args.interpolate_binary_layout {
            Some(dir) => LayoutMode::Binary(dir.clone()),
            None => LayoutMode::Rules {
                writers: self.feature_writers(),
                generate_gdef: self.flags().contains(Flags::GENERATE_GDEF),
            },
        };
        let debug_feature_file = self.args.debug_feature_file.as_ref().map(|path| match label {
            Some(label) => {
                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("features");
                path.with_file_name(format!("{stem}.{label}.fea"))
            }
            None => path.clone(),
        });
        LayoutOptions {
            mode,
            debug_feature_file,
        }
    }

    pub fn autohint(&self) -> Option<Vec<String>> {
        self.args.autohint_args()
    }

    /// --master-dir and --instance-dir win over the per target subdirectories of --output-dir.
    pub fn output_dir(&self, target: Target, from_instances: bool) -> PathBuf {
        let chosen = if from_instances && !target.is_variable() {
            &self.args.instance_dir
        } else {
            &self.args.master_dir
        };
        if let Some(dir) = chosen {
            return dir.clone();
        }
        let kind = match (target, from_instances) {
            (Target::Variable, _) => "variable_ttf",
            (Target::VariableCff2, _) => "variable_otf",
            (Target::Ttf, false) => "master_ttf",
            (Target::Ttf, true) => "instance_ttf",
            (Target::Otf, false) => "master_otf",
            (Target::Otf, true) => "instance_otf",
            (Target::OtfCff2, false) => "master_otf_cff2",
            (Target::OtfCff2, true) => "instance_otf_cff2",
        };
        self.args.output_dir.join(kind)
    }

    /// Record the arguments next to the fonts they produced.
    pub fn write(&self) -> Result<PathBuf, Error> {
        let dir = &self.args.output_dir;
        if dir.exists() && !dir.is_dir() {
            return Err(Error::ExpectedDirectory(dir.clone()));
        }
        fs::create_dir_all(dir).map_err(|source| Error::FileIo {
            path: dir.clone(),
            source,
        })?;
        let file = dir.join("kiln.yml");
        fs::write(&file, serde_yaml::to_string(self)?).map_err(|source| Error::FileIo {
            path: file.clone(),
            source,
        })?;
        Ok(file)
    }
}
