//! Command line arguments

use std::{fmt::Display, path::PathBuf};

use clap::{Parser, ValueEnum};
use kiln_be::cff::{
    subroutinize::{CFFSUBR, COMPREFFOR},
    Flavor,
};
use kiln_ir::{
    curves::CurvePolicy,
    orchestration::Flags,
    overlaps::{BOOLEAN_OPERATIONS, PATHOPS},
};
use serde::{Deserialize, Serialize};

/// The kinds of font kiln can build.
#[derive(Serialize, Deserialize, ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Static fonts with glyf outlines
    Ttf,
    /// Static fonts with CFF outlines
    Otf,
    /// Static fonts with CFF2 outlines
    OtfCff2,
    /// One variable font with glyf and gvar
    Variable,
    /// One variable font with blended CFF2 outlines
    VariableCff2,
}

impl Target {
    pub fn is_cff(self) -> bool {
        self.cff_flavor().is_some()
    }

    pub fn cff_flavor(self) -> Option<Flavor> {
        match self {
            Target::Otf => Some(Flavor::Cff),
            Target::OtfCff2 | Target::VariableCff2 => Some(Flavor::Cff2),
            Target::Ttf | Target::Variable => None,
        }
    }

    pub fn is_variable(self) -> bool {
        matches!(self, Target::Variable | Target::VariableCff2)
    }

    pub fn extension(self) -> &'static str {
        if self.is_cff() {
            "otf"
        } else {
            "ttf"
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Target::Ttf => "ttf",
            Target::Otf => "otf",
            Target::OtfCff2 => "otf-cff2",
            Target::Variable => "variable",
            Target::VariableCff2 => "variable-cff2",
        })
    }
}

/// What font can we bake for you today?
#[derive(Serialize, Deserialize, Parser, Debug, Clone, PartialEq)]
#[command(version, about)]
pub struct Args {
    /// A font model serialized as .yaml or .json
    pub source: PathBuf,

    /// Which fonts to build; repeat for several
    #[arg(short, long, value_enum, default_values_t = [Target::Ttf])]
    pub output: Vec<Target>,

    /// Where the fonts go
    #[arg(long, default_value = "build")]
    pub output_dir: PathBuf,

    /// Put master and variable fonts here rather than in a subdirectory of --output-dir
    #[arg(long)]
    pub master_dir: Option<PathBuf>,

    /// Put interpolated instances here rather than in a subdirectory of --output-dir
    #[arg(long)]
    pub instance_dir: Option<PathBuf>,

    /// Build static fonts from the instances rather than the masters
    #[arg(short, long)]
    pub interpolate: bool,

    /// Only build instances of this family
    #[arg(long)]
    pub family_name: Option<String>,

    /// Round interpolated instance geometry to integers
    #[arg(long)]
    pub round_instances: bool,

    /// Allow instances outside the masters' range
    #[arg(long)]
    pub allow_extrapolation: bool,

    /// Don't remove overlaps
    #[arg(long)]
    pub keep_overlaps: bool,

    #[arg(long, default_value = PATHOPS, value_parser = [PATHOPS, BOOLEAN_OPERATIONS])]
    pub overlaps_backend: String,

    /// What to do with cubic curves in TrueType outlines
    #[arg(long, default_value = "cu2qu", value_parser = CurvePolicy::NAMES)]
    pub ttf_curves: String,

    /// Maximum distance between a cubic and its quadratic approximation, in em
    #[arg(long, default_value_t = 0.001)]
    pub conversion_error: f64,

    /// Drop on-curve points exactly midway between two off-curve points
    #[arg(long)]
    pub drop_implied_oncurves: bool,

    /// Don't fix contour direction
    #[arg(long)]
    pub keep_direction: bool,

    /// Make every component reference a simple glyph
    #[arg(long)]
    pub flatten_components: bool,

    #[arg(long)]
    pub no_auto_use_my_metrics: bool,

    /// Check masters are interpolation compatible even for static fonts
    #[arg(long, overrides_with = "no_check_compatibility")]
    pub check_compatibility: bool,

    #[arg(long)]
    pub no_check_compatibility: bool,

    /// Stop at the first glyph whose curves can't be converted within tolerance
    #[arg(long)]
    pub fail_fast: bool,

    /// 0 leaves charstrings alone, 1 specializes them, 2 also subroutinizes
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub optimize_cff: Option<u8>,

    /// Deprecated, use --optimize-cff 2
    #[arg(long, overrides_with = "no_subroutinize")]
    pub subroutinize: bool,

    /// Deprecated, use --optimize-cff 1
    #[arg(long)]
    pub no_subroutinize: bool,

    #[arg(long, value_parser = [COMPREFFOR, CFFSUBR])]
    pub subroutinizer: Option<String>,

    /// Snap CFF coordinates to integers when this close; 0 disables
    #[arg(long, default_value_t = 0.5)]
    pub cff_round_tolerance: f64,

    /// Keep every gvar delta rather than letting IUP infer some
    #[arg(long)]
    pub no_optimize_gvar: bool,

    /// Feature writers to run, in order; `...` is the defaults, `None` runs nothing
    #[arg(long)]
    pub feature_writer: Vec<String>,

    #[arg(long = "no-generate-GDEF")]
    pub no_generate_gdef: bool,

    /// Interpolate the per master layout binaries in this directory instead of generating rules
    #[arg(long)]
    pub interpolate_binary_layout: Option<PathBuf>,

    /// Layout rules in MTI format, replacing those of the source
    #[arg(long)]
    pub mti_source: Option<PathBuf>,

    /// Write the final layout rules here
    #[arg(long)]
    pub debug_feature_file: Option<PathBuf>,

    #[arg(long, overrides_with = "no_production_names")]
    pub production_names: bool,

    #[arg(long)]
    pub no_production_names: bool,

    /// Drop glyphs that aren't exported
    #[arg(long, overrides_with = "no_subset")]
    pub subset: bool,

    #[arg(long)]
    pub no_subset: bool,

    /// Glyph filters to run, in order; `...` is the defaults, `None` runs nothing
    #[arg(long)]
    pub filter: Vec<String>,

    /// Glyph names, production names, categories and codepoints
    #[arg(long)]
    pub glyph_data: Option<PathBuf>,

    /// Autohint TrueType fonts, optionally passing these arguments along
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pub autohint: Option<String>,

    #[arg(long)]
    pub no_autohint: bool,

    /// Log how long each stage took
    #[arg(long)]
    pub timing: bool,

    /// Log level filter, such as info or debug; RUST_LOG wins when set
    #[arg(long)]
    pub verbose: Option<String>,
}

impl Args {
    /// Collect the switches stages read into a [`Flags`] object.
    pub fn flags(&self) -> Flags {
        let mut flags = Flags::default();

        flags.set(Flags::REMOVE_OVERLAPS, !self.keep_overlaps);
        flags.set(Flags::KEEP_DIRECTION, self.keep_direction);
        flags.set(Flags::FLATTEN_COMPONENTS, self.flatten_components);
        flags.set(Flags::AUTO_USE_MY_METRICS, !self.no_auto_use_my_metrics);
        flags.set(Flags::DROP_IMPLIED_ONCURVES, self.drop_implied_oncurves);
        flags.set(Flags::FAIL_FAST, self.fail_fast);
        flags.set(Flags::PRODUCTION_NAMES, !self.no_production_names);
        flags.set(Flags::SUBSET, !self.no_subset);
        flags.set(Flags::CHECK_COMPATIBILITY, self.check_compatibility);
        flags.set(Flags::OPTIMIZE_GVAR, !self.no_optimize_gvar);
        flags.set(Flags::GENERATE_GDEF, !self.no_generate_gdef);
        flags.set(Flags::ROUND_INSTANCES, self.round_instances);
        flags.set(Flags::ALLOW_EXTRAPOLATION, self.allow_extrapolation);

        flags
    }

    /// Arguments for ttfautohint, or None if we shouldn't run it.
    pub fn autohint_args(&self) -> Option<Vec<String>> {
        if self.no_autohint {
            return None;
        }
        self.autohint
            .as_ref()
            .map(|raw| raw.split_whitespace().map(String::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use kiln_be::cff::Flavor;
    use kiln_ir::orchestration::Flags;
    use pretty_assertions::assert_eq;

    use super::{Args, Target};

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(["kiln", "font.yaml"].iter().chain(args)).unwrap()
    }

    #[test]
    fn defaults_match_fontmake() {
        let args = parse(&[]);
        assert_eq!(vec![Target::Ttf], args.output);
        assert_eq!(Flags::default(), args.flags());
        assert_eq!(None, args.autohint_args());
    }

    #[test]
    fn negations() {
        let flags = parse(&[
            "--keep-overlaps",
            "--no-production-names",
            "--no-subset",
            "--no-optimize-gvar",
            "--no-generate-GDEF",
            "--no-auto-use-my-metrics",
        ])
        .flags();
        assert_eq!(Flags::empty(), flags);
    }

    #[test]
    fn last_of_a_pair_wins() {
        let args = parse(&["--no-subset", "--subset"]);
        assert!(args.flags().contains(Flags::SUBSET));
        let args = parse(&["--check-compatibility", "--no-check-compatibility"]);
        assert!(!args.flags().contains(Flags::CHECK_COMPATIBILITY));
    }

    #[test]
    fn several_outputs() {
        let args = parse(&["-o", "otf", "-o", "otf-cff2", "-o", "variable"]);
        assert_eq!(vec![Target::Otf, Target::OtfCff2, Target::Variable], args.output);
        assert_eq!(
            vec!["otf", "otf", "ttf"],
            args.output.iter().map(|t| t.extension()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn variable_cff2() {
        let args = parse(&["-o", "variable-cff2"]);
        let target = args.output[0];
        assert_eq!(Target::VariableCff2, target);
        assert!(target.is_variable());
        assert_eq!(Some(Flavor::Cff2), target.cff_flavor());
        assert_eq!("otf", target.extension());
        assert_eq!("variable-cff2", target.to_string());
    }

    #[test]
    fn master_and_instance_dirs() {
        let args = parse(&["--master-dir", "m", "--instance-dir", "i"]);
        assert_eq!(Some(PathBuf::from("m")), args.master_dir);
        assert_eq!(Some(PathBuf::from("i")), args.instance_dir);
        assert_eq!(None, parse(&[]).master_dir);
    }

    #[test]
    fn repeated_stage_lists() {
        let args = parse(&[
            "--feature-writer",
            "MarkFeatureWriter",
            "--feature-writer",
            "...",
            "--filter",
            "None",
        ]);
        assert_eq!(vec!["MarkFeatureWriter", "..."], args.feature_writer);
        assert_eq!(vec!["None"], args.filter);
    }

    #[test]
    fn autohint_with_and_without_args() {
        assert_eq!(Some(Vec::<String>::new()), parse(&["--autohint"]).autohint_args());
        assert_eq!(
            Some(vec!["-D".to_string(), "latn".to_string()]),
            parse(&["--autohint=-D latn"]).autohint_args()
        );
        assert_eq!(None, parse(&["--autohint", "--no-autohint"]).autohint_args());
    }

    #[test]
    fn optimize_cff_is_bounded() {
        assert_eq!(Some(1), parse(&["--optimize-cff", "1"]).optimize_cff);
        assert!(Args::try_parse_from(["kiln", "font.yaml", "--optimize-cff", "3"]).is_err());
    }

    #[test]
    fn unknown_backend_names_are_rejected() {
        assert!(Args::try_parse_from(["kiln", "font.yaml", "--subroutinizer", "tx"]).is_err());
        assert!(Args::try_parse_from(["kiln", "font.yaml", "--ttf-curves", "bezier"]).is_err());
    }
}
