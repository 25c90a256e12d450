//! Runs the stages for every font a build asks for.
//!
//! Fonts are independent: each one gets its own copy of the masters it needs and
//! runs on the rayon pool, reporting back over a channel. One font failing never
//! stops or touches another.

use std::{
    collections::{BTreeMap, BTreeSet},
    panic::AssertUnwindSafe,
    path::PathBuf,
};

use crossbeam_channel::unbounded;
use indexmap::IndexSet;
use kiln_be::{
    cff::CffOptimizer,
    features::{LayoutFeatureGenerator, LayoutInput},
    font::{BincodeWriter, CompiledFont, FontVariations, Outlines, OutputWriter},
    glyf::GlyfGlyph,
    gvar::VariableFontAssembler,
};
use kiln_ir::{
    compatibility::CompatibilityChecker,
    filters,
    glyph_data::GlyphData,
    instances::{instance_location, interpolate_instance, select_instances},
    ir::{Designspace, Instance, Master},
    mti::load_mti,
    names::{subset_non_exported, ProductionNames},
    normalize::{ContourNormalizer, NormalizeOptions, OutlineFormat},
    orchestration::Flags,
    overlaps,
    source::source_for,
};
use kiln_types::{coords::NormalizedLocation, types::GlyphName};
use log::{debug, error, info, log_enabled, warn};
use parking_lot::Mutex;
use write_fonts::OtRound;

use crate::{
    args::Target,
    autohint::Autohinter,
    timing::{JobTimer, StageId},
    Config, Error,
};

/// Where the glyphs of a font come from.
#[derive(Debug, Clone, PartialEq)]
pub enum FontSource {
    /// One master, by index
    Master(usize),
    Instance(Instance),
    /// Every master
    Variable,
}

/// One font to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct FontJob {
    pub target: Target,
    pub source: FontSource,
    /// Family and style, as used in file names
    pub name: String,
    pub style_name: String,
}

fn file_safe(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

// taken from std:
// <https://github.com/rust-lang/rust/blob/d5a82bbd26e1ad8b7401f6a718a9c57c96905483/library/std/src/panicking.rs#L247-L253>
fn get_panic_message(msg: Box<dyn std::any::Any + Send + 'static>) -> String {
    match msg.downcast_ref::<&'static str>() {
        Some(s) => s.to_string(),
        None => match msg.downcast_ref::<String>() {
            Some(s) => s.to_owned(),
            None => "Box<dyn Any>".to_owned(),
        },
    }
}

#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    designspace: Designspace,
    glyph_data: GlyphData,
    timer: Mutex<JobTimer>,
}

impl Pipeline {
    /// Load the source and everything that goes with it, then preprocess.
    pub fn load(config: Config) -> Result<Pipeline, Error> {
        let args = &config.args;
        if !args.source.exists() {
            return Err(Error::FileExpected(args.source.clone()));
        }
        let mut designspace = source_for(&args.source)?.load()?;
        if let Some(mti) = &args.mti_source {
            designspace.layout = load_mti(mti)?;
            info!("Layout rules from {mti:?} replace those of the source");
        }
        let glyph_data = match &args.glyph_data {
            Some(path) => GlyphData::load(path)?,
            None => GlyphData::default(),
        };
        config.validate_source(&designspace)?;

        if config.flags().contains(Flags::SUBSET) {
            let dropped = subset_non_exported(&mut designspace)?;
            if !dropped.is_empty() {
                info!("Dropped {} glyphs that aren't exported", dropped.len());
            }
        }
        // variable fonts check for themselves, fatally
        if config.flags().contains(Flags::CHECK_COMPATIBILITY)
            && !config.has_variable_target()
            && designspace.is_variable()
        {
            CompatibilityChecker.check(&designspace.masters).log_warnings();
        }

        Ok(Pipeline {
            config,
            designspace,
            glyph_data,
            timer: Mutex::new(JobTimer::new()),
        })
    }

    pub fn designspace(&self) -> &Designspace {
        &self.designspace
    }

    /// The fonts to build, in a stable order.
    pub fn jobs(&self) -> Vec<FontJob> {
        let family = file_safe(&self.designspace.family_name);
        let mut targets: IndexSet<Target> = self.config.args.output.iter().copied().collect();
        let mut jobs = Vec::new();
        for target in targets.drain(..) {
            if target.is_variable() {
                jobs.push(FontJob {
                    target,
                    source: FontSource::Variable,
                    name: format!("{family}-VF"),
                    style_name: self
                        .designspace
                        .default_master()
                        .map(|m| m.name.clone())
                        .unwrap_or_default(),
                });
            } else if self.config.args.interpolate {
                let family_name = self.config.args.family_name.as_deref();
                for instance in select_instances(&self.designspace, family_name) {
                    let style = instance
                        .style_name
                        .clone()
                        .unwrap_or_else(|| instance.name.clone());
                    let family = instance
                        .family_name
                        .as_deref()
                        .map(file_safe)
                        .unwrap_or_else(|| family.clone());
                    jobs.push(FontJob {
                        target,
                        source: FontSource::Instance(instance.clone()),
                        name: format!("{family}-{}", file_safe(&style)),
                        style_name: style,
                    });
                }
            } else {
                for (i, master) in self.designspace.masters.iter().enumerate() {
                    jobs.push(FontJob {
                        target,
                        source: FontSource::Master(i),
                        name: format!("{family}-{}", file_safe(&master.name)),
                        style_name: master.name.clone(),
                    });
                }
            }
        }
        jobs
    }

    /// Build every font; returns the files written.
    pub fn run(&self) -> Result<Vec<PathBuf>, Error> {
        let jobs = self.jobs();
        if jobs.is_empty() {
            warn!("Nothing to build");
            return Ok(Vec::new());
        }
        info!("Building {} fonts", jobs.len());
        let several = jobs.len() > 1;

        let (send, recv) = unbounded::<(String, Result<PathBuf, Error>)>();
        rayon::in_place_scope(|scope| {
            for job in jobs.iter() {
                let send = send.clone();
                scope.spawn(move |_| {
                    // An unwinding build shouldn't take the other fonts down with it.
                    let result = match std::panic::catch_unwind(AssertUnwindSafe(|| {
                        self.build(job, several)
                    })) {
                        Ok(result) => result,
                        Err(err) => Err(Error::Panic(get_panic_message(err))),
                    };
                    if let Err(e) = send.send((job.name.clone(), result)) {
                        log::error!("Unable to report result for {}: {e}", job.name);
                    }
                });
            }
        });
        drop(send);

        let mut written = Vec::new();
        let mut failures: Vec<(String, Error)> = Vec::new();
        for (name, result) in recv.iter() {
            match result {
                Ok(path) => written.push(path),
                Err(e) => {
                    error!("{name} failed: {e}");
                    failures.push((name, e));
                }
            }
        }
        if self.config.args.timing || log_enabled!(log::Level::Debug) {
            info!("{}", self.timer.lock().report());
        }
        written.sort();
        match failures.len() {
            0 => Ok(written),
            1 if jobs.len() == 1 => Err(failures.remove(0).1),
            _ => {
                let mut failed: Vec<_> = failures.into_iter().map(|(name, _)| name).collect();
                failed.sort();
                Err(Error::FontsFailed {
                    failed,
                    total: jobs.len(),
                })
            }
        }
    }

    fn timed<T>(
        &self,
        font: &str,
        stage: &'static str,
        work: impl FnOnce() -> Result<T, Error>,
    ) -> Result<T, Error> {
        let timer = self
            .timer
            .lock()
            .create_timer(StageId::new(font, stage))
            .run();
        debug!("{font}: {stage}");
        let result = work();
        self.timer.lock().add(timer.complete());
        result
    }

    /// The masters a font is built from, which of them is the default, and where the font sits.
    fn masters_for(
        &self,
        job: &FontJob,
    ) -> Result<(Vec<Master>, usize, NormalizedLocation), Error> {
        let designspace = &self.designspace;
        Ok(match &job.source {
            FontSource::Master(i) => {
                let location = designspace.masters[*i]
                    .location
                    .to_normalized(&designspace.axes)
                    .map_err(kiln_ir::error::Error::from)?;
                (vec![designspace.masters[*i].clone()], 0, location)
            }
            FontSource::Instance(instance) => {
                let options = self.config.instance_options();
                let location = instance_location(designspace, instance, options.extrapolate)?;
                let master = interpolate_instance(designspace, instance, options)?;
                (vec![master], 0, location)
            }
            FontSource::Variable => (
                designspace.masters.clone(),
                designspace.default_master_idx()?,
                NormalizedLocation::new(),
            ),
        })
    }

    /// The order of the source if it has one, then anything it missed; `.notdef` first.
    fn glyph_order(&self, master: &Master) -> Vec<GlyphName> {
        let mut order: IndexSet<GlyphName> = IndexSet::new();
        if master.glyphs.contains_key(GlyphName::NOTDEF.as_str()) {
            order.insert(GlyphName::NOTDEF);
        } else {
            warn!("'{}' has no {}", master.name, GlyphName::NOTDEF);
        }
        if let Some(source_order) = &self.designspace.glyph_order {
            order.extend(
                source_order
                    .iter()
                    .filter(|g| master.glyphs.contains_key(g.as_str()))
                    .cloned(),
            );
        }
        order.extend(master.glyphs.keys().cloned());
        order.into_iter().collect()
    }

    fn build(&self, job: &FontJob, several: bool) -> Result<PathBuf, Error> {
        let config = &self.config;
        let flags = config.flags();
        let name = job.name.as_str();
        let variable = job.target.is_variable();
        info!("Building {name} ({})", job.target);

        let (mut masters, default_idx, location) =
            self.timed(name, "masters", || self.masters_for(job))?;

        self.timed(name, "filters", || {
            for filter in filters::registry(job.target.is_cff()).resolve(&config.filters())? {
                debug!("{name}: filter {}", filter.name());
                filter
                    .apply(&mut masters, default_idx)
                    .map_err(kiln_ir::error::Error::GlyphErrors)?;
            }
            Ok(())
        })?;

        if variable {
            self.timed(name, "compatibility", || {
                let report = CompatibilityChecker.check(&masters);
                for advisory in report.advisories.iter() {
                    warn!("{name}: {advisory}");
                }
                Ok(report.into_result()?)
            })?;
        }

        let format = match job.target.cff_flavor() {
            Some(_) => OutlineFormat::PostScript,
            None => OutlineFormat::TrueType {
                policy: config.curve_policy()?,
                tolerance: config.args.conversion_error * self.designspace.units_per_em as f64,
            },
        };
        let normalizer = ContourNormalizer::new(NormalizeOptions {
            flags,
            overlaps: overlaps::backend(&config.args.overlaps_backend)?,
            format,
            variable,
        });
        let report = self.timed(name, "normalize", || {
            Ok(normalizer.run(&mut masters, default_idx)?)
        })?;

        let default = &masters[default_idx];
        let glyph_order = self.glyph_order(default);
        let master_locations = self.designspace.master_locations()?;
        let generator =
            LayoutFeatureGenerator::new(config.layout_options(several.then_some(name)))?;
        let layout = self.timed(name, "layout", || {
            Ok(generator.generate(&LayoutInput {
                reference: default,
                masters: if variable {
                    &masters
                } else {
                    &self.designspace.masters
                },
                master_locations: &master_locations,
                axes: &self.designspace.axes,
                location,
                authored: &self.designspace.layout,
                glyph_data: &self.glyph_data,
                variable,
            })?)
        })?;

        let outlines = match job.target.cff_flavor() {
            Some(flavor) => {
                let optimizer = CffOptimizer::new(config.cff_options(flavor))?;
                Outlines::Cff(self.timed(name, "cff", || {
                    Ok(if variable {
                        optimizer.optimize_variable(&self.designspace, &masters, &glyph_order)?
                    } else {
                        optimizer.optimize(default, &glyph_order)?
                    })
                })?)
            }
            None => Outlines::Glyf(self.timed(name, "glyf", || {
                glyf_glyphs(default, &glyph_order, &report.overlaps_kept)
            })?),
        };

        // blended charstrings carry CFF2 variations, only the axes remain
        let variations = if variable && job.target.is_cff() {
            Some(FontVariations {
                axes: self.designspace.axes.clone(),
                glyphs: Vec::new(),
            })
        } else if variable {
            let assembler = VariableFontAssembler::new(
                &self.designspace,
                flags.contains(Flags::OPTIMIZE_GVAR),
            )?;
            let glyphs = self.timed(name, "gvar", || {
                Ok(assembler.assemble(&masters, &glyph_order)?)
            })?;
            Some(FontVariations {
                axes: self.designspace.axes.clone(),
                glyphs,
            })
        } else {
            None
        };

        let mut font = CompiledFont {
            family_name: match &job.source {
                FontSource::Instance(instance) => instance
                    .family_name
                    .clone()
                    .unwrap_or_else(|| self.designspace.family_name.clone()),
                _ => self.designspace.family_name.clone(),
            },
            style_name: job.style_name.clone(),
            units_per_em: self.designspace.units_per_em,
            advances: advances(default, &glyph_order),
            cmap: cmap(default, &glyph_order),
            glyph_order,
            outlines,
            variations,
            layout,
        };

        if flags.contains(Flags::PRODUCTION_NAMES) {
            let names = ProductionNames::new(default, &self.glyph_data);
            self.timed(name, "rename", || {
                font.rename_glyphs(|g| names.get(g));
                Ok(())
            })?;
        }

        let from_instances = matches!(job.source, FontSource::Instance(..));
        let path = config
            .output_dir(job.target, from_instances)
            .join(format!("{name}.{}", job.target.extension()));
        self.timed(name, "write", || Ok(BincodeWriter.write(font, &path)?))?;

        if let Some(args) = config.autohint().filter(|_| !job.target.is_cff()) {
            self.timed(name, "autohint", || Autohinter::from_env(args).hint(&path))?;
        }
        Ok(path)
    }
}

fn glyf_glyphs(
    master: &Master,
    glyph_order: &[GlyphName],
    overlapping: &BTreeSet<GlyphName>,
) -> Result<Vec<GlyfGlyph>, Error> {
    let mut glyphs = Vec::with_capacity(glyph_order.len());
    let mut errors = Vec::new();
    for glyph_name in glyph_order {
        let Some(glyph) = master.glyph(glyph_name.as_str()) else {
            glyphs.push(GlyfGlyph::Empty);
            continue;
        };
        match GlyfGlyph::from_ir(glyph) {
            Ok(GlyfGlyph::Simple(mut simple)) => {
                simple.overlap_simple = overlapping.contains(glyph_name);
                glyphs.push(GlyfGlyph::Simple(simple));
            }
            Ok(glyph) => glyphs.push(glyph),
            Err(problem) => errors.push((glyph_name.clone(), problem)),
        }
    }
    if !errors.is_empty() {
        return Err(kiln_be::error::Error::GlyphErrors(errors).into());
    }
    Ok(glyphs)
}

fn advances(master: &Master, glyph_order: &[GlyphName]) -> Vec<u16> {
    glyph_order
        .iter()
        .map(|name| {
            master
                .glyph(name.as_str())
                .map(|g| OtRound::<u16>::ot_round(g.width.max(0.0)))
                .unwrap_or_default()
        })
        .collect()
}

/// First glyph in glyph order wins a codepoint.
fn cmap(master: &Master, glyph_order: &[GlyphName]) -> BTreeMap<u32, GlyphName> {
    let mut cmap = BTreeMap::new();
    for name in glyph_order {
        let Some(glyph) = master.glyph(name.as_str()) else {
            continue;
        };
        for codepoint in glyph.codepoints.iter() {
            if let Some(existing) = cmap.get(codepoint) {
                warn!("U+{codepoint:04X} is mapped by {existing} and {name}, keeping {existing}");
                continue;
            }
            cmap.insert(*codepoint, name.clone());
        }
    }
    cmap
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;
    use kiln_be::{
        cff::Flavor,
        font::{read_font, CompiledFont, Outlines},
        glyf::GlyfGlyph,
    };
    use kiln_ir::{
        ir::{Anchor, Component, Contour, ContourPoint, Designspace, Glyph, Instance, Master},
        layout::LayoutRules,
    };
    use kiln_types::{
        coords::DesignLocation,
        types::{Axis, GlyphName, Tag},
    };
    use kurbo::Affine;
    use more_asserts::assert_gt;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    use crate::{Args, Config, Error};

    use super::{FontSource, Pipeline};

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Contour {
        Contour::new(vec![
            ContourPoint::on(x, y),
            ContourPoint::on(x, y + h),
            ContourPoint::on(x + w, y + h),
            ContourPoint::on(x + w, y),
        ])
    }

    fn master(name: &str, wght: f64, stem: f64) -> Master {
        let mut master = Master::new(name, DesignLocation::for_pos(&[("Weight", wght)]));
        let mut notdef = Glyph::new(GlyphName::NOTDEF);
        notdef.width = 500.0;

        let mut a = Glyph::new("a");
        a.codepoints = vec![0x61];
        a.width = 500.0;
        a.contours = vec![rect(50.0, 0.0, stem, 500.0)];
        a.anchors = vec![Anchor::new("top", 250.0, 500.0)];

        let mut acutecomb = Glyph::new("acutecomb");
        acutecomb.codepoints = vec![0x301];
        acutecomb.contours = vec![rect(80.0, 550.0, 40.0, 100.0)];
        acutecomb.anchors = vec![Anchor::new("_top", 100.0, 500.0)];

        let mut aacute = Glyph::new("aacute");
        aacute.codepoints = vec![0xE1];
        aacute.width = 500.0;
        aacute.components = vec![
            Component::new("a", Affine::IDENTITY),
            Component::new("acutecomb", Affine::translate((150.0, 0.0))),
        ];

        // two overlapping bars
        let mut plus = Glyph::new("plus");
        plus.codepoints = vec![0x2B];
        plus.width = 500.0;
        plus.contours = vec![rect(200.0, 100.0, stem, 300.0), rect(100.0, 200.0, 300.0, stem)];

        let mut unused = Glyph::new("a.draft");
        unused.export = false;
        unused.contours = vec![rect(0.0, 0.0, 10.0, 10.0)];

        master
            .add_glyph(notdef)
            .add_glyph(a)
            .add_glyph(acutecomb)
            .add_glyph(aacute)
            .add_glyph(plus)
            .add_glyph(unused);
        master
    }

    fn designspace() -> Designspace {
        Designspace {
            family_name: "Test Sans".to_string(),
            units_per_em: 1000,
            axes: vec![Axis::new("Weight", Tag::new(b"wght"), 400.0, 400.0, 700.0, Vec::new())],
            masters: vec![master("Regular", 400.0, 80.0), master("Bold", 700.0, 160.0)],
            instances: vec![Instance {
                name: "Medium".to_string(),
                family_name: None,
                style_name: Some("Medium".to_string()),
                location: DesignLocation::for_pos(&[("Weight", 550.0)]),
            }],
            glyph_order: None,
            layout: LayoutRules::default(),
        }
    }

    struct TestBuild {
        temp_dir: TempDir,
    }

    impl TestBuild {
        fn new(designspace: &Designspace) -> TestBuild {
            let temp_dir = tempdir().unwrap();
            fs::write(
                temp_dir.path().join("font.yaml"),
                serde_yaml::to_string(designspace).unwrap(),
            )
            .unwrap();
            TestBuild { temp_dir }
        }

        fn pipeline(&self, args: &[&str]) -> Result<Pipeline, Error> {
            let source = self.temp_dir.path().join("font.yaml");
            let out = self.temp_dir.path().join("build");
            let mut all = vec![
                "kiln".to_string(),
                source.to_string_lossy().to_string(),
                "--output-dir".to_string(),
                out.to_string_lossy().to_string(),
            ];
            all.extend(args.iter().map(|a| a.to_string()));
            Pipeline::load(Config::new(Args::try_parse_from(all).unwrap())?)
        }

        fn run(&self, args: &[&str]) -> Result<Vec<std::path::PathBuf>, Error> {
            self.pipeline(args)?.run()
        }

        fn font(&self, relative: &str) -> CompiledFont {
            read_font(&self.temp_dir.path().join("build").join(relative)).unwrap()
        }
    }

    fn glyf(font: &CompiledFont, name: &str) -> GlyfGlyph {
        let Outlines::Glyf(glyphs) = &font.outlines else {
            panic!("not glyf");
        };
        let idx = font.glyph_order.iter().position(|g| *g == name).unwrap();
        glyphs[idx].clone()
    }

    fn contour_count(glyph: &GlyfGlyph) -> usize {
        match glyph {
            GlyfGlyph::Simple(simple) => simple.contours.len(),
            _ => 0,
        }
    }

    #[test]
    fn one_static_font_per_master() {
        let build = TestBuild::new(&designspace());
        let written = build.run(&["--no-production-names"]).unwrap();
        assert_eq!(2, written.len());

        let font = build.font("master_ttf/TestSans-Bold.ttf");
        assert_eq!("Bold", font.style_name);
        assert_eq!(
            vec![".notdef", "a", "acutecomb", "aacute", "plus"],
            font.glyph_order.iter().map(|g| g.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(vec![500, 500, 0, 500, 500], font.advances);
        assert_eq!(Some(&GlyphName::new("aacute")), font.cmap.get(&0xE1));
        assert!(font.variations.is_none());
        assert!(font.layout.rules().lookup("mark_to_base").is_some());
    }

    #[test]
    fn production_names_by_default() {
        let build = TestBuild::new(&designspace());
        build.run(&[]).unwrap();
        let font = build.font("master_ttf/TestSans-Regular.ttf");
        assert_eq!(Some(&GlyphName::new("uni0061")), font.cmap.get(&0x61));
        assert!(font.glyph_order.contains(&GlyphName::new("uni0061")));
    }

    #[test]
    fn overlaps_are_removed_unless_kept() {
        let build = TestBuild::new(&designspace());
        build.run(&["--no-production-names"]).unwrap();
        let font = build.font("master_ttf/TestSans-Regular.ttf");
        assert_eq!(1, contour_count(&glyf(&font, "plus")));

        build.run(&["--no-production-names", "--keep-overlaps"]).unwrap();
        let font = build.font("master_ttf/TestSans-Regular.ttf");
        assert_eq!(2, contour_count(&glyf(&font, "plus")));
    }

    #[test]
    fn variable_font() {
        let build = TestBuild::new(&designspace());
        let written = build.run(&["-o", "variable", "--no-production-names"]).unwrap();
        assert_eq!(1, written.len());

        let font = build.font("variable_ttf/TestSans-VF.ttf");
        let variations = font.variations.as_ref().unwrap();
        assert_eq!(font.glyph_order.len(), variations.glyphs.len());
        let a = variations.glyphs.iter().find(|g| g.glyph_name == "a").unwrap();
        assert_eq!(1, a.variations.len());
        // overlaps stay, flagged
        let GlyfGlyph::Simple(plus) = glyf(&font, "plus") else {
            panic!("plus should be simple");
        };
        assert_eq!(2, plus.contours.len());
        assert!(plus.overlap_simple);
    }

    #[test]
    fn cff_outlines() {
        let build = TestBuild::new(&designspace());
        build.run(&["-o", "otf", "-o", "otf-cff2", "--no-production-names"]).unwrap();
        for (path, flavor) in [
            ("master_otf/TestSans-Regular.otf", Flavor::Cff),
            ("master_otf_cff2/TestSans-Regular.otf", Flavor::Cff2),
        ] {
            let font = build.font(path);
            let Outlines::Cff(cff) = &font.outlines else {
                panic!("{path} should have CFF outlines");
            };
            assert_eq!(flavor, cff.flavor);
            assert_eq!(font.glyph_order.len(), cff.charstrings.charstrings.len());
        }
    }

    #[test]
    fn variable_cff2_font() {
        let build = TestBuild::new(&designspace());
        let written = build.run(&["-o", "variable-cff2", "--no-production-names"]).unwrap();
        assert_eq!(1, written.len());

        let font = build.font("variable_otf/TestSans-VF.otf");
        let Outlines::Cff(cff) = &font.outlines else {
            panic!("variable-cff2 should have CFF outlines");
        };
        assert_eq!(Flavor::Cff2, cff.flavor);
        assert_eq!(font.glyph_order.len(), cff.charstrings.charstrings.len());
        let store = cff.variations.as_ref().unwrap();
        assert_eq!(1, store.regions.len());
        let variations = font.variations.as_ref().unwrap();
        assert_eq!(1, variations.axes.len());
        assert!(variations.glyphs.is_empty());
    }

    #[test]
    fn master_and_instance_dirs() {
        let build = TestBuild::new(&designspace());
        let masters = build.temp_dir.path().join("masters");
        let instances = build.temp_dir.path().join("instances");
        let (m, i) = (masters.to_str().unwrap(), instances.to_str().unwrap());
        build
            .run(&["--master-dir", m, "--instance-dir", i, "--no-production-names"])
            .unwrap();
        build.run(&["-i", "--master-dir", m, "--instance-dir", i]).unwrap();
        build.run(&["-o", "variable", "--master-dir", m]).unwrap();

        assert!(masters.join("TestSans-Regular.ttf").is_file());
        assert!(masters.join("TestSans-Bold.ttf").is_file());
        assert!(masters.join("TestSans-VF.ttf").is_file());
        assert!(instances.join("TestSans-Medium.ttf").is_file());
        assert!(!build.temp_dir.path().join("build").join("master_ttf").exists());
    }

    #[test]
    fn instances() {
        let build = TestBuild::new(&designspace());
        let pipeline = build.pipeline(&["-i", "--no-production-names"]).unwrap();
        let jobs = pipeline.jobs();
        assert_eq!(1, jobs.len());
        assert!(matches!(jobs[0].source, FontSource::Instance(..)));

        pipeline.run().unwrap();
        let font = build.font("instance_ttf/TestSans-Medium.ttf");
        let GlyfGlyph::Simple(a) = glyf(&font, "a") else {
            panic!("a should be simple");
        };
        // stem halfway between 80 and 160
        let xs: Vec<_> = a.contours[0].iter().map(|p| p.x).collect();
        assert_eq!(120, xs.iter().max().unwrap() - xs.iter().min().unwrap());
    }

    #[test]
    fn no_instances_of_another_family() {
        let build = TestBuild::new(&designspace());
        let written = build.run(&["-i", "--family-name", "Other"]).unwrap();
        assert!(written.is_empty());
    }

    #[test]
    fn non_exported_glyphs_are_dropped() {
        let build = TestBuild::new(&designspace());
        build.run(&["--no-production-names"]).unwrap();
        let font = build.font("master_ttf/TestSans-Regular.ttf");
        assert!(!font.glyph_order.contains(&GlyphName::new("a.draft")));

        build.run(&["--no-production-names", "--no-subset"]).unwrap();
        let font = build.font("master_ttf/TestSans-Regular.ttf");
        assert!(font.glyph_order.contains(&GlyphName::new("a.draft")));
    }

    #[test]
    fn incompatible_masters_only_fail_the_variable_font() {
        let mut designspace = designspace();
        let bold = designspace.masters[1].glyphs.get_mut("a").unwrap();
        bold.contours[0].0.pop();
        let build = TestBuild::new(&designspace);

        let err = build.run(&["-o", "variable"]).unwrap_err();
        assert!(
            matches!(err, Error::FontIrError(kiln_ir::error::Error::IncompatibleMasters(..))),
            "{err}"
        );

        let err = build.run(&["-o", "variable", "-o", "ttf"]).unwrap_err();
        let Error::FontsFailed { failed, total } = err else {
            panic!("{err}");
        };
        assert_eq!((vec!["TestSans-VF".to_string()], 3), (failed, total));
        // the static fonts were still written
        build.font("master_ttf/TestSans-Regular.ttf");
        build.font("master_ttf/TestSans-Bold.ttf");
    }

    #[test]
    fn debug_feature_files() {
        let build = TestBuild::new(&designspace());
        let fea = build.temp_dir.path().join("features.fea");
        build
            .run(&["--debug-feature-file", fea.to_str().unwrap(), "--no-production-names"])
            .unwrap();
        let regular =
            fs::read_to_string(build.temp_dir.path().join("features.TestSans-Regular.fea"))
                .unwrap();
        assert!(regular.contains("lookup mark_to_base"), "{regular}");
        assert_gt!(regular.len(), 0);
    }

    #[test]
    fn missing_source() {
        let temp_dir = tempdir().unwrap();
        let source = temp_dir.path().join("nope.yaml");
        let args = Args::try_parse_from(["kiln", source.to_str().unwrap()]).unwrap();
        let err = Pipeline::load(Config::new(args).unwrap()).unwrap_err();
        assert!(matches!(err, Error::FileExpected(..)), "{err}");
    }
}
