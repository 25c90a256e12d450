//! CFF and CFF2 outlines: charstrings, specialization, subroutinization.

use std::fmt::Display;

use kiln_ir::{
    components::resolved_contours,
    ir::{Designspace, Master},
};
use kiln_types::{
    stages::{Registry, StageSpec},
    types::GlyphName,
};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, GlyphProblem};

use self::{
    blend::{CharStringBlender, VariationStore},
    charstring::{execute_blended, CharString},
    specialize::specialize,
    subroutinize::{Cffsubr, Compreffor, Subroutinized, Subroutinizer, CFFSUBR, COMPREFFOR},
};

pub mod blend;
pub mod charstring;
pub mod specialize;
pub mod subroutinize;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    Cff,
    Cff2,
}

impl Flavor {
    /// Operands an interpreter must be able to hold.
    pub fn max_stack(self) -> usize {
        match self {
            Flavor::Cff => 48,
            Flavor::Cff2 => 513,
        }
    }
}

impl Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flavor::Cff => f.write_str("CFF"),
            Flavor::Cff2 => f.write_str("CFF2"),
        }
    }
}

fn cffsubr() -> Box<dyn Subroutinizer> {
    Box::new(Cffsubr)
}

fn compreffor() -> Box<dyn Subroutinizer> {
    Box::new(Compreffor)
}

pub fn subroutinizers() -> Registry<Box<dyn Subroutinizer>> {
    Registry::new("subroutinizer")
        .register(CFFSUBR, cffsubr, true)
        .register(COMPREFFOR, compreffor, false)
}

/// How hard to work on charstrings.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum OptimizeLevel {
    None,
    Specialize,
    #[default]
    Subroutinize,
}

impl TryFrom<u8> for OptimizeLevel {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OptimizeLevel::None),
            1 => Ok(OptimizeLevel::Specialize),
            2 => Ok(OptimizeLevel::Subroutinize),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CffOptions {
    pub flavor: Flavor,
    pub level: OptimizeLevel,
    /// None picks the default backend
    pub subroutinizer: Option<String>,
    pub round_tolerance: f64,
}

impl Default for CffOptions {
    fn default() -> Self {
        CffOptions {
            flavor: Flavor::Cff,
            level: OptimizeLevel::default(),
            subroutinizer: None,
            round_tolerance: 0.5,
        }
    }
}

/// Charstrings in glyph order, ready for a CFF or CFF2 table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CffOutlines {
    pub flavor: Flavor,
    pub glyph_order: Vec<GlyphName>,
    pub charstrings: Subroutinized,
    /// What blend deltas refer to, variable CFF2 only
    pub variations: Option<VariationStore>,
}

#[derive(Debug)]
pub struct CffOptimizer {
    options: CffOptions,
    subroutinizer: Box<dyn Subroutinizer>,
}

impl CffOptimizer {
    pub fn new(options: CffOptions) -> Result<CffOptimizer, Error> {
        let spec = match &options.subroutinizer {
            Some(name) => StageSpec::Named(name.clone()),
            None => StageSpec::Defaults,
        };
        let subroutinizer = subroutinizers()
            .resolve(&[spec])?
            .into_iter()
            .next()
            .unwrap_or_else(cffsubr);
        if !subroutinizer.supports(options.flavor) {
            return Err(Error::UnsupportedFlavor {
                subroutinizer: subroutinizer.name(),
                flavor: options.flavor,
            });
        }
        Ok(CffOptimizer {
            options,
            subroutinizer,
        })
    }

    /// Generic charstrings for every glyph, components decomposed.
    pub fn build_charstrings(
        &self,
        master: &Master,
        glyph_order: &[GlyphName],
    ) -> Result<Vec<CharString>, Error> {
        let results: Vec<_> = glyph_order
            .par_iter()
            .map(|glyph_name| {
                resolved_contours(master, glyph_name).map(|contours| {
                    CharString::from_contours(
                        &contours,
                        self.options.round_tolerance,
                        self.options.flavor,
                    )
                })
            })
            .collect();
        let mut charstrings = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(cs) => charstrings.push(cs),
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            return Err(kiln_ir::error::Error::GlyphErrors(errors).into());
        }
        Ok(charstrings)
    }

    pub fn optimize(
        &self,
        master: &Master,
        glyph_order: &[GlyphName],
    ) -> Result<CffOutlines, Error> {
        let generic = self.build_charstrings(master, glyph_order)?;
        let charstrings = self.optimize_charstrings(generic, glyph_order, &[Vec::new()])?;
        Ok(CffOutlines {
            flavor: self.options.flavor,
            glyph_order: glyph_order.to_vec(),
            charstrings,
            variations: None,
        })
    }

    /// One set of CFF2 charstrings for every master, differences carried by blend.
    pub fn optimize_variable(
        &self,
        designspace: &Designspace,
        masters: &[Master],
        glyph_order: &[GlyphName],
    ) -> Result<CffOutlines, Error> {
        if self.options.flavor != Flavor::Cff2 {
            return Err(Error::NotVariable(self.options.flavor));
        }
        let blender = CharStringBlender::new(designspace, self.options.round_tolerance)?;
        let (generic, store) = blender.blend(masters, glyph_order)?;
        // the optimized program must match at the default and at every master
        let mut checks = vec![store.default_scalars()];
        checks.extend(
            blender
                .master_locations()
                .iter()
                .map(|loc| store.scalars_at(blender.axes(), loc)),
        );
        let charstrings = self.optimize_charstrings(generic, glyph_order, &checks)?;
        Ok(CffOutlines {
            flavor: Flavor::Cff2,
            glyph_order: glyph_order.to_vec(),
            charstrings,
            variations: Some(store),
        })
    }

    /// Specialize and subroutinize per the optimization level, checking each step
    /// draws the same at every one of `checks`.
    fn optimize_charstrings(
        &self,
        generic: Vec<CharString>,
        glyph_order: &[GlyphName],
        checks: &[Vec<Vec<f64>>],
    ) -> Result<Subroutinized, Error> {
        let flavor = self.options.flavor;
        let check = |optimized: &Subroutinized, stage: &'static str| {
            checks.iter().try_for_each(|scalars| {
                verify(&generic, optimized, glyph_order, flavor, stage, scalars)
            })
        };

        let specialized = if self.options.level >= OptimizeLevel::Specialize {
            let specialized: Vec<_> = generic.par_iter().map(|cs| specialize(cs, flavor)).collect();
            check(&Subroutinized::plain(specialized.clone()), "specializer")?;
            specialized
        } else {
            generic.clone()
        };

        let charstrings = if self.options.level >= OptimizeLevel::Subroutinize {
            let before = Subroutinized::plain(specialized.clone()).total_size();
            let result = self.subroutinizer.subroutinize(specialized, flavor);
            check(&result, self.subroutinizer.name())?;
            info!(
                "{} shrank {flavor} charstrings from {before} to {} bytes",
                self.subroutinizer.name(),
                result.total_size()
            );
            result
        } else {
            Subroutinized::plain(specialized)
        };
        debug!("{} {flavor} charstrings at {:?}", glyph_order.len(), self.options.level);
        Ok(charstrings)
    }
}

/// Every optimized charstring must draw exactly what the generic one does.
fn verify(
    generic: &[CharString],
    optimized: &Subroutinized,
    glyph_order: &[GlyphName],
    flavor: Flavor,
    stage: &'static str,
    scalars: &[Vec<f64>],
) -> Result<(), Error> {
    let (global, local) = (optimized.global_bodies(), optimized.local_bodies());
    generic
        .par_iter()
        .zip(optimized.charstrings.par_iter())
        .zip(glyph_order.par_iter())
        .try_for_each(|((before, after), glyph_name)| {
            let expected = execute_blended(before, &[], &[], flavor, scalars).map_err(|e| {
                Error::GlyphError(glyph_name.clone(), GlyphProblem::BadCharString(e))
            })?;
            let actual = execute_blended(after, &global, &local, flavor, scalars).map_err(|e| {
                Error::OptimizationInvariant {
                    stage,
                    glyph_name: glyph_name.clone(),
                    detail: e.to_string(),
                }
            })?;
            if expected != actual {
                return Err(Error::OptimizationInvariant {
                    stage,
                    glyph_name: glyph_name.clone(),
                    detail: format!("drew {} commands, expected {}", actual.len(), expected.len()),
                });
            }
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use kiln_ir::{
        ir::{Component, Contour, ContourPoint, Designspace, Glyph, Master},
        layout::LayoutRules,
    };
    use kiln_types::{
        coords::DesignLocation,
        types::{Axis, GlyphName, Tag},
    };
    use kurbo::Affine;
    use more_asserts::assert_lt;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::error::Error;

    use super::{
        charstring::{execute, execute_blended, Operator, Token},
        CffOptimizer, CffOptions, Flavor, OptimizeLevel,
    };

    fn square(x: f64, y: f64, size: f64) -> Contour {
        Contour::new(vec![
            ContourPoint::on(x, y),
            ContourPoint::on(x + size, y),
            ContourPoint::on(x + size, y + size),
            ContourPoint::on(x, y + size),
        ])
    }

    fn bowl(x: f64) -> Contour {
        Contour::new(vec![
            ContourPoint::on(x, 0.0),
            ContourPoint::cubic(x + 10.0, 0.0),
            ContourPoint::cubic(x + 200.0, 50.0),
            ContourPoint::on(x + 250.0, 300.0),
            ContourPoint::cubic(x + 200.0, 550.0),
            ContourPoint::cubic(x + 10.0, 600.0),
            ContourPoint::on(x, 600.0),
        ])
    }

    fn master() -> Master {
        let mut master = Master::new("Regular", DesignLocation::new());
        for i in 0..12 {
            let mut glyph = Glyph::new(format!("g{i}"));
            glyph.width = 600.0;
            glyph.contours = vec![square(i as f64 * 3.0, 17.0, 80.0 + i as f64), bowl(100.0)];
            master.add_glyph(glyph);
        }
        let mut composite = Glyph::new("comp");
        composite.components = vec![Component::new("g1", Affine::translate((10.0, 20.0)))];
        master.add_glyph(composite);
        master
    }

    fn order(master: &Master) -> Vec<GlyphName> {
        master.glyphs.keys().cloned().collect()
    }

    fn options(flavor: Flavor, level: OptimizeLevel, subroutinizer: Option<&str>) -> CffOptions {
        CffOptions {
            flavor,
            level,
            subroutinizer: subroutinizer.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn compreffor_cannot_write_cff2() {
        let err = CffOptimizer::new(options(
            Flavor::Cff2,
            OptimizeLevel::Subroutinize,
            Some("compreffor"),
        ))
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFlavor { flavor: Flavor::Cff2, .. }), "{err}");
    }

    #[test]
    fn unknown_subroutinizer() {
        let err = CffOptimizer::new(options(Flavor::Cff, OptimizeLevel::Subroutinize, Some("nope")))
            .unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable(..)), "{err}");
    }

    #[test]
    fn level_zero_is_generic() {
        let master = master();
        let optimizer = CffOptimizer::new(options(Flavor::Cff, OptimizeLevel::None, None)).unwrap();
        let outlines = optimizer.optimize(&master, &order(&master)).unwrap();
        assert_eq!(
            optimizer.build_charstrings(&master, &order(&master)).unwrap(),
            outlines.charstrings.charstrings
        );
    }

    #[test]
    fn composites_are_decomposed() {
        let master = master();
        let optimizer =
            CffOptimizer::new(options(Flavor::Cff2, OptimizeLevel::None, None)).unwrap();
        let charstrings = optimizer.build_charstrings(&master, &order(&master)).unwrap();
        let path = execute(charstrings.last().unwrap(), &[], &[], Flavor::Cff2).unwrap();
        assert_eq!(
            execute(&charstrings[1], &[], &[], Flavor::Cff2).unwrap().len(),
            path.len()
        );
    }

    #[test]
    fn missing_component_is_reported() {
        let mut master = master();
        let mut bad = Glyph::new("bad");
        bad.components = vec![Component::new("nope", Affine::IDENTITY)];
        master.add_glyph(bad);
        let err = CffOptimizer::new(CffOptions::default())
            .unwrap()
            .build_charstrings(&master, &order(&master))
            .unwrap_err();
        assert!(err.to_string().contains("nope"), "{err}");
    }

    #[rstest]
    #[case(Flavor::Cff, None)]
    #[case(Flavor::Cff, Some("compreffor"))]
    #[case(Flavor::Cff2, Some("cffsubr"))]
    fn subroutinizing_shrinks(#[case] flavor: Flavor, #[case] subroutinizer: Option<&str>) {
        let master = master();
        let glyph_order = order(&master);
        let specialized = CffOptimizer::new(options(flavor, OptimizeLevel::Specialize, None))
            .unwrap()
            .optimize(&master, &glyph_order)
            .unwrap();
        let subroutinized =
            CffOptimizer::new(options(flavor, OptimizeLevel::Subroutinize, subroutinizer))
                .unwrap()
                .optimize(&master, &glyph_order)
                .unwrap();

        assert!(!subroutinized.charstrings.global_subrs.is_empty());
        assert_lt!(
            subroutinized.charstrings.total_size(),
            specialized.charstrings.total_size()
        );
        let has_return = subroutinized
            .charstrings
            .global_subrs
            .iter()
            .all(|s| s.body.tokens().last() == Some(&Token::Operator(Operator::Return)));
        assert_eq!(flavor == Flavor::Cff, has_return);
    }

    fn variable() -> Designspace {
        let mut bold = master();
        bold.name = "Bold".to_string();
        bold.location = DesignLocation::for_pos(&[("Weight", 700.0)]);
        for glyph in bold.glyphs.values_mut() {
            for contour in glyph.contours.iter_mut() {
                for point in contour.0.iter_mut() {
                    point.x *= 1.5;
                }
            }
        }
        let mut regular = master();
        regular.location = DesignLocation::for_pos(&[("Weight", 400.0)]);
        Designspace {
            family_name: "Test".to_string(),
            units_per_em: 1000,
            axes: vec![Axis::new("Weight", Tag::new(b"wght"), 400.0, 400.0, 700.0, Vec::new())],
            masters: vec![regular, bold],
            instances: Vec::new(),
            glyph_order: None,
            layout: LayoutRules::default(),
        }
    }

    #[rstest]
    #[case(OptimizeLevel::None)]
    #[case(OptimizeLevel::Specialize)]
    #[case(OptimizeLevel::Subroutinize)]
    fn variable_cff2_draws_every_master(#[case] level: OptimizeLevel) {
        let designspace = variable();
        let glyph_order = order(&designspace.masters[0]);
        let outlines = CffOptimizer::new(options(Flavor::Cff2, level, None))
            .unwrap()
            .optimize_variable(&designspace, &designspace.masters, &glyph_order)
            .unwrap();
        let store = outlines.variations.as_ref().unwrap();
        assert_eq!(1, store.regions.len());

        let bold = DesignLocation::for_pos(&[("Weight", 700.0)])
            .to_normalized(&designspace.axes)
            .unwrap();
        let scalars = store.scalars_at(&designspace.axes, &bold);
        let charstrings = &outlines.charstrings;
        let (global, local) = (charstrings.global_bodies(), charstrings.local_bodies());
        let static_bold = CffOptimizer::new(options(Flavor::Cff2, OptimizeLevel::None, None))
            .unwrap()
            .build_charstrings(&designspace.masters[1], &glyph_order)
            .unwrap();
        for (blended, expected) in charstrings.charstrings.iter().zip(static_bold.iter()) {
            assert_eq!(
                execute(expected, &[], &[], Flavor::Cff2).unwrap(),
                execute_blended(blended, &global, &local, Flavor::Cff2, &scalars).unwrap()
            );
        }
    }

    #[test]
    fn only_cff2_varies() {
        let designspace = variable();
        let glyph_order = order(&designspace.masters[0]);
        let err = CffOptimizer::new(options(Flavor::Cff, OptimizeLevel::None, None))
            .unwrap()
            .optimize_variable(&designspace, &designspace.masters, &glyph_order)
            .unwrap_err();
        assert!(matches!(err, Error::NotVariable(Flavor::Cff)), "{err}");
    }
}
