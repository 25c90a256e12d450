//! Glyph filters: optional whole-font transformations run before normalization.
//!
//! Configured like feature writers, by name, with `...` standing in for the defaults
//! of the target and `None` turning them all off.

use std::fmt::Debug;

use kiln_types::stages::Registry;
use log::debug;

use crate::{
    components::{decompose_components, flatten_components},
    error::BadGlyph,
    ir::Master,
};

pub const DECOMPOSE_COMPONENTS: &str = "decomposeComponents";
pub const DECOMPOSE_TRANSFORMED_COMPONENTS: &str = "decomposeTransformedComponents";
pub const FLATTEN_COMPONENTS: &str = "flattenComponents";
pub const SORT_CONTOURS: &str = "sortContours";

/// Transforms the glyphs of every master the same way.
pub trait GlyphFilter: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, masters: &mut [Master], default_master: usize) -> Result<(), Vec<BadGlyph>>;
}

fn each_master(
    masters: &mut [Master],
    op: impl Fn(&mut Master) -> Result<(), Vec<BadGlyph>>,
) -> Result<(), Vec<BadGlyph>> {
    let mut errors = Vec::new();
    for master in masters.iter_mut() {
        if let Err(e) = op(master) {
            errors.extend(e);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        errors.dedup();
        Err(errors)
    }
}

/// Replace every component with its outline; CFF has no components.
#[derive(Debug, Default)]
pub struct DecomposeComponents;

impl GlyphFilter for DecomposeComponents {
    fn name(&self) -> &'static str {
        DECOMPOSE_COMPONENTS
    }

    fn apply(&self, masters: &mut [Master], _: usize) -> Result<(), Vec<BadGlyph>> {
        each_master(masters, |m| decompose_components(m, |_, _| true))
    }
}

/// Decompose components whose 2x2 transform isn't identity.
#[derive(Debug, Default)]
pub struct DecomposeTransformedComponents;

impl GlyphFilter for DecomposeTransformedComponents {
    fn name(&self) -> &'static str {
        DECOMPOSE_TRANSFORMED_COMPONENTS
    }

    fn apply(&self, masters: &mut [Master], _: usize) -> Result<(), Vec<BadGlyph>> {
        each_master(masters, |m| decompose_components(m, |_, c| c.is_transformed()))
    }
}

#[derive(Debug, Default)]
pub struct FlattenComponents;

impl GlyphFilter for FlattenComponents {
    fn name(&self) -> &'static str {
        FLATTEN_COMPONENTS
    }

    fn apply(&self, masters: &mut [Master], _: usize) -> Result<(), Vec<BadGlyph>> {
        each_master(masters, flatten_components)
    }
}

/// Order contours by the bottom left of their bounds, as seen in the default master.
///
/// The same permutation is applied everywhere so masters stay compatible.
#[derive(Debug, Default)]
pub struct SortContours;

impl GlyphFilter for SortContours {
    fn name(&self) -> &'static str {
        SORT_CONTOURS
    }

    fn apply(&self, masters: &mut [Master], default_master: usize) -> Result<(), Vec<BadGlyph>> {
        let permutations: Vec<_> = masters[default_master]
            .glyphs
            .values()
            .filter(|g| g.contours.len() > 1)
            .map(|g| {
                let mut order: Vec<usize> = (0..g.contours.len()).collect();
                let key = |i: usize| {
                    let bbox = kurbo::Shape::bounding_box(&g.contours[i].to_bez());
                    (bbox.x0, bbox.y0)
                };
                order.sort_by(|a, b| {
                    let (ka, kb) = (key(*a), key(*b));
                    ka.0.total_cmp(&kb.0).then(ka.1.total_cmp(&kb.1))
                });
                (g.name.clone(), order)
            })
            .filter(|(_, order)| order.windows(2).any(|w| w[0] > w[1]))
            .collect();
        for (glyph_name, order) in permutations {
            debug!("Sorting contours of {glyph_name} to {order:?}");
            for master in masters.iter_mut() {
                let Some(glyph) = master.glyphs.get_mut(glyph_name.as_str()) else {
                    continue;
                };
                if glyph.contours.len() != order.len() {
                    continue;
                }
                glyph.contours = order.iter().map(|i| glyph.contours[*i].clone()).collect();
            }
        }
        Ok(())
    }
}

fn decompose() -> Box<dyn GlyphFilter> {
    Box::new(DecomposeComponents)
}

fn decompose_transformed() -> Box<dyn GlyphFilter> {
    Box::new(DecomposeTransformedComponents)
}

fn flatten() -> Box<dyn GlyphFilter> {
    Box::new(FlattenComponents)
}

fn sort_contours() -> Box<dyn GlyphFilter> {
    Box::new(SortContours)
}

/// Every filter we know; CFF outputs decompose components by default.
pub fn registry(cff: bool) -> Registry<Box<dyn GlyphFilter>> {
    Registry::new("filter")
        .register(DECOMPOSE_COMPONENTS, decompose, cff)
        .register(DECOMPOSE_TRANSFORMED_COMPONENTS, decompose_transformed, false)
        .register(FLATTEN_COMPONENTS, flatten, false)
        .register(SORT_CONTOURS, sort_contours, false)
}

#[cfg(test)]
mod tests {
    use kiln_types::{coords::DesignLocation, stages::StageSpec};
    use kurbo::Affine;
    use pretty_assertions::assert_eq;

    use crate::ir::{Component, Contour, ContourPoint, Glyph};

    use super::*;

    fn rect(x: f64) -> Contour {
        Contour::new(vec![
            ContourPoint::on(x, 0.0),
            ContourPoint::on(x, 10.0),
            ContourPoint::on(x + 10.0, 10.0),
            ContourPoint::on(x + 10.0, 0.0),
        ])
    }

    fn masters() -> Vec<Master> {
        [0.0, 5.0]
            .into_iter()
            .map(|offset| {
                let mut master = Master::new(format!("m{offset}"), DesignLocation::new());
                let mut bar = Glyph::new("bar");
                bar.contours = vec![rect(100.0 + offset), rect(offset)];
                let mut acute = Glyph::new("acute");
                acute.contours = vec![rect(0.0)];
                let mut slanted = Glyph::new("slanted");
                slanted.components = vec![
                    Component::new("acute", Affine::skew(0.2, 0.0)),
                    Component::new("bar", Affine::translate((10.0, 0.0))),
                ];
                master.add_glyph(bar).add_glyph(acute).add_glyph(slanted);
                master
            })
            .collect()
    }

    #[test]
    fn defaults_depend_on_format() {
        assert_eq!(vec![DECOMPOSE_COMPONENTS], registry(true).defaults());
        assert!(registry(false).defaults().is_empty());
    }

    #[test]
    fn ellipsis_keeps_defaults() {
        let names = registry(true)
            .resolve_names(&[StageSpec::Defaults, StageSpec::from(SORT_CONTOURS)])
            .unwrap();
        assert_eq!(vec![DECOMPOSE_COMPONENTS, SORT_CONTOURS], names);
    }

    #[test]
    fn decompose_only_transformed() {
        let mut masters = masters();
        DecomposeTransformedComponents.apply(&mut masters, 0).unwrap();
        let slanted = masters[0].glyph("slanted").unwrap();
        assert_eq!(1, slanted.contours.len());
        let bases: Vec<_> = slanted.components.iter().map(|c| c.base.as_str()).collect();
        assert_eq!(vec!["bar"], bases);
    }

    #[test]
    fn sort_uses_default_master_order_everywhere() {
        let mut masters = masters();
        SortContours.apply(&mut masters, 0).unwrap();
        for (master, offset) in masters.iter().zip([0.0, 5.0]) {
            let bar = master.glyph("bar").unwrap();
            assert_eq!(rect(offset), bar.contours[0]);
        }
    }
}
