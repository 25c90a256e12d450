//! Component graph work: cycle detection, flattening, decomposition, use-my-metrics.
//!
//! Components are resolved through an index graph (glyph name to index) so cycles are
//! found with gray/black marking before anything follows a reference.

use std::collections::HashMap;

use indexmap::IndexMap;
use kiln_types::types::GlyphName;
use kurbo::Affine;
use log::{debug, trace};
use write_fonts::OtRound;

use crate::{
    error::{BadGlyph, BadGlyphKind},
    ir::{Component, Contour, Glyph, Master},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

/// Which glyph references which, by index.
#[derive(Debug)]
pub struct ComponentGraph {
    names: Vec<GlyphName>,
    edges: Vec<Vec<usize>>,
}

impl ComponentGraph {
    /// Build the graph, reporting components whose base doesn't exist.
    pub fn new(glyphs: &IndexMap<GlyphName, Glyph>) -> (ComponentGraph, Vec<BadGlyph>) {
        let index: HashMap<&GlyphName, usize> =
            glyphs.keys().enumerate().map(|(i, n)| (n, i)).collect();
        let mut missing = Vec::new();
        let edges = glyphs
            .values()
            .map(|glyph| {
                glyph
                    .components
                    .iter()
                    .filter_map(|c| match index.get(&c.base) {
                        Some(idx) => Some(*idx),
                        None => {
                            missing.push(BadGlyph::new(
                                glyph.name.clone(),
                                BadGlyphKind::MissingComponent(c.base.clone()),
                            ));
                            None
                        }
                    })
                    .collect()
            })
            .collect();
        let graph = ComponentGraph {
            names: glyphs.keys().cloned().collect(),
            edges,
        };
        (graph, missing)
    }

    /// Depth first walk, returning glyph indices with every base before its users.
    ///
    /// Each cycle found is reported against the glyph that closes it.
    pub fn bases_first(&self) -> Result<Vec<usize>, Vec<BadGlyph>> {
        let mut marks = vec![Mark::White; self.names.len()];
        let mut order = Vec::with_capacity(self.names.len());
        let mut cycles = Vec::new();

        for root in 0..self.names.len() {
            if marks[root] != Mark::White {
                continue;
            }
            // (node, next edge to follow)
            let mut stack = vec![(root, 0)];
            marks[root] = Mark::Gray;
            while let Some((node, edge)) = stack.last_mut() {
                let node = *node;
                let Some(next) = self.edges[node].get(*edge).copied() else {
                    marks[node] = Mark::Black;
                    order.push(node);
                    stack.pop();
                    continue;
                };
                *edge += 1;
                match marks[next] {
                    Mark::White => {
                        marks[next] = Mark::Gray;
                        stack.push((next, 0));
                    }
                    Mark::Gray => {
                        let start = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                        let cycle = stack[start..]
                            .iter()
                            .map(|(n, _)| self.names[*n].clone())
                            .chain(std::iter::once(self.names[next].clone()))
                            .collect();
                        cycles.push(BadGlyph::new(
                            self.names[node].clone(),
                            BadGlyphKind::ComponentCycle(cycle),
                        ));
                    }
                    Mark::Black => (),
                }
            }
        }
        if cycles.is_empty() {
            Ok(order)
        } else {
            Err(cycles)
        }
    }
}

/// Glyph indices bases-first, or every component problem in the master.
fn checked_order(master: &Master) -> Result<Vec<usize>, Vec<BadGlyph>> {
    let (graph, mut errors) = ComponentGraph::new(&master.glyphs);
    match graph.bases_first() {
        Ok(order) if errors.is_empty() => Ok(order),
        Ok(_) => Err(errors),
        Err(cycles) => {
            errors.extend(cycles);
            Err(errors)
        }
    }
}

/// Make sure components only reference simple glyphs.
///
/// Nested components are replaced by the components of their base, with composed
/// transforms.
pub fn flatten_components(master: &mut Master) -> Result<(), Vec<BadGlyph>> {
    let order = checked_order(master)?;
    for idx in order {
        let glyph = &master.glyphs[idx];
        if !glyph.components.iter().any(|c| {
            master
                .glyph(c.base.as_str())
                .is_some_and(|base| base.is_composite())
        }) {
            continue;
        }
        trace!("Flatten {} {:?}", glyph.name, glyph.components);
        // bases are already flat so one level of substitution is enough
        let mut flat = Vec::new();
        for component in glyph.components.iter() {
            match master.glyph(component.base.as_str()) {
                Some(base) if base.is_composite() => {
                    flat.extend(base.components.iter().map(|nested| Component {
                        base: nested.base.clone(),
                        transform: component.transform * nested.transform,
                        use_my_metrics: false,
                    }))
                }
                _ => flat.push(component.clone()),
            }
        }
        master.glyphs[idx].components = flat;
    }
    Ok(())
}

/// Replace the components accepted by `filter` with the contours they draw.
///
/// Decomposition is deep: the base contributes its own contours plus everything its
/// components draw, no matter how nested.
pub fn decompose_components(
    master: &mut Master,
    filter: impl Fn(&Glyph, &Component) -> bool,
) -> Result<(), Vec<BadGlyph>> {
    let order = checked_order(master)?;
    // fully resolved outline per glyph index, bases first so lookups always hit
    let mut outlines: HashMap<usize, Vec<Contour>> = HashMap::new();
    for idx in order.iter().copied() {
        let glyph = &master.glyphs[idx];
        let mut outline = glyph.contours.clone();
        for component in glyph.components.iter() {
            outline.extend(transformed_outline(master, &outlines, component));
        }
        outlines.insert(idx, outline);
    }

    for idx in order {
        let glyph = &master.glyphs[idx];
        if !glyph.components.iter().any(|c| filter(glyph, c)) {
            continue;
        }
        let mut contours = glyph.contours.clone();
        let mut kept = Vec::new();
        for component in glyph.components.iter() {
            if filter(glyph, component) {
                contours.extend(transformed_outline(master, &outlines, component));
            } else {
                kept.push(component.clone());
            }
        }
        debug!(
            "Decomposed {} of {} components of {}",
            glyph.components.len() - kept.len(),
            glyph.components.len(),
            glyph.name
        );
        let glyph = &mut master.glyphs[idx];
        glyph.contours = contours;
        glyph.components = kept;
    }
    Ok(())
}

fn transformed_outline(
    master: &Master,
    outlines: &HashMap<usize, Vec<Contour>>,
    component: &Component,
) -> Vec<Contour> {
    let Some(base_idx) = master.glyphs.get_index_of(component.base.as_str()) else {
        return Vec::new();
    };
    let mut contours = outlines.get(&base_idx).cloned().unwrap_or_default();
    for contour in contours.iter_mut() {
        contour.apply_affine(component.transform);
    }
    contours
}

/// Decompose every component of glyphs that also have contours.
///
/// Binary glyph tables can't mix the two.
pub fn decompose_mixed(master: &mut Master) -> Result<(), Vec<BadGlyph>> {
    decompose_components(master, |glyph, _| !glyph.contours.is_empty())
}

/// The full outline of a glyph with every component decomposed.
///
/// Component contours follow the glyph's own, depth first in component order.
pub fn resolved_contours(
    master: &Master,
    glyph_name: &GlyphName,
) -> Result<Vec<Contour>, BadGlyph> {
    if master.glyph(glyph_name.as_str()).is_none() {
        return Err(BadGlyph::new(
            glyph_name.clone(),
            BadGlyphKind::MissingFromMaster(master.name.clone()),
        ));
    }
    let mut contours = Vec::new();
    let mut path = Vec::new();
    resolve_into(master, glyph_name, Affine::IDENTITY, &mut path, &mut contours)
        .map_err(|kind| BadGlyph::new(glyph_name.clone(), kind))?;
    Ok(contours)
}

/// Appends the transformed outline of `name`; `path` holds the glyphs being expanded.
fn resolve_into(
    master: &Master,
    name: &GlyphName,
    affine: Affine,
    path: &mut Vec<GlyphName>,
    contours: &mut Vec<Contour>,
) -> Result<(), BadGlyphKind> {
    if let Some(start) = path.iter().position(|n| n == name) {
        let mut cycle = path[start..].to_vec();
        cycle.push(name.clone());
        return Err(BadGlyphKind::ComponentCycle(cycle));
    }
    let Some(glyph) = master.glyph(name.as_str()) else {
        return Err(BadGlyphKind::MissingComponent(name.clone()));
    };
    contours.extend(glyph.contours.iter().map(|c| {
        let mut c = c.clone();
        c.apply_affine(affine);
        c
    }));
    path.push(name.clone());
    for component in glyph.components.iter() {
        resolve_into(master, &component.base, affine * component.transform, path, contours)?;
    }
    path.pop();
    Ok(())
}

/// Can glyph reuse the metrics of the component base in every master?
///
/// To be safe the component should have the same advance width as the glyph and a
/// transform that does nothing except perhaps move vertically.
fn can_reuse_metrics(masters: &[Master], glyph_name: &GlyphName, component_idx: usize) -> bool {
    masters.iter().all(|master| {
        let Some(glyph) = master.glyph(glyph_name.as_str()) else {
            return true;
        };
        let Some(component) = glyph.components.get(component_idx) else {
            return false;
        };
        let Some(base) = master.glyph(component.base.as_str()) else {
            return false;
        };
        let width: i16 = glyph.width.ot_round();
        if width != OtRound::<i16>::ot_round(base.width) {
            return false;
        }
        let mut coeffs = component.transform.as_coeffs();
        coeffs[5] = 0.0;
        coeffs == Affine::IDENTITY.as_coeffs()
    })
}

/// Flag the first component whose metrics the composite can reuse.
///
/// Glyphs that already have a flagged component are left alone. The same component
/// is flagged in every master.
pub fn propagate_use_my_metrics(masters: &mut [Master], default_master: usize) {
    let composites: Vec<(GlyphName, usize)> = masters[default_master]
        .glyphs
        .values()
        .filter(|g| g.is_composite() && !g.components.iter().any(|c| c.use_my_metrics))
        .map(|g| (g.name.clone(), g.components.len()))
        .collect();
    for (glyph_name, num_components) in composites {
        let Some(idx) = (0..num_components).find(|i| can_reuse_metrics(masters, &glyph_name, *i))
        else {
            continue;
        };
        trace!("{glyph_name} uses the metrics of component {idx}");
        for master in masters.iter_mut() {
            if let Some(component) = master
                .glyphs
                .get_mut(glyph_name.as_str())
                .and_then(|g| g.components.get_mut(idx))
            {
                component.use_my_metrics = true;
            }
        }
    }
}
