//! Overlap removal.
//!
//! Backends implement one capability, the nonzero union of a glyph's contours, and
//! are picked by name from a compiled-in registry.

use std::fmt::Debug;

use kiln_types::{
    error::StageError,
    stages::{Registry, StageSpec},
};

use crate::ir::{Contour, Glyph};

mod union;

pub use union::union_contours;

pub const PATHOPS: &str = "pathops";
pub const BOOLEAN_OPERATIONS: &str = "booleanOperations";

/// Computes the nonzero winding union of closed contours.
///
/// Contours that intersect nothing come back untouched, so applying a backend to
/// its own output changes nothing.
pub trait OverlapBackend: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn union(&self, contours: &[Contour]) -> Vec<Contour>;

    fn remove_overlaps(&self, glyph: &mut Glyph) {
        if !glyph.contours.is_empty() {
            glyph.contours = self.union(&glyph.contours);
        }
    }
}

/// Curve preserving union: boundary pieces that cover a whole original curve are
/// emitted as that curve again.
#[derive(Debug, Default)]
pub struct Pathops;

impl OverlapBackend for Pathops {
    fn name(&self) -> &'static str {
        PATHOPS
    }

    fn union(&self, contours: &[Contour]) -> Vec<Contour> {
        union_contours(contours, true)
    }
}

/// Flattening union: contours that had to be cut come back as polygons.
#[derive(Debug, Default)]
pub struct BooleanOperations;

impl OverlapBackend for BooleanOperations {
    fn name(&self) -> &'static str {
        BOOLEAN_OPERATIONS
    }

    fn union(&self, contours: &[Contour]) -> Vec<Contour> {
        union_contours(contours, false)
    }
}

fn pathops() -> Box<dyn OverlapBackend> {
    Box::new(Pathops)
}

fn boolean_operations() -> Box<dyn OverlapBackend> {
    Box::new(BooleanOperations)
}

pub fn registry() -> Registry<Box<dyn OverlapBackend>> {
    Registry::new("overlaps backend")
        .register(PATHOPS, pathops, true)
        .register(BOOLEAN_OPERATIONS, boolean_operations, false)
}

/// Look up a backend by name.
pub fn backend(name: &str) -> Result<Box<dyn OverlapBackend>, StageError> {
    registry()
        .resolve(&[StageSpec::Named(name.to_string())])
        .map(|mut backends| backends.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_backend() {
        let err = backend("skia").unwrap_err();
        let StageError::Unavailable { name, available, .. } = err else {
            panic!("Wrong error {err:?}");
        };
        assert_eq!("skia", name);
        assert_eq!(vec![PATHOPS, BOOLEAN_OPERATIONS], available);
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(PATHOPS, backend(PATHOPS).unwrap().name());
        assert_eq!(
            BOOLEAN_OPERATIONS,
            backend(BOOLEAN_OPERATIONS).unwrap().name()
        );
    }
}
