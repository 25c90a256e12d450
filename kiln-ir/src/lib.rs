//! The font model kiln builds from, plus the stages that operate on outlines.

pub mod compatibility;
pub mod components;
pub mod cu2qu;
pub mod curves;
pub mod error;
pub mod filters;
pub mod glyph_data;
pub mod instances;
pub mod ir;
pub mod layout;
pub mod mti;
pub mod names;
pub mod normalize;
pub mod orchestration;
pub mod overlaps;
mod serde;
pub mod source;
pub mod variations;
