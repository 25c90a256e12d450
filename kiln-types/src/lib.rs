//! Helper library for code that is of value to every stage of the kiln pipeline.

pub mod coords;
pub mod error;
mod piecewise_linear_map;
pub mod stages;
pub mod types;
