//! A font build pipeline.
//!
//! Takes a font model through outline normalization, compatibility checking, layout,
//! CFF optimization and variation assembly, once per requested font.

mod args;
pub mod autohint;
mod config;
mod error;
pub mod pipeline;
pub mod report;
pub mod timing;

pub use args::{Args, Target};
pub use config::Config;
pub use error::Error;
pub use pipeline::Pipeline;

