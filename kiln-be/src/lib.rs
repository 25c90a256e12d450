//! The backend: turn a normalized font model into the data of binary tables.

pub mod cff;
pub mod error;
pub mod features;
pub mod font;
pub mod glyf;
pub mod gvar;
pub mod iup;
