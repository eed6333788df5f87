//! Data models

pub mod meta;
pub mod prediction;

pub use meta::*;
pub use prediction::*;
