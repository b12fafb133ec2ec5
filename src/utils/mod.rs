//! Utility modules for the static site generator.

pub mod fs;
pub mod log;
pub mod xml;
