//! Command-line frontend for the hook diffing engine.

pub mod commands;
