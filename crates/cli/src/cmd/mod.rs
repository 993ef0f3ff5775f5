//! CLI command implementations

pub mod config;
pub mod paths;
pub mod run;
