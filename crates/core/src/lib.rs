//! Shared configuration and path discovery for splitter
//!
//! This crate provides:
//! - The system configuration (TOML, leniently parsed)
//! - Platform-default candidate directories for the watched game files

pub mod config;
pub mod paths;

// Re-exports
pub use config::{
    ConfigError, ConfigSource, EmitterConfig, EmitterKind, LoadedConfig, LoggingConfig,
    SystemConfig,
};
pub use paths::{candidate_paths, default_candidates, normalize};
