//! System configuration
//!
//! Configuration is a single TOML document. Parsing is lenient per key: a
//! malformed or out-of-range value is reported as a warning and its default
//! is kept, so a bad config file never stops the daemon.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "splitter.toml";

/// Page Up virtual-key code
pub const DEFAULT_SPLIT_KEY: u8 = 0x21;
pub const DEFAULT_PULSE_WINDOW_MS: u64 = 45;
pub const DEFAULT_RESCAN_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_TARGET_FILE: &str = "stats0";

const PULSE_WINDOW_RANGE: (u64, u64) = (1, 10_000);
const RESCAN_INTERVAL_RANGE: (u64, u64) = (1, 3_600);

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{key} = {value} is out of range ({min}-{max})")]
    OutOfRange {
        key: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("target_file '{0}' must be a plain file name")]
    InvalidTargetFile(String),

    #[error("emitter.kind = \"command\" requires a non-empty emitter.command")]
    MissingCommand,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Directories to watch, in priority order
    pub paths: Vec<PathBuf>,
    /// Virtual-key code handed to the split emitter
    pub split_key: u8,
    /// Maximum gap between pulses of one burst
    pub pulse_window_ms: u64,
    /// Period of the supervisor sweep
    pub rescan_interval_secs: u64,
    /// File whose writes are counted
    pub target_file: String,
    /// Whether creation of the target file counts as a pulse
    pub count_creates: bool,
    /// Whether platform-default directories are watched too
    pub include_default_paths: bool,
    pub emitter: EmitterConfig,
    pub logging: LoggingConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            split_key: DEFAULT_SPLIT_KEY,
            pulse_window_ms: DEFAULT_PULSE_WINDOW_MS,
            rescan_interval_secs: DEFAULT_RESCAN_INTERVAL_SECS,
            target_file: DEFAULT_TARGET_FILE.to_string(),
            count_creates: true,
            include_default_paths: true,
            emitter: EmitterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Which split emitter the daemon drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitterKind {
    /// Log the split only
    #[default]
    Log,
    /// Spawn an external command per split
    Command,
}

impl fmt::Display for EmitterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitterKind::Log => write!(f, "log"),
            EmitterKind::Command => write!(f, "command"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmitterConfig {
    pub kind: EmitterKind,
    /// Program and arguments; `{key}` is replaced by the split key code
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. "info" or "splitter_watcher=debug"
    pub default: String,
    /// Optional log file (in addition to stderr)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: "info".to_string(),
            file: None,
        }
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Result of loading configuration
///
/// Warnings are collected rather than logged because logging is itself
/// configured from this file.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: SystemConfig,
    pub source: ConfigSource,
    pub warnings: Vec<String>,
}

impl SystemConfig {
    pub fn pulse_window(&self) -> Duration {
        Duration::from_millis(self.pulse_window_ms)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.rescan_interval_secs)
    }

    /// Check every value against its valid range
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.problems().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn problems(&self) -> Vec<ConfigError> {
        let mut problems = Vec::new();

        let (min, max) = PULSE_WINDOW_RANGE;
        if !(min..=max).contains(&self.pulse_window_ms) {
            problems.push(ConfigError::OutOfRange {
                key: "pulse_window_ms",
                value: self.pulse_window_ms,
                min,
                max,
            });
        }

        let (min, max) = RESCAN_INTERVAL_RANGE;
        if !(min..=max).contains(&self.rescan_interval_secs) {
            problems.push(ConfigError::OutOfRange {
                key: "rescan_interval_secs",
                value: self.rescan_interval_secs,
                min,
                max,
            });
        }

        if !is_plain_file_name(&self.target_file) {
            problems.push(ConfigError::InvalidTargetFile(self.target_file.clone()));
        }

        if self.emitter.kind == EmitterKind::Command && self.emitter.command.is_empty() {
            problems.push(ConfigError::MissingCommand);
        }

        problems
    }

    /// Reset every invalid value to its default, reporting each reset
    fn sanitize(&mut self, warnings: &mut Vec<String>) {
        let defaults = SystemConfig::default();
        for problem in self.problems() {
            warnings.push(format!("{problem}; using default"));
            match problem {
                ConfigError::OutOfRange { key: "pulse_window_ms", .. } => {
                    self.pulse_window_ms = defaults.pulse_window_ms;
                }
                ConfigError::OutOfRange { .. } => {
                    self.rescan_interval_secs = defaults.rescan_interval_secs;
                }
                ConfigError::InvalidTargetFile(_) => {
                    self.target_file = defaults.target_file.clone();
                }
                ConfigError::MissingCommand => {
                    self.emitter = defaults.emitter.clone();
                }
                ConfigError::Read { .. } => {}
            }
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

/// Parse a TOML document, keeping defaults for anything malformed
pub fn parse_lenient(content: &str) -> (SystemConfig, Vec<String>) {
    let mut config = SystemConfig::default();
    let mut warnings = Vec::new();

    let table: toml::Table = match content.parse() {
        Ok(table) => table,
        Err(e) => {
            warnings.push(format!("Could not parse config: {e}; using defaults"));
            return (config, warnings);
        }
    };

    for (key, value) in table {
        match key.as_str() {
            "paths" => take(&mut config.paths, "paths", value, &mut warnings),
            "split_key" => take(&mut config.split_key, "split_key", value, &mut warnings),
            "pulse_window_ms" => {
                take(&mut config.pulse_window_ms, "pulse_window_ms", value, &mut warnings)
            }
            "rescan_interval_secs" => take(
                &mut config.rescan_interval_secs,
                "rescan_interval_secs",
                value,
                &mut warnings,
            ),
            "target_file" => take(&mut config.target_file, "target_file", value, &mut warnings),
            "count_creates" => {
                take(&mut config.count_creates, "count_creates", value, &mut warnings)
            }
            "include_default_paths" => take(
                &mut config.include_default_paths,
                "include_default_paths",
                value,
                &mut warnings,
            ),
            "emitter" => {
                for (key, value) in section("emitter", value, &mut warnings) {
                    match key.as_str() {
                        "kind" => take(&mut config.emitter.kind, "emitter.kind", value, &mut warnings),
                        "command" => take(
                            &mut config.emitter.command,
                            "emitter.command",
                            value,
                            &mut warnings,
                        ),
                        _ => warnings.push(format!("Unknown config key: emitter.{key}")),
                    }
                }
            }
            "logging" => {
                for (key, value) in section("logging", value, &mut warnings) {
                    match key.as_str() {
                        "default" => take(
                            &mut config.logging.default,
                            "logging.default",
                            value,
                            &mut warnings,
                        ),
                        "file" => {
                            let mut file = PathBuf::new();
                            take(&mut file, "logging.file", value, &mut warnings);
                            if !file.as_os_str().is_empty() {
                                config.logging.file = Some(file);
                            }
                        }
                        _ => warnings.push(format!("Unknown config key: logging.{key}")),
                    }
                }
            }
            _ => warnings.push(format!("Unknown config key: {key}")),
        }
    }

    config.sanitize(&mut warnings);
    (config, warnings)
}

fn take<T: DeserializeOwned>(
    slot: &mut T,
    key: &str,
    value: toml::Value,
    warnings: &mut Vec<String>,
) {
    match value.try_into::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(e) => warnings.push(format!("Could not parse {key}: {e}; using default")),
    }
}

fn section(name: &str, value: toml::Value, warnings: &mut Vec<String>) -> toml::Table {
    match value {
        toml::Value::Table(table) => table,
        _ => {
            warnings.push(format!("[{name}] must be a table; using defaults"));
            toml::Table::new()
        }
    }
}

/// User-level config file location
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("splitter").join("config.toml"))
}

/// Files searched when no config is given explicitly, in order
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(user) = config_file_path() {
        paths.push(user);
    }
    paths
}

/// Load configuration
///
/// An explicit path must be readable. Without one, the search paths are
/// tried in order and a missing file simply means defaults.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_file(path);
    }

    let mut skipped = Vec::new();
    for candidate in search_paths() {
        if !candidate.is_file() {
            continue;
        }
        match load_file(&candidate) {
            Ok(mut loaded) => {
                skipped.append(&mut loaded.warnings);
                loaded.warnings = skipped;
                return Ok(loaded);
            }
            Err(e) => skipped.push(e.to_string()),
        }
    }

    Ok(LoadedConfig {
        config: SystemConfig::default(),
        source: ConfigSource::Defaults,
        warnings: skipped,
    })
}

fn load_file(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let (config, warnings) = parse_lenient(&content);
    Ok(LoadedConfig {
        config,
        source: ConfigSource::File(path.to_path_buf()),
        warnings,
    })
}

/// Documented example configuration
pub fn example_config() -> String {
    format!(
        r#"# splitter configuration

# Extra directories to watch (checked before the platform defaults)
paths = ["D:/Games/Dustforce/user"]

# Virtual-key code passed to the emitter (33 = Page Up)
split_key = {DEFAULT_SPLIT_KEY}

# Maximum gap between writes of one burst, in milliseconds (1-10000)
pulse_window_ms = {DEFAULT_PULSE_WINDOW_MS}

# How often unavailable directories are retried, in seconds (1-3600)
rescan_interval_secs = {DEFAULT_RESCAN_INTERVAL_SECS}

# File whose writes are counted
target_file = "{DEFAULT_TARGET_FILE}"

# Count creation of the target file as a write
count_creates = true

# Also watch the usual install and save locations
include_default_paths = true

[emitter]
# "log" or "command"
kind = "command"
# {{key}} is replaced by split_key
command = ["xdotool", "key", "Prior"]

[logging]
default = "info"
# file = "splitter.log"
"#
    )
}
