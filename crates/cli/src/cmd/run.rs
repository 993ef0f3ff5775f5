//! Run the watcher in the foreground

use anyhow::Result;
use splitter_core::{LoadedConfig, SystemConfig};
use std::path::PathBuf;
use tracing::warn;

/// Command-line overrides applied on top of the config file
#[derive(Debug, Default, Clone)]
pub struct RunOverrides {
    pub paths: Vec<PathBuf>,
    pub pulse_window_ms: Option<u64>,
    pub no_default_paths: bool,
}

impl RunOverrides {
    /// Apply to `config`; an invalid override is reported and skipped
    pub fn apply(&self, config: &mut SystemConfig) -> Vec<String> {
        let mut warnings = Vec::new();

        // Paths given on the command line are checked first
        if !self.paths.is_empty() {
            let mut paths = self.paths.clone();
            paths.append(&mut config.paths);
            config.paths = paths;
        }

        if self.no_default_paths {
            config.include_default_paths = false;
        }

        if let Some(window) = self.pulse_window_ms {
            let previous = config.pulse_window_ms;
            config.pulse_window_ms = window;
            if let Err(e) = config.validate() {
                warnings.push(format!("--pulse-window-ms: {}; keeping {}ms", e, previous));
                config.pulse_window_ms = previous;
            }
        }

        warnings
    }
}

pub async fn run(loaded: LoadedConfig, overrides: RunOverrides) -> Result<()> {
    let mut config = loaded.config;
    for warning in overrides.apply(&mut config) {
        warn!("{}", warning);
    }
    crate::daemon::run(&config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_paths_come_before_config_paths() {
        let mut config = SystemConfig {
            paths: vec![PathBuf::from("/from/config")],
            ..SystemConfig::default()
        };
        let overrides = RunOverrides {
            paths: vec![PathBuf::from("/from/cli")],
            no_default_paths: true,
            ..RunOverrides::default()
        };

        assert!(overrides.apply(&mut config).is_empty());
        assert_eq!(
            config.paths,
            vec![PathBuf::from("/from/cli"), PathBuf::from("/from/config")]
        );
        assert!(!config.include_default_paths);
    }

    #[test]
    fn test_invalid_window_override_is_skipped() {
        let mut config = SystemConfig::default();
        let overrides = RunOverrides {
            pulse_window_ms: Some(0),
            ..RunOverrides::default()
        };

        let warnings = overrides.apply(&mut config);
        assert_eq!(warnings.len(), 1);
        assert_eq!(config.pulse_window_ms, 45);
    }

    #[test]
    fn test_window_override() {
        let mut config = SystemConfig::default();
        let overrides = RunOverrides {
            pulse_window_ms: Some(100),
            ..RunOverrides::default()
        };

        assert!(overrides.apply(&mut config).is_empty());
        assert_eq!(config.pulse_window_ms, 100);
    }
}
