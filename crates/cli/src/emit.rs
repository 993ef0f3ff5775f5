//! Split emitters
//!
//! The daemon hands every split to one [`SplitEmitter`]. Keystroke injection
//! itself is delegated: either the split is only logged, or an external
//! command (e.g. `xdotool key Prior`) is spawned per split.

use splitter_core::{EmitterKind, SystemConfig};
use splitter_watcher::SplitEmitter;
use std::process::{Command, Stdio};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Placeholder replaced by the split key code in command arguments
const KEY_PLACEHOLDER: &str = "{key}";

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("emitter.command is empty")]
    EmptyCommand,
}

/// Logs each split
pub struct LogEmitter {
    key: u8,
}

impl LogEmitter {
    pub fn new(key: u8) -> Self {
        Self { key }
    }
}

impl SplitEmitter for LogEmitter {
    fn emit_split(&self) {
        info!("Split (key {:#04x})", self.key);
    }
}

/// Spawns an external command per split
///
/// The child is reaped on a separate thread; a failing command is logged and
/// never stops the daemon.
#[derive(Debug)]
pub struct CommandEmitter {
    program: String,
    args: Vec<String>,
}

impl CommandEmitter {
    pub fn new(command: &[String], key: u8) -> Result<Self, EmitError> {
        let key = key.to_string();
        let mut parts = command.iter().map(|part| part.replace(KEY_PLACEHOLDER, &key));
        let program = parts.next().ok_or(EmitError::EmptyCommand)?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl SplitEmitter for CommandEmitter {
    fn emit_split(&self) {
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                let program = self.program.clone();
                std::thread::spawn(move || match child.wait() {
                    Ok(status) if status.success() => debug!("{} finished", program),
                    Ok(status) => warn!("Split command {} exited with {}", program, status),
                    Err(e) => warn!("Failed to wait for {}: {}", program, e),
                });
            }
            Err(e) => warn!("Failed to run split command {}: {}", self.program, e),
        }
    }
}

/// Build the emitter selected by the configuration
pub fn build(config: &SystemConfig) -> Result<Arc<dyn SplitEmitter>, EmitError> {
    match config.emitter.kind {
        EmitterKind::Log => Ok(Arc::new(LogEmitter::new(config.split_key))),
        EmitterKind::Command => Ok(Arc::new(CommandEmitter::new(
            &config.emitter.command,
            config.split_key,
        )?)),
    }
}
