//! CLI command execution helpers for integration tests

use std::path::{Path, PathBuf};
use std::process::Command;


/// Command builder for the `splitter` binary
pub struct SplitterCommand {
    working_dir: PathBuf,
    args: Vec<String>,
}

impl SplitterCommand {
    /// Create a new command in the given working directory
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Execute command and return result
    pub fn execute(&self) -> CommandResult {
        let output = Command::new(env!("CARGO_BIN_EXE_splitter"))
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute splitter");

        CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        }
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> CommandResult {
        let result = self.execute();
        assert!(
            result.success(),
            "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
            result.exit_code,
            self.args,
            result.stdout,
            result.stderr
        );
        result
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> CommandResult {
        let result = self.execute();
        assert!(
            !result.success(),
            "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
            self.args,
            result.stdout
        );
        result
    }
}

/// Command execution result
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Macro for convenient command construction
#[macro_export]
macro_rules! splitter {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::SplitterCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
