//! External dump/restore tool invocation.
//!
//! The engines shell out to their native tools (`pg_dump`, `mysqldump`,
//! `mongodump` and their restore counterparts). This module resolves the
//! tool binaries and runs them, capturing combined output for errors.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Resolve the dump tool: the configured `tool_path`, or `default` on `PATH`.
pub fn dump_tool(tool_path: Option<&Path>, default: &str) -> PathBuf {
    match tool_path {
        Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
        _ => PathBuf::from(default),
    }
}

/// Resolve the restore tool.
///
/// `tool_path` points at the dump tool, so the restore tool is looked up
/// next to it in the same directory.
pub fn restore_tool(tool_path: Option<&Path>, name: &str) -> PathBuf {
    match tool_path {
        Some(path) if !path.as_os_str().is_empty() => match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
            _ => PathBuf::from(name),
        },
        _ => PathBuf::from(name),
    }
}

/// A prepared invocation of an external tool.
pub struct ToolCommand {
    label: String,
    command: Command,
    stdin: Option<PathBuf>,
}

impl ToolCommand {
    /// Start building an invocation of `program`.
    ///
    /// `label` names the tool in error messages.
    pub fn new(label: impl Into<String>, program: impl AsRef<Path>) -> Self {
        Self {
            label: label.into(),
            command: Command::new(program.as_ref()),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        self.command.arg(arg);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        self.command.args(args);
        self
    }

    /// Set an environment variable on the child only.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env(key, value);
        self
    }

    /// Feed the contents of `path` to the tool's stdin.
    pub fn stdin_file(mut self, path: &Path) -> Self {
        self.stdin = Some(path.to_path_buf());
        self
    }

    /// Run to completion.
    ///
    /// A non-zero exit is an error carrying the exit status and the
    /// captured stdout and stderr.
    pub async fn run(self) -> Result<()> {
        let Self {
            label,
            mut command,
            stdin,
        } = self;

        match stdin {
            Some(path) => {
                let file = std::fs::File::open(&path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                command.stdin(Stdio::from(file));
            }
            None => {
                command.stdin(Stdio::null());
            }
        }

        tracing::debug!("Running {}: {:?}", label, command.as_std().get_program());

        let output = command
            .output()
            .await
            .with_context(|| format!("failed to start {}", label))?;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Err(anyhow!(
            "{} failed: {}, output: {}",
            label,
            output.status,
            combined.trim()
        ))
    }

    /// Run a tool that writes `output`, removing it if the tool fails.
    pub async fn run_into(self, output: &Path) -> Result<()> {
        let result = self.run().await;
        if result.is_err() {
            match tokio::fs::remove_file(output).await {
                Ok(()) => tracing::debug!("Removed partial output {}", output.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {}: {}", output.display(), e),
            }
        }
        result
    }
}
