//! External tool invocation.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// One invocation of the install tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments after the program.
    pub args: Vec<String>,
    /// Working directory.
    pub cwd: PathBuf,
    /// Prepended to `PATH` so the tool finds its runtime.
    pub path_prefix: Option<PathBuf>,
    /// Package name, used to tag output lines.
    pub label: String,
}

/// Runs install tool commands.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion and return the exit code (`None` when killed by a
    /// signal). Failing to start is an `Err`.
    async fn run(&self, command: &ToolCommand) -> std::io::Result<Option<i32>>;
}

/// Runs commands with tokio, forwarding stdout/stderr lines to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    fn search_path(prefix: Option<&PathBuf>) -> std::io::Result<OsString> {
        let existing = std::env::var_os("PATH").unwrap_or_default();
        let Some(prefix) = prefix else {
            return Ok(existing);
        };
        let paths = std::iter::once(prefix.clone()).chain(std::env::split_paths(&existing));
        std::env::join_paths(paths).map_err(std::io::Error::other)
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, label: &str, stream: &'static str) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(package = label, stream, "{line}");
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: &ToolCommand) -> std::io::Result<Option<i32>> {
        let path = Self::search_path(command.path_prefix.as_ref())?;

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .env("PATH", path)
            .env("CI", "true")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let label = command.label.as_str();

        let (status, (), ()) = tokio::join!(
            child.wait(),
            async {
                if let Some(out) = stdout {
                    forward_lines(out, label, "stdout").await;
                }
            },
            async {
                if let Some(err) = stderr {
                    forward_lines(err, label, "stderr").await;
                }
            },
        );

        Ok(status?.code())
    }
}
