//! Subprocess execution for command-line analysis backends
//!
//! Commands are always built as an argument vector and run without a shell.
//! Colour output is disabled, stdin is closed, and the child is killed when
//! its wall-clock limit passes.

use crate::error::AnalysisError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Environment forcing plain, non-interactive output
const PLAIN_OUTPUT_ENV: [(&str, &str); 3] = [("NO_COLOR", "1"), ("FORCE_COLOR", "0"), ("TERM", "dumb")];

/// Captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external programs on behalf of a backend
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, killing it after `timeout`.
    ///
    /// `backend` only labels the errors.
    async fn run(
        &self,
        backend: &str,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, AnalysisError>;

    /// Locate `program` on the search path
    fn find_program(&self, program: &str) -> Option<PathBuf>;
}

/// Runner that spawns real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        backend: &str,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, AnalysisError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .envs(PLAIN_OUTPUT_ENV)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(backend, program, args = args.len(), "spawning analysis command");
        let child = command.spawn().map_err(|e| AnalysisError::Spawn {
            command: program.to_string(),
            message: e.to_string(),
        })?;

        // Dropping the timed-out future drops the child, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| AnalysisError::timeout(backend, timeout))?
            .map_err(|e| AnalysisError::Spawn {
                command: program.to_string(),
                message: e.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn find_program(&self, program: &str) -> Option<PathBuf> {
        let path = std::env::var_os("PATH")?;
        find_in_path(program, std::env::split_paths(&path))
    }
}

/// First directory in `dirs` holding an executable file named `program`
pub fn find_in_path<I>(program: &str, dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    dirs.into_iter()
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_in_path_skips_missing_dirs() {
        let dir = TempDir::new().unwrap();
        let found = find_in_path("definitely-not-here", [dir.path().to_path_buf()]);
        assert!(found.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_find_in_path_requires_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let tool = dir.path().join("tool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        assert!(find_in_path("tool", [dir.path().to_path_buf()]).is_none());

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(find_in_path("tool", [dir.path().to_path_buf()]), Some(tool));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_captures_output_and_env() {
        let output = SystemRunner::new()
            .run(
                "test",
                "sh",
                &["-c".to_string(), "printf '%s' \"$NO_COLOR\"; echo oops >&2; exit 3".to_string()],
                Duration::from_secs(10),
            )
            .await
            .unwrap();
        assert_eq!(output.stdout, "1");
        assert_eq!(output.stderr.trim(), "oops");
        assert_eq!(output.code, Some(3));
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_times_out() {
        let err = SystemRunner::new()
            .run("slow", "sleep", &["5".to_string()], Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_system_runner_spawn_failure() {
        let err = SystemRunner::new()
            .run("x", "catup-no-such-program", &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Spawn { .. }));
    }
}
