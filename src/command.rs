//! Execution of external tools (package managers and VCS clients).
//!
//! Everything that spawns a process goes through [`CommandRunner`] so the
//! resolution logic can be exercised with a mock in tests.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use crate::error::{AnalyzerError, Result};

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    #[cfg(test)]
    pub fn ok(stdout: &str) -> Self {
        CommandOutput {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    #[cfg(test)]
    pub fn failed(code: i32, stderr: &str) -> Self {
        CommandOutput {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

/// Operating system family, used to pick tool executable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` inside `working_dir` and wait for it to exit.
    ///
    /// A non-zero exit code is not an error at this level; only failures to
    /// spawn or to finish in time are.
    fn execute(&self, working_dir: &Path, program: &str, args: &[String]) -> Result<CommandOutput>;
}

impl dyn CommandRunner + '_ {
    pub fn run(&self, working_dir: &Path, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.execute(working_dir, program, &args)
    }

    /// Like [`run`](Self::run) but turns a non-zero exit into
    /// [`AnalyzerError::CommandFailed`].
    pub fn run_checked(
        &self,
        working_dir: &Path,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput> {
        let output = self.run(working_dir, program, args)?;
        if !output.success() {
            return Err(AnalyzerError::CommandFailed {
                command: command_line(program, args),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spawns real processes on the tokio runtime and enforces a timeout.
///
/// `execute` blocks the calling thread, so it must be called from outside
/// the runtime's async workers (e.g. from `spawn_blocking`).
pub struct ProcessRunner {
    handle: tokio::runtime::Handle,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(handle: tokio::runtime::Handle, timeout: Duration) -> Self {
        Self { handle, timeout }
    }
}

impl CommandRunner for ProcessRunner {
    fn execute(&self, working_dir: &Path, program: &str, args: &[String]) -> Result<CommandOutput> {
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = command_line(program, &arg_refs);
        log::debug!("Running '{}' in '{}'", command, working_dir.display());

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let result = self
            .handle
            .block_on(async { tokio::time::timeout(self.timeout, cmd.output()).await });

        let output = match result {
            Err(_) => {
                return Err(AnalyzerError::CommandTimeout {
                    command,
                    secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(source)) => return Err(AnalyzerError::Spawn { command, source }),
            Ok(Ok(output)) => output,
        };

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
