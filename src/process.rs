//! Subprocess helper for interpreter invocations.
//!
//! Every call to the Python interpreter goes through [`ProcessCmd`], which
//! captures output and turns spawn failures and non-zero exits into a typed
//! [`ProcessError`].

use std::fmt;
use std::path::Path;
use std::process::Command;

use crate::host::ProcessRunner;

/// Maximum stderr bytes kept in an error. Django tracebacks can be long and
/// only the tail is useful in a one-line message.
const MAX_STDERR_BYTES: usize = 2048;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ProcessError {
    /// The process could not be spawned (missing binary, permission error).
    SpawnFailed {
        program: String,
        source: std::io::Error,
    },
    /// The process exited with a non-zero status code (`None` = killed by a signal).
    NonZeroExit { code: Option<i32>, stderr: String },
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed { program, source } => write!(f, "Failed to spawn {program}: {source}"),
            Self::NonZeroExit { code, stderr } => {
                let code_str = code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                if stderr.is_empty() {
                    write!(f, "process exited with code {code_str}")
                } else {
                    write!(f, "process exited with code {code_str}: {stderr}")
                }
            }
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SpawnFailed { source, .. } => Some(source),
            Self::NonZeroExit { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Output type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct ProcessCmd {
    program: String,
    cmd: Command,
}

impl ProcessCmd {
    pub fn new(program: &Path, cwd: &Path) -> Self {
        let mut cmd = Command::new(program);
        cmd.current_dir(cwd);
        // Keep colour codes out of captured help text.
        cmd.env("DJANGO_COLORS", "nocolor");
        cmd.env("PYTHONIOENCODING", "utf-8");
        Self {
            program: program.display().to_string(),
            cmd,
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.cmd.arg(arg);
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, val: &str) -> Self {
        self.cmd.env(key, val);
        self
    }

    /// Run to completion, requiring success (non-zero exit → `Err`).
    pub fn run(mut self) -> Result<ProcessOutput, ProcessError> {
        tracing::debug!(program = %self.program, "spawning process");
        let output = self.cmd.output().map_err(|source| ProcessError::SpawnFailed {
            program: self.program.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(ProcessError::NonZeroExit {
                code: output.status.code(),
                stderr: truncate_tail(&stderr, MAX_STDERR_BYTES),
            });
        }

        Ok(ProcessOutput { stdout, stderr })
    }
}

/// Keep the last `max` bytes of `text`, cut on a char boundary.
fn truncate_tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

/// [`ProcessRunner`] backed by `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, program: &Path, args: &[&str], cwd: &Path) -> Result<ProcessOutput, ProcessError> {
        ProcessCmd::new(program, cwd).args(args).run()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
