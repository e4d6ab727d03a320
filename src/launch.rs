//! Launching a chosen command in a terminal or under the debugger.

use std::path::{Path, PathBuf};

use crate::host::{DebugConfiguration, DebugLauncher, TerminalHost, TerminalOptions, TerminalSession};

pub const DEBUG_TYPE: &str = "python";
pub const DEBUG_REQUEST: &str = "launch";
pub const DEBUG_CONSOLE: &str = "integratedTerminal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    Terminal,
    Debug,
}

/// Everything needed to start one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub interpreter: PathBuf,
    pub entry_point: PathBuf,
    pub command: String,
    /// Arguments exactly as typed; empty when none were given.
    pub args_text: String,
    pub cwd: PathBuf,
    pub mode: LaunchMode,
}

impl LaunchRequest {
    pub fn new(
        interpreter: &Path,
        entry_point: &Path,
        command: &str,
        args_text: Option<&str>,
        cwd: &Path,
        mode: LaunchMode,
    ) -> Result<Self, String> {
        let command = command.trim();
        if command.is_empty() {
            return Err("Command name is empty".to_string());
        }
        Ok(Self {
            interpreter: interpreter.to_path_buf(),
            entry_point: entry_point.to_path_buf(),
            command: command.to_string(),
            args_text: args_text.unwrap_or_default().to_string(),
            cwd: cwd.to_path_buf(),
            mode,
        })
    }

    pub fn tokens(&self) -> Vec<String> {
        tokenize_args(Some(&self.args_text))
    }

    /// `<interpreter> <entry_point> <command> <args>` as sent to a terminal.
    pub fn terminal_line(&self) -> String {
        format!(
            "{} {} {} {}",
            self.interpreter.display(),
            self.entry_point.display(),
            self.command,
            self.args_text
        )
    }

    pub fn debug_configuration(&self) -> DebugConfiguration {
        let mut args = vec![self.command.clone()];
        args.extend(self.tokens());
        DebugConfiguration {
            name: format!("Django: {}", self.command),
            kind: DEBUG_TYPE.to_string(),
            request: DEBUG_REQUEST.to_string(),
            program: self.entry_point.clone(),
            args,
            console: DEBUG_CONSOLE.to_string(),
            cwd: self.cwd.clone(),
        }
    }
}

/// Split on whitespace; absent or blank input gives no tokens.
pub fn tokenize_args(args_text: Option<&str>) -> Vec<String> {
    args_text
        .map(|text| text.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Terminal
// ---------------------------------------------------------------------------

/// A terminal held for the duration of one run invocation.
///
/// A terminal created for this invocation is disposed when the lease is
/// dropped without a successful [`launch_in_terminal`].
pub struct TerminalLease {
    session: Box<dyn TerminalSession>,
    fresh: bool,
    dispatched: bool,
}

impl TerminalLease {
    /// Whether the terminal was created for this invocation.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Give the terminal back without using it. A terminal created for this
    /// invocation is disposed; a reused one is left alone.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for TerminalLease {
    fn drop(&mut self) {
        if self.fresh && !self.dispatched {
            tracing::debug!("disposing unused terminal");
            self.session.dispose();
        }
    }
}

/// Reuse the active terminal when allowed and present, otherwise create one.
pub fn acquire_terminal(
    host: &mut dyn TerminalHost,
    reuse_existing: bool,
    options: &TerminalOptions,
) -> Result<TerminalLease, String> {
    if reuse_existing && let Some(session) = host.active_terminal() {
        return Ok(TerminalLease { session, fresh: false, dispatched: false });
    }
    let session = host.create_terminal(options)?;
    Ok(TerminalLease { session, fresh: true, dispatched: false })
}

/// Show the leased terminal and send the composed invocation line.
pub fn launch_in_terminal(mut lease: TerminalLease, request: &LaunchRequest) -> Result<(), String> {
    let line = request.terminal_line();
    tracing::info!(%line, "sending command to terminal");
    lease.session.show()?;
    lease.session.send_text(&line)?;
    lease.dispatched = true;
    Ok(())
}

// ---------------------------------------------------------------------------
// Debugger
// ---------------------------------------------------------------------------

/// Start a debug session for `request`. Failures are returned, not retried.
pub fn launch_under_debugger(
    launcher: &mut dyn DebugLauncher,
    request: &LaunchRequest,
) -> Result<(), String> {
    let config = request.debug_configuration();
    tracing::info!(name = %config.name, args = ?config.args, "starting debug session");
    launcher.start_debugging(&request.interpreter, &config)
}
