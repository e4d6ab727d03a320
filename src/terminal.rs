//! Terminals for dispatched commands.
//!
//! The "active" terminal is the tty the CLI was started from: a line sent to it
//! runs through the user's shell with inherited stdio. New terminals are login
//! shells on their own PTY; they stay detached until shown, and
//! [`PtyTerminalHost::attach_shown`] hands the tty to them once dispatch is done.

use std::io::{IsTerminal, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};

use crate::host::{TerminalHost, TerminalOptions, TerminalSession};

/// Get the platform-appropriate default shell.
pub(crate) fn default_shell() -> String {
    #[cfg(windows)]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "powershell.exe".to_string())
    }
    #[cfg(not(windows))]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
    }
}

/// Build a login-shell CommandBuilder with platform-appropriate flags.
pub(crate) fn build_shell_command(shell: &str, options: &TerminalOptions) -> CommandBuilder {
    let mut cmd = CommandBuilder::new(shell);
    #[cfg(not(windows))]
    cmd.arg("-l");
    #[cfg(not(windows))]
    {
        cmd.env("TERM", std::env::var("TERM").unwrap_or_else(|_| "xterm-256color".to_string()));
        if let Ok(lang) = std::env::var("LANG") {
            cmd.env("LANG", lang);
        } else {
            cmd.env("LANG", "en_US.UTF-8");
        }
    }
    cmd.env("DJANGO_COMMANDS_TERMINAL", &options.name);
    cmd.cwd(&options.cwd);
    cmd
}

/// How the command line is handed to the shell for the inline terminal.
fn shell_exec_flag(shell: &str) -> &'static str {
    let lower = shell.to_ascii_lowercase();
    if lower.ends_with("cmd.exe") || lower.ends_with("cmd") {
        "/C"
    } else if lower.contains("powershell") || lower.contains("pwsh") {
        "-Command"
    } else {
        "-c"
    }
}

// ---------------------------------------------------------------------------
// Inline terminal
// ---------------------------------------------------------------------------

/// The controlling tty. Each line runs to completion before `send_text`
/// returns.
pub struct InlineTerminal {
    shell: String,
}

impl TerminalSession for InlineTerminal {
    fn show(&mut self) -> Result<(), String> {
        std::io::stdout()
            .flush()
            .map_err(|e| format!("Failed to flush terminal: {e}"))
    }

    fn send_text(&mut self, line: &str) -> Result<(), String> {
        let status = std::process::Command::new(&self.shell)
            .arg(shell_exec_flag(&self.shell))
            .arg(line)
            .status()
            .map_err(|e| format!("Failed to start {}: {e}", self.shell))?;
        if !status.success() {
            tracing::warn!(%status, "command exited unsuccessfully");
        }
        Ok(())
    }

    fn dispose(&mut self) {}
}

// ---------------------------------------------------------------------------
// PTY terminal
// ---------------------------------------------------------------------------

/// Disables raw mode on drop. A no-op when stdin is not a tty.
struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    fn enable() -> Result<Self, String> {
        if !std::io::stdin().is_terminal() {
            return Ok(Self { enabled: false });
        }
        enable_raw_mode().map_err(|e| format!("Failed to enter raw mode: {e}"))?;
        Ok(Self { enabled: true })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            let _ = disable_raw_mode();
        }
    }
}

/// A shell running on its own PTY.
pub(crate) struct PtyShell {
    name: String,
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    reader: Mutex<Option<Box<dyn Read + Send>>>,
    child: Mutex<Box<dyn Child + Send + Sync>>,
}

impl PtyShell {
    fn spawn(shell: &str, options: &TerminalOptions) -> Result<Self, String> {
        let pair = native_pty_system()
            .openpty(current_size())
            .map_err(|e| format!("Failed to open PTY: {e}"))?;

        let child = pair
            .slave
            .spawn_command(build_shell_command(shell, options))
            .map_err(|e| format!("Failed to spawn shell: {e}"))?;
        // Only the child keeps the slave side open, so reads hit EOF on exit.
        drop(pair.slave);

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| format!("Failed to get PTY writer: {e}"))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| format!("Failed to get PTY reader: {e}"))?;

        tracing::debug!(name = %options.name, cwd = %options.cwd.display(), "spawned terminal");
        Ok(Self {
            name: options.name.clone(),
            master: Mutex::new(pair.master),
            writer: Mutex::new(writer),
            reader: Mutex::new(Some(reader)),
            child: Mutex::new(child),
        })
    }

    fn write(&self, bytes: &[u8]) -> Result<(), String> {
        let mut writer = self.writer.lock();
        writer
            .write_all(bytes)
            .and_then(|_| writer.flush())
            .map_err(|e| format!("Failed to write to terminal {}: {e}", self.name))
    }

    /// Pump the PTY to stdout and stdin to the PTY until the shell exits.
    fn attach(self: &Arc<Self>) -> Result<(), String> {
        let mut reader = self
            .reader
            .lock()
            .take()
            .ok_or_else(|| format!("Terminal {} is already attached", self.name))?;

        if let Err(e) = self.master.lock().resize(current_size()) {
            tracing::debug!("PTY resize failed: {e}");
        }
        let _raw = RawModeGuard::enable()?;

        let output = std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            let mut stdout = std::io::stdout();
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if stdout.write_all(&buf[..n]).and_then(|_| stdout.flush()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        // The stdin pump blocks in read(); it is left behind when the shell exits.
        {
            let shell = Arc::clone(self);
            std::thread::spawn(move || {
                let mut buf = [0u8; 1024];
                let mut stdin = std::io::stdin();
                while let Ok(n) = stdin.read(&mut buf) {
                    if n == 0 || shell.write(&buf[..n]).is_err() {
                        break;
                    }
                }
            });
        }

        let status = self
            .child
            .lock()
            .wait()
            .map_err(|e| format!("Failed to wait for terminal {}: {e}", self.name))?;
        let _ = output.join();
        tracing::debug!(name = %self.name, success = status.success(), "terminal exited");
        Ok(())
    }

    /// Ctrl-C, a short grace period, then kill.
    fn terminate(&self) {
        let _ = self.write(&[0x03]);
        let mut child = self.child.lock();
        let deadline = Instant::now() + Duration::from_millis(100);
        loop {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(10)),
                _ => break,
            }
        }
        if let Err(e) = child.kill() {
            tracing::debug!(name = %self.name, "kill failed: {e}");
        }
    }
}

fn current_size() -> PtySize {
    let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
    PtySize {
        rows: rows.max(24),
        cols: cols.max(80),
        pixel_width: 0,
        pixel_height: 0,
    }
}

type ShownList = Arc<Mutex<Vec<Arc<PtyShell>>>>;

pub struct PtyTerminal {
    shell: Arc<PtyShell>,
    shown: ShownList,
}

impl TerminalSession for PtyTerminal {
    fn show(&mut self) -> Result<(), String> {
        let mut shown = self.shown.lock();
        if !shown.iter().any(|s| Arc::ptr_eq(s, &self.shell)) {
            shown.push(Arc::clone(&self.shell));
        }
        Ok(())
    }

    fn send_text(&mut self, line: &str) -> Result<(), String> {
        self.shell.write(format!("{line}\r").as_bytes())
    }

    fn dispose(&mut self) {
        self.shown.lock().retain(|s| !Arc::ptr_eq(s, &self.shell));
        self.shell.terminate();
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Clones share the list of shown terminals.
#[derive(Clone)]
pub struct PtyTerminalHost {
    shell: String,
    inline_available: bool,
    shown: ShownList,
}

impl PtyTerminalHost {
    /// `shell` overrides `$SHELL`.
    pub fn new(shell: Option<String>) -> Self {
        Self {
            shell: shell.unwrap_or_else(default_shell),
            inline_available: std::io::stdin().is_terminal() && std::io::stdout().is_terminal(),
            shown: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Hand the tty to every terminal shown during dispatch, in order.
    pub fn attach_shown(&mut self) -> Result<(), String> {
        let shells = std::mem::take(&mut *self.shown.lock());
        for shell in shells {
            shell.attach()?;
        }
        Ok(())
    }
}

impl TerminalHost for PtyTerminalHost {
    fn active_terminal(&mut self) -> Option<Box<dyn TerminalSession>> {
        if !self.inline_available {
            return None;
        }
        Some(Box::new(InlineTerminal { shell: self.shell.clone() }))
    }

    fn create_terminal(&mut self, options: &TerminalOptions) -> Result<Box<dyn TerminalSession>, String> {
        if !options.preserve_focus {
            tracing::debug!("terminal focus is managed by attach_shown");
        }
        let shell = PtyShell::spawn(&self.shell, options)?;
        Ok(Box::new(PtyTerminal {
            shell: Arc::new(shell),
            shown: Arc::clone(&self.shown),
        }))
    }
}
