//! Capabilities the pipeline consumes from its host.
//!
//! The session never touches a terminal, a debugger or the filesystem
//! directly; everything goes through these traits so the binary can wire in
//! real implementations and tests can wire in fakes.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::process::{ProcessError, ProcessOutput};

// ---------------------------------------------------------------------------
// Persistent state
// ---------------------------------------------------------------------------

/// String-keyed JSON store that survives across sessions.
pub trait StateStore {
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Replace the value under `key` and persist it immediately.
    fn update(&mut self, key: &str, value: serde_json::Value) -> Result<(), String>;
}

// ---------------------------------------------------------------------------
// Interpreter discovery
// ---------------------------------------------------------------------------

/// Reply shapes a toolchain integration may give for the active interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpreterResponse {
    /// Current API: a direct path to the interpreter.
    Modern { path: PathBuf },
    /// Older API: the full execution command; the interpreter is its first element.
    Legacy { exec_command: Vec<String> },
}

impl InterpreterResponse {
    pub fn interpreter_path(&self) -> Option<PathBuf> {
        match self {
            Self::Modern { path } if !path.as_os_str().is_empty() => Some(path.clone()),
            Self::Modern { .. } => None,
            Self::Legacy { exec_command } => exec_command
                .first()
                .filter(|first| !first.is_empty())
                .map(PathBuf::from),
        }
    }
}

pub trait ToolchainDiscovery {
    fn is_active(&self) -> bool;

    fn activate(&mut self) -> Result<(), String>;

    /// `None` when the integration answered with neither known shape.
    fn active_interpreter(&self) -> Option<InterpreterResponse>;
}

// ---------------------------------------------------------------------------
// Filesystem search and process execution
// ---------------------------------------------------------------------------

pub trait FileSearch {
    /// Find up to `limit` files under `root` whose root-relative path matches
    /// `pattern`, skipping any that match one of `exclude`.
    fn find_files(
        &self,
        root: &Path,
        pattern: &str,
        exclude: &[String],
        limit: usize,
    ) -> Result<Vec<PathBuf>, String>;
}

pub trait ProcessRunner {
    /// Run `program` to completion, capturing stdout and stderr.
    fn run(&self, program: &Path, args: &[&str], cwd: &Path) -> Result<ProcessOutput, ProcessError>;
}

// ---------------------------------------------------------------------------
// User prompts
// ---------------------------------------------------------------------------

/// One row in the command picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickItem {
    /// Section heading. Never selectable.
    Separator { label: String },
    /// A command; `group` is the originating app label or `"recent"`.
    Command { label: String, group: String },
}

impl PickItem {
    pub fn label(&self) -> &str {
        match self {
            Self::Separator { label } | Self::Command { label, .. } => label,
        }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, Self::Separator { .. })
    }
}

pub trait Picker {
    /// Show `items` and return the index of the chosen one, or `None` when the
    /// user dismissed the picker.
    fn pick(&mut self, items: &[PickItem], placeholder: &str) -> Result<Option<usize>, String>;
}

pub trait InputBox {
    /// Ask for free text. `None` means the prompt was dismissed.
    fn prompt(&mut self, prompt: &str, placeholder: &str) -> Result<Option<String>, String>;
}

// ---------------------------------------------------------------------------
// Terminals and debugger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalOptions {
    pub name: String,
    pub cwd: PathBuf,
    /// Keep the session out of sight until `show` is called.
    pub hidden: bool,
    /// Leave input focus where it is when the session is shown.
    pub preserve_focus: bool,
}

pub trait TerminalSession {
    fn show(&mut self) -> Result<(), String>;

    fn send_text(&mut self, line: &str) -> Result<(), String>;

    fn dispose(&mut self);
}

pub trait TerminalHost {
    /// The terminal the user is currently looking at, if the host has one.
    fn active_terminal(&mut self) -> Option<Box<dyn TerminalSession>>;

    fn create_terminal(&mut self, options: &TerminalOptions)
    -> Result<Box<dyn TerminalSession>, String>;
}

/// Debug launch configuration, serialized in the editor `launch.json` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugConfiguration {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub request: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub console: String,
    pub cwd: PathBuf,
}

pub trait DebugLauncher {
    fn start_debugging(
        &mut self,
        interpreter: &Path,
        config: &DebugConfiguration,
    ) -> Result<(), String>;
}
