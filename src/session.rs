//! The per-project context every operation runs against.
//!
//! A [`Session`] owns the catalog, the recency list and the cached entry point
//! and interpreter, together with the host [`Capabilities`]. Operations take
//! `&mut self`, so one invocation always finishes before the next starts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::config::Settings;
use crate::error::PipelineError;
use crate::host::{
    DebugLauncher, FileSearch, InputBox, Picker, ProcessRunner, StateStore, TerminalHost,
    TerminalOptions, ToolchainDiscovery,
};
use crate::launch::{self, LaunchMode, LaunchRequest};
use crate::recents::RecencyTracker;
use crate::selection;
use crate::source;
use crate::state::CATALOG_CACHE_KEY;

pub const ARGS_PLACEHOLDER: &str = "Enter arguments";

/// Host capabilities injected into a session.
pub struct Capabilities {
    pub store: Box<dyn StateStore>,
    /// `None` when no toolchain integration is installed.
    pub toolchain: Option<Box<dyn ToolchainDiscovery>>,
    pub search: Box<dyn FileSearch>,
    pub process: Box<dyn ProcessRunner>,
    pub picker: Box<dyn Picker>,
    pub input: Box<dyn InputBox>,
    pub terminals: Box<dyn TerminalHost>,
    pub debugger: Box<dyn DebugLauncher>,
}

/// Where a run or debug invocation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Idle,
    AwaitingEntryPoint,
    AwaitingSelection,
    AwaitingArguments,
    Dispatched,
}

/// How a run or debug invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Dispatched(LaunchRequest),
    /// A prompt was dismissed; nothing was launched.
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogCache {
    entry_point: PathBuf,
    catalog: Catalog,
}

pub struct Session {
    settings: Settings,
    project_root: PathBuf,
    caps: Capabilities,
    entry_point: Option<PathBuf>,
    interpreter: Option<PathBuf>,
    catalog: Catalog,
    recents: RecencyTracker,
    state: InvocationState,
}

impl Session {
    /// Build a session and restore the recency list from the store.
    pub fn new(settings: Settings, project_root: &Path, caps: Capabilities) -> Self {
        let recents = RecencyTracker::load(caps.store.as_ref(), settings.max_recent_commands);
        Self {
            settings,
            project_root: project_root.to_path_buf(),
            caps,
            entry_point: None,
            interpreter: None,
            catalog: Catalog::new(),
            recents,
            state: InvocationState::Idle,
        }
    }

    /// The current catalog.
    pub fn list(&self) -> &Catalog {
        &self.catalog
    }

    /// Recently used commands, most recent first.
    pub fn recent(&self) -> Vec<String> {
        self.recents.current_list()
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    pub fn entry_point(&self) -> Option<&Path> {
        self.entry_point.as_deref()
    }

    pub fn interpreter(&self) -> Option<&Path> {
        self.interpreter.as_deref()
    }

    fn transition(&mut self, next: InvocationState) {
        tracing::debug!(from = ?self.state, to = ?next, "invocation state");
        self.state = next;
    }

    // -----------------------------------------------------------------------
    // Catalog lifecycle
    // -----------------------------------------------------------------------

    /// Resolve interpreter and entry point, then restore the cached catalog or
    /// fetch a fresh one. On error the session stays usable with whatever
    /// catalog it had.
    pub fn activate(&mut self) -> Result<(), PipelineError> {
        let (interpreter, entry_point) = self.ensure_ready()?;

        if let Some(cached) = self.cached_catalog(&entry_point) {
            tracing::debug!(
                groups = cached.group_count(),
                "restored cached catalog for {}",
                entry_point.display()
            );
            self.catalog = cached;
            return Ok(());
        }

        self.refresh_catalog(&interpreter, &entry_point)
    }

    /// Re-fetch the catalog and clear the recency list. A failed fetch keeps
    /// the previous catalog and the recency list untouched.
    pub fn reload(&mut self) -> Result<(), PipelineError> {
        let (interpreter, entry_point) = self.ensure_ready()?;
        self.refresh_catalog(&interpreter, &entry_point)?;
        if let Err(e) = self.recents.clear(self.caps.store.as_mut()) {
            tracing::warn!("{e}");
        }
        Ok(())
    }

    fn refresh_catalog(&mut self, interpreter: &Path, entry_point: &Path) -> Result<(), PipelineError> {
        let catalog = source::fetch_catalog(
            self.caps.process.as_ref(),
            interpreter,
            entry_point,
            &self.project_root,
        )?;
        if catalog.is_empty() {
            tracing::warn!("{} help listed no commands", entry_point.display());
        }
        self.catalog = catalog;
        self.save_catalog_cache(entry_point);
        Ok(())
    }

    fn cached_catalog(&self, entry_point: &Path) -> Option<Catalog> {
        let value = self.caps.store.get(CATALOG_CACHE_KEY)?;
        match serde_json::from_value::<CatalogCache>(value) {
            Ok(cache) if cache.entry_point == entry_point => Some(cache.catalog),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Ignoring malformed {CATALOG_CACHE_KEY}: {e}");
                None
            }
        }
    }

    fn save_catalog_cache(&mut self, entry_point: &Path) {
        let cache = CatalogCache {
            entry_point: entry_point.to_path_buf(),
            catalog: self.catalog.clone(),
        };
        let result = serde_json::to_value(&cache)
            .map_err(|e| format!("Failed to serialize catalog cache: {e}"))
            .and_then(|value| self.caps.store.update(CATALOG_CACHE_KEY, value));
        if let Err(e) = result {
            tracing::warn!("{e}");
        }
    }

    /// Interpreter (resolved once per session) and entry point (re-located
    /// when the cached path has disappeared).
    fn ensure_ready(&mut self) -> Result<(PathBuf, PathBuf), PipelineError> {
        let interpreter = match &self.interpreter {
            Some(path) => path.clone(),
            None => {
                let toolchain = self
                    .caps
                    .toolchain
                    .as_mut()
                    .map(|t| t.as_mut() as &mut dyn ToolchainDiscovery);
                let path = source::resolve_interpreter(toolchain)?;
                self.interpreter = Some(path.clone());
                path
            }
        };

        let entry_point = source::locate_entry_point(
            self.entry_point.as_deref(),
            &self.project_root,
            &self.settings.entry_point_name,
            &self.settings.exclude,
            self.caps.search.as_ref(),
        )?;
        self.entry_point = Some(entry_point.clone());

        Ok((interpreter, entry_point))
    }

    // -----------------------------------------------------------------------
    // Run / debug
    // -----------------------------------------------------------------------

    fn remember(&mut self, command: &str) {
        if let Err(e) = self.recents.record(command, self.caps.store.as_mut()) {
            tracing::warn!("{e}");
        }
    }

    /// Picker, then argument prompt. `None` when either was dismissed.
    fn choose_command(&mut self) -> Result<Option<(String, String)>, PipelineError> {
        self.transition(InvocationState::AwaitingSelection);
        let recents = self.recents.current_list();
        let Some(command) = selection::present(
            self.caps.picker.as_mut(),
            &self.catalog,
            &recents,
            self.settings.show_recent_commands,
        )
        .map_err(PipelineError::Capability)?
        else {
            return Ok(None);
        };
        self.remember(&command);

        self.transition(InvocationState::AwaitingArguments);
        let prompt = format!("Arguments for: {command}");
        let Some(args) = self
            .caps
            .input
            .prompt(&prompt, ARGS_PLACEHOLDER)
            .map_err(PipelineError::Capability)?
        else {
            return Ok(None);
        };

        Ok(Some((command, args)))
    }

    fn terminal_options(&self) -> TerminalOptions {
        TerminalOptions {
            name: self.settings.terminal_name.clone(),
            cwd: self.project_root.clone(),
            hidden: true,
            preserve_focus: true,
        }
    }

    fn finish(&mut self, result: Result<Outcome, PipelineError>) -> Result<Outcome, PipelineError> {
        match &result {
            Ok(Outcome::Dispatched(_)) => self.transition(InvocationState::Dispatched),
            _ => self.transition(InvocationState::Idle),
        }
        result
    }

    /// Pick a command and send it to a terminal.
    pub fn run(&mut self) -> Result<Outcome, PipelineError> {
        let result = self.run_interactive();
        self.finish(result)
    }

    fn run_interactive(&mut self) -> Result<Outcome, PipelineError> {
        self.transition(InvocationState::AwaitingEntryPoint);
        let (interpreter, entry_point) = self.ensure_ready()?;
        let options = self.terminal_options();
        let lease = launch::acquire_terminal(
            self.caps.terminals.as_mut(),
            !self.settings.always_open_new_terminal,
            &options,
        )
        .map_err(PipelineError::Capability)?;

        let (command, args) = match self.choose_command() {
            Ok(Some(choice)) => choice,
            Ok(None) => {
                lease.release();
                return Ok(Outcome::Cancelled);
            }
            Err(e) => {
                lease.release();
                return Err(e);
            }
        };

        let request = LaunchRequest::new(
            &interpreter,
            &entry_point,
            &command,
            Some(&args),
            &self.project_root,
            LaunchMode::Terminal,
        )
        .map_err(PipelineError::Capability)?;
        launch::launch_in_terminal(lease, &request).map_err(PipelineError::Capability)?;
        Ok(Outcome::Dispatched(request))
    }

    /// Pick a command and start it under the debugger.
    pub fn debug(&mut self) -> Result<Outcome, PipelineError> {
        let result = self.debug_interactive();
        self.finish(result)
    }

    fn debug_interactive(&mut self) -> Result<Outcome, PipelineError> {
        self.transition(InvocationState::AwaitingEntryPoint);
        let (interpreter, entry_point) = self.ensure_ready()?;

        let Some((command, args)) = self.choose_command()? else {
            return Ok(Outcome::Cancelled);
        };

        let request = LaunchRequest::new(
            &interpreter,
            &entry_point,
            &command,
            Some(&args),
            &self.project_root,
            LaunchMode::Debug,
        )
        .map_err(PipelineError::Capability)?;
        launch::launch_under_debugger(self.caps.debugger.as_mut(), &request)
            .map_err(PipelineError::Capability)?;
        Ok(Outcome::Dispatched(request))
    }

    /// Launch a named command without prompting.
    pub fn run_command(&mut self, command: &str, args: Option<&str>) -> Result<Outcome, PipelineError> {
        let result = self.launch_named(command, args, LaunchMode::Terminal);
        self.finish(result)
    }

    /// Debug a named command without prompting.
    pub fn debug_command(&mut self, command: &str, args: Option<&str>) -> Result<Outcome, PipelineError> {
        let result = self.launch_named(command, args, LaunchMode::Debug);
        self.finish(result)
    }

    fn launch_named(
        &mut self,
        command: &str,
        args: Option<&str>,
        mode: LaunchMode,
    ) -> Result<Outcome, PipelineError> {
        self.transition(InvocationState::AwaitingEntryPoint);
        let (interpreter, entry_point) = self.ensure_ready()?;
        let request = LaunchRequest::new(&interpreter, &entry_point, command, args, &self.project_root, mode)
            .map_err(PipelineError::Capability)?;

        if !self.catalog.is_empty() && !self.catalog.contains_command(&request.command) {
            tracing::warn!("{} is not in the command catalog", request.command);
        }
        self.remember(&request.command);

        match mode {
            LaunchMode::Terminal => {
                let options = self.terminal_options();
                let lease = launch::acquire_terminal(
                    self.caps.terminals.as_mut(),
                    !self.settings.always_open_new_terminal,
                    &options,
                )
                .map_err(PipelineError::Capability)?;
                launch::launch_in_terminal(lease, &request).map_err(PipelineError::Capability)?;
            }
            LaunchMode::Debug => {
                launch::launch_under_debugger(self.caps.debugger.as_mut(), &request)
                    .map_err(PipelineError::Capability)?;
            }
        }
        Ok(Outcome::Dispatched(request))
    }
}
