//! Where the catalog comes from: the project's entry-point script, the
//! interpreter that runs it, and the `help` invocation that lists commands.

use std::path::{Path, PathBuf};

use crate::catalog::{self, Catalog};
use crate::error::PipelineError;
use crate::host::{FileSearch, ProcessRunner, ToolchainDiscovery};

/// Argument that makes the entry point print its grouped command list.
pub const HELP_ARG: &str = "help";

/// Find the entry point. A cached path that still exists skips the search.
pub fn locate_entry_point(
    cached: Option<&Path>,
    project_root: &Path,
    name: &str,
    exclude: &[String],
    search: &dyn FileSearch,
) -> Result<PathBuf, PipelineError> {
    if let Some(path) = cached
        && path.is_file()
    {
        return Ok(path.to_path_buf());
    }

    let pattern = format!("**/{name}");
    let found = search
        .find_files(project_root, &pattern, exclude, 1)
        .map_err(|e| {
            tracing::warn!("Entry-point search failed: {e}");
            PipelineError::EntryPointMissing { name: name.to_string() }
        })?;

    match found.into_iter().next() {
        Some(path) => {
            tracing::debug!(path = %path.display(), "located entry point");
            Ok(path)
        }
        None => Err(PipelineError::EntryPointMissing { name: name.to_string() }),
    }
}

/// Ask the toolchain integration for the active interpreter, activating it
/// once if needed.
pub fn resolve_interpreter(
    toolchain: Option<&mut dyn ToolchainDiscovery>,
) -> Result<PathBuf, PipelineError> {
    let Some(toolchain) = toolchain else {
        tracing::warn!("No toolchain integration available");
        return Err(PipelineError::InterpreterMissing);
    };

    if !toolchain.is_active()
        && let Err(e) = toolchain.activate()
    {
        tracing::warn!("Toolchain activation failed: {e}");
        return Err(PipelineError::InterpreterMissing);
    }

    toolchain
        .active_interpreter()
        .and_then(|response| response.interpreter_path())
        .ok_or(PipelineError::InterpreterMissing)
}

/// Run `<interpreter> <entry_point> help` in `cwd` and parse its stdout.
/// Failures are returned as-is; there is no retry.
pub fn fetch_catalog(
    process: &dyn ProcessRunner,
    interpreter: &Path,
    entry_point: &Path,
    cwd: &Path,
) -> Result<Catalog, PipelineError> {
    if interpreter.as_os_str().is_empty() {
        return Err(PipelineError::InterpreterMissing);
    }
    if !entry_point.is_file() {
        return Err(PipelineError::EntryPointMissing {
            name: entry_point
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| entry_point.display().to_string()),
        });
    }

    let entry_arg = entry_point.to_string_lossy();
    let output = process.run(interpreter, &[entry_arg.as_ref(), HELP_ARG], cwd)?;
    Ok(catalog::parse(&output.stdout))
}
