use std::fmt;

use crate::process::ProcessError;

/// Failures that abort a run, debug or reload invocation.
///
/// Dismissing a prompt is not an error; it surfaces as a cancelled outcome.
#[derive(Debug)]
pub enum PipelineError {
    /// No Python interpreter could be resolved.
    InterpreterMissing,
    /// No entry-point script was found in the project.
    EntryPointMissing { name: String },
    /// The interpreter could not produce the command catalog.
    ProcessFailure(ProcessError),
    /// A host capability (terminal, debugger, picker, store) failed.
    Capability(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InterpreterMissing => write!(f, "Unable to determine Python interpreter."),
            Self::EntryPointMissing { name } => write!(f, "No {name} found in workspace."),
            Self::ProcessFailure(e) => write!(f, "Failed to list management commands: {e}"),
            Self::Capability(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ProcessFailure(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProcessError> for PipelineError {
    fn from(e: ProcessError) -> Self {
        Self::ProcessFailure(e)
    }
}

impl From<PipelineError> for String {
    fn from(e: PipelineError) -> String {
        e.to_string()
    }
}
