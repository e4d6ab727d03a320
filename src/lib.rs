//! Discover a Django project's management commands and run them from a picker.
//!
//! Host services (picker, terminals, debugger, subprocesses, storage) are
//! reached through the traits in [`host`]; [`session::Session`] drives them.

pub mod catalog;
pub mod config;
pub mod debugger;
pub mod error;
pub mod host;
pub mod launch;
pub mod logging;
pub mod process;
pub mod recents;
pub mod search;
pub mod selection;
pub mod session;
pub mod source;
pub mod state;
pub mod terminal;
pub mod toolchain;
pub mod tui;

pub use catalog::Catalog;
pub use error::PipelineError;
pub use session::{Capabilities, InvocationState, Outcome, Session};
