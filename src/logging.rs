//! Tracing subscriber setup. Logs go to stderr so stdout stays clean for
//! `list`, `recent` and printed launch configurations.

use tracing_subscriber::EnvFilter;

/// Env var holding per-target filter directives, e.g. `django_commands_lib=debug`.
pub const LOG_ENV: &str = "DJANGO_COMMANDS_LOG";

/// Filter used when `LOG_ENV` is unset or invalid.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "django_commands_lib=debug,django_commands=debug,info" } else { "warn" }
}

pub fn build_filter(env_value: Option<&str>, verbose: bool) -> EnvFilter {
    env_value
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber. Safe to call more than once; later calls are
/// ignored.
pub fn init(verbose: bool) {
    let env_value = std::env::var(LOG_ENV).ok();
    let filter = build_filter(env_value.as_deref(), verbose);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}
