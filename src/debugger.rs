//! Debug session launchers.

use std::io::Write;
use std::path::Path;
use std::process::Command;

use crate::host::{DebugConfiguration, DebugLauncher};

/// Runs the program under `debugpy`, listening for a DAP client.
pub struct DebugpyLauncher {
    listen: String,
    wait_for_client: bool,
}

impl DebugpyLauncher {
    pub fn new(listen: &str, wait_for_client: bool) -> Self {
        Self {
            listen: listen.to_string(),
            wait_for_client,
        }
    }

    /// `-m debugpy --listen <addr> [--wait-for-client] <program> <args...>`
    pub fn interpreter_args(&self, config: &DebugConfiguration) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            "debugpy".to_string(),
            "--listen".to_string(),
            self.listen.clone(),
        ];
        if self.wait_for_client {
            args.push("--wait-for-client".to_string());
        }
        args.push(config.program.to_string_lossy().to_string());
        args.extend(config.args.iter().cloned());
        args
    }
}

impl DebugLauncher for DebugpyLauncher {
    fn start_debugging(&mut self, interpreter: &Path, config: &DebugConfiguration) -> Result<(), String> {
        let args = self.interpreter_args(config);
        if self.wait_for_client {
            eprintln!("{}: waiting for debugger on {}", config.name, self.listen);
        }
        tracing::debug!(interpreter = %interpreter.display(), ?args, "starting debugpy");

        let status = Command::new(interpreter)
            .args(&args)
            .current_dir(&config.cwd)
            .env("PYTHONIOENCODING", "utf-8")
            .status()
            .map_err(|e| format!("Failed to start {}: {e}", interpreter.display()))?;

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(format!(
                "{} exited with code {code} (is debugpy installed in this environment?)",
                config.name
            )),
            None => Err(format!("{} was terminated by a signal", config.name)),
        }
    }
}

/// Prints the launch configuration as JSON for an external debugger client.
pub struct LaunchConfigPrinter<W: Write> {
    out: W,
}

impl<W: Write> LaunchConfigPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DebugLauncher for LaunchConfigPrinter<W> {
    fn start_debugging(&mut self, interpreter: &Path, config: &DebugConfiguration) -> Result<(), String> {
        let mut value =
            serde_json::to_value(config).map_err(|e| format!("Failed to serialize launch configuration: {e}"))?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "python".to_string(),
                serde_json::Value::String(interpreter.to_string_lossy().to_string()),
            );
        }
        let text = serde_json::to_string_pretty(&value)
            .map_err(|e| format!("Failed to serialize launch configuration: {e}"))?;
        writeln!(self.out, "{text}").map_err(|e| format!("Failed to write launch configuration: {e}"))
    }
}
