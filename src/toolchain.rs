//! Python interpreter discovery.
//!
//! Plays the part of an editor's Python integration: it knows about explicit
//! settings, the activated virtualenv, project-local virtualenvs and the
//! interpreters on `PATH`, and answers with an [`InterpreterResponse`].

use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::host::{InterpreterResponse, ToolchainDiscovery};

/// Project-local virtualenv directory names, probed in order.
const PROJECT_VENV_DIRS: &[&str] = &[".venv", "venv", "env"];

/// Interpreter names looked up on PATH, probed in order.
const PATH_INTERPRETERS: &[&str] = &["python3", "python"];

/// Interpreter inside a virtualenv root.
fn venv_interpreter(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}

pub struct PythonToolchain {
    project_root: PathBuf,
    python_path: Option<PathBuf>,
    exec_command: Option<Vec<String>>,
    /// Detection result, filled by `activate`.
    detected: Option<Option<InterpreterResponse>>,
}

impl PythonToolchain {
    pub fn new(project_root: &Path, settings: &Settings) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            python_path: settings.python_path.clone(),
            exec_command: settings.python_exec_command.clone(),
            detected: None,
        }
    }

    fn detect(&self) -> Option<InterpreterResponse> {
        if let Some(path) = &self.python_path {
            tracing::debug!(path = %path.display(), "using configured interpreter");
            return Some(InterpreterResponse::Modern { path: path.clone() });
        }

        if let Some(exec_command) = &self.exec_command {
            tracing::debug!(?exec_command, "using configured exec command");
            return Some(InterpreterResponse::Legacy {
                exec_command: exec_command.clone(),
            });
        }

        if let Some(venv) = std::env::var_os("VIRTUAL_ENV") {
            let candidate = venv_interpreter(Path::new(&venv));
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "using activated virtualenv");
                return Some(InterpreterResponse::Modern { path: candidate });
            }
            tracing::warn!(
                "VIRTUAL_ENV points at {} but it has no interpreter",
                Path::new(&venv).display()
            );
        }

        for dir in PROJECT_VENV_DIRS {
            let candidate = venv_interpreter(&self.project_root.join(dir));
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "using project virtualenv");
                return Some(InterpreterResponse::Modern { path: candidate });
            }
        }

        PATH_INTERPRETERS
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(|path| {
                tracing::debug!(path = %path.display(), "using interpreter from PATH");
                InterpreterResponse::Modern { path }
            })
    }
}

impl ToolchainDiscovery for PythonToolchain {
    fn is_active(&self) -> bool {
        self.detected.is_some()
    }

    fn activate(&mut self) -> Result<(), String> {
        if !self.project_root.is_dir() {
            return Err(format!(
                "Project root does not exist: {}",
                self.project_root.display()
            ));
        }
        self.detected = Some(self.detect());
        Ok(())
    }

    fn active_interpreter(&self) -> Option<InterpreterResponse> {
        self.detected.clone().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn make_venv(root: &Path) -> PathBuf {
        let python = venv_interpreter(root);
        fs::create_dir_all(python.parent().unwrap()).unwrap();
        fs::write(&python, "").unwrap();
        python
    }

    fn activated(root: &Path, settings: &Settings) -> PythonToolchain {
        let mut toolchain = PythonToolchain::new(root, settings);
        toolchain.activate().unwrap();
        toolchain
    }

    #[test]
    fn inactive_until_activated() {
        let dir = TempDir::new().unwrap();
        let toolchain = PythonToolchain::new(dir.path(), &Settings::default());
        assert!(!toolchain.is_active());
        assert!(toolchain.active_interpreter().is_none());
    }

    #[test]
    fn activation_fails_for_missing_project() {
        let mut toolchain =
            PythonToolchain::new(Path::new("/nonexistent/project-12345"), &Settings::default());
        assert!(toolchain.activate().is_err());
        assert!(!toolchain.is_active());
    }

    #[test]
    fn configured_path_wins() {
        let dir = TempDir::new().unwrap();
        make_venv(&dir.path().join(".venv"));
        let settings = Settings {
            python_path: Some(PathBuf::from("/opt/python/bin/python3")),
            ..Settings::default()
        };
        let toolchain = activated(dir.path(), &settings);
        assert_eq!(
            toolchain.active_interpreter(),
            Some(InterpreterResponse::Modern {
                path: PathBuf::from("/opt/python/bin/python3")
            })
        );
    }

    #[test]
    fn exec_command_answers_with_legacy_shape() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            python_exec_command: Some(vec!["/usr/bin/python3.12".to_string()]),
            ..Settings::default()
        };
        let toolchain = activated(dir.path(), &settings);
        assert_eq!(
            toolchain.active_interpreter(),
            Some(InterpreterResponse::Legacy {
                exec_command: vec!["/usr/bin/python3.12".to_string()]
            })
        );
    }

    #[test]
    #[serial]
    fn activated_virtualenv_beats_project_venv() {
        let dir = TempDir::new().unwrap();
        make_venv(&dir.path().join(".venv"));
        let active = TempDir::new().unwrap();
        let expected = make_venv(active.path());

        // SAFETY: serialised with every other test that touches VIRTUAL_ENV.
        unsafe { std::env::set_var("VIRTUAL_ENV", active.path()) };
        let toolchain = activated(dir.path(), &Settings::default());
        unsafe { std::env::remove_var("VIRTUAL_ENV") };

        assert_eq!(
            toolchain.active_interpreter(),
            Some(InterpreterResponse::Modern { path: expected })
        );
    }

    #[test]
    #[serial]
    fn finds_project_virtualenv() {
        let dir = TempDir::new().unwrap();
        let expected = make_venv(&dir.path().join("venv"));

        unsafe { std::env::remove_var("VIRTUAL_ENV") };
        let toolchain = activated(dir.path(), &Settings::default());

        assert_eq!(
            toolchain.active_interpreter(),
            Some(InterpreterResponse::Modern { path: expected })
        );
    }

    #[test]
    #[serial]
    fn stale_virtual_env_is_skipped() {
        let dir = TempDir::new().unwrap();
        let expected = make_venv(&dir.path().join(".venv"));

        unsafe { std::env::set_var("VIRTUAL_ENV", "/nonexistent/venv-12345") };
        let toolchain = activated(dir.path(), &Settings::default());
        unsafe { std::env::remove_var("VIRTUAL_ENV") };

        assert_eq!(
            toolchain.active_interpreter(),
            Some(InterpreterResponse::Modern { path: expected })
        );
    }
}
