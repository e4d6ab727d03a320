use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";
pub const STATE_FILE: &str = "state.json";

/// Get the config directory using platform-appropriate location.
///
/// - macOS: `~/Library/Application Support/django-commands/`
/// - Linux: `~/.config/django-commands/` (or `$XDG_CONFIG_HOME`)
/// - Windows: `%APPDATA%/django-commands/`
///
/// Falls back to `~/.django-commands/` if platform dir is unavailable.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("django-commands"))
        .unwrap_or_else(fallback_dotdir)
}

fn fallback_dotdir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".django-commands")
}

/// Load a JSON config file, returning Default if missing or corrupt.
/// Corrupt or unreadable files are logged so a silent reset is visible.
pub fn load_json_config<T: DeserializeOwned + Default>(dir: &Path, filename: &str) -> T {
    let path = dir.join(filename);
    if !path.exists() {
        return T::default();
    }
    let content = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Could not read config {}: {e}", path.display());
            return T::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Corrupt config {}: {e}. Using defaults.", path.display());
            T::default()
        }
    }
}

/// Save a JSON config file atomically (temp file + rename).
/// Sets 0600 permissions on Unix.
pub fn save_json_config<T: Serialize>(dir: &Path, filename: &str, config: &T) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create config directory: {e}"))?;

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {e}"))?;

    let target = dir.join(filename);
    let temp = dir.join(format!("{}.tmp.{}", filename, std::process::id()));

    std::fs::write(&temp, &json)
        .map_err(|e| format!("Failed to write temp config: {e}"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&temp, perms)
            .map_err(|e| format!("Failed to set config permissions: {e}"))?;
    }

    // Either the old file or the new file exists, never a partial one
    std::fs::rename(&temp, &target).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        format!("Failed to commit config: {e}")
    })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Upper bound of the recently-used command list
    #[serde(default = "default_max_recent")]
    pub max_recent_commands: usize,
    /// Show the recent section at the top of the picker
    #[serde(default = "default_true")]
    pub show_recent_commands: bool,
    /// Open a fresh terminal for every run instead of reusing the active one
    #[serde(default = "default_true")]
    pub always_open_new_terminal: bool,
    #[serde(default = "default_terminal_name")]
    pub terminal_name: String,
    /// Explicit interpreter; skips environment detection
    #[serde(default)]
    pub python_path: Option<PathBuf>,
    /// Full interpreter command line (e.g. `["/opt/py/bin/python3", "-X", "dev"]`)
    #[serde(default)]
    pub python_exec_command: Option<Vec<String>>,
    #[serde(default = "default_entry_point_name")]
    pub entry_point_name: String,
    /// Globs excluded from the entry-point search
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    /// Address debugpy listens on
    #[serde(default = "default_debug_listen")]
    pub debug_listen: String,
    #[serde(default = "default_true")]
    pub debug_wait_for_client: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_recent() -> usize {
    5
}

fn default_terminal_name() -> String {
    "Django Commands".to_string()
}

fn default_entry_point_name() -> String {
    "manage.py".to_string()
}

fn default_exclude() -> Vec<String> {
    vec!["**/node_modules/**".to_string()]
}

fn default_debug_listen() -> String {
    "127.0.0.1:5678".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_recent_commands: default_max_recent(),
            show_recent_commands: true,
            always_open_new_terminal: true,
            terminal_name: default_terminal_name(),
            python_path: None,
            python_exec_command: None,
            entry_point_name: default_entry_point_name(),
            exclude: default_exclude(),
            debug_listen: default_debug_listen(),
            debug_wait_for_client: true,
        }
    }
}

pub fn load_settings(dir: &Path) -> Settings {
    load_json_config(dir, SETTINGS_FILE)
}

pub fn save_settings(dir: &Path, settings: &Settings) -> Result<(), String> {
    save_json_config(dir, SETTINGS_FILE, settings)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn settings_round_trip() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            max_recent_commands: 8,
            show_recent_commands: false,
            always_open_new_terminal: false,
            terminal_name: "manage".to_string(),
            python_path: Some(PathBuf::from("/srv/venv/bin/python")),
            python_exec_command: None,
            entry_point_name: "manage.py".to_string(),
            exclude: vec!["**/node_modules/**".to_string(), "**/.tox/**".to_string()],
            debug_listen: "0.0.0.0:5679".to_string(),
            debug_wait_for_client: false,
        };
        save_settings(dir.path(), &settings).unwrap();
        let loaded = load_settings(dir.path());
        assert_eq!(loaded, settings);
    }

    #[test]
    fn settings_serde_default_for_missing_fields() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), r#"{"max_recent_commands": 3}"#).unwrap();
        let loaded = load_settings(dir.path());
        assert_eq!(loaded.max_recent_commands, 3);
        assert!(loaded.show_recent_commands);
        assert!(loaded.always_open_new_terminal);
        assert_eq!(loaded.terminal_name, "Django Commands");
        assert_eq!(loaded.entry_point_name, "manage.py");
        assert_eq!(loaded.exclude, vec!["**/node_modules/**".to_string()]);
        assert_eq!(loaded.debug_listen, "127.0.0.1:5678");
        assert!(loaded.python_path.is_none());
    }

    #[test]
    fn missing_file_returns_default() {
        let dir = TempDir::new().unwrap();
        let loaded = load_settings(dir.path());
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn corrupt_file_returns_default() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), "{not json").unwrap();
        let loaded = load_settings(dir.path());
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn save_json_config_creates_directory_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        save_json_config(&nested, "x.json", &serde_json::json!({"k": 1})).unwrap();
        assert!(nested.join("x.json").exists());
        let leftovers: Vec<_> = fs::read_dir(&nested)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn save_json_config_sets_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        save_json_config(dir.path(), "perms.json", &Settings::default()).unwrap();
        let mode = fs::metadata(dir.path().join("perms.json")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn config_dir_ends_with_app_name() {
        let dir = config_dir();
        let name = dir.file_name().unwrap().to_string_lossy().to_string();
        assert!(name == "django-commands" || name == ".django-commands");
    }
}
