//! Path management for change-audit
//!
//! ## Path Resolution Order
//!
//! 1. `CHANGE_AUDIT_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/change-audit` or `~/.config/change-audit`
//! 3. Windows: `%APPDATA%\change-audit`

use std::path::{Path, PathBuf};

use crate::error::{AuditError, AuditResult};

/// Environment variable overriding the base directory
pub const DIR_ENV_VAR: &str = "CHANGE_AUDIT_DIR";

/// Locations of the configuration, event log and mirror file
#[derive(Debug, Clone)]
pub struct AuditPaths {
    base_dir: PathBuf,
}

impl AuditPaths {
    /// Resolve the base directory from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if no home or application data directory can be
    /// determined.
    pub fn new() -> AuditResult<Self> {
        let base_dir = match std::env::var(DIR_ENV_VAR) {
            Ok(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Use a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The settings file: `config.yaml` when present, otherwise `config.json`
    pub fn settings_file(&self) -> PathBuf {
        for name in ["config.yaml", "config.yml"] {
            let candidate = self.base_dir.join(name);
            if candidate.exists() {
                return candidate;
            }
        }
        self.base_dir.join("config.json")
    }

    /// Append-only event log
    pub fn events_file(&self) -> PathBuf {
        self.base_dir.join("events.jsonl")
    }

    /// Application, model and field mirrors
    pub fn mirrors_file(&self) -> PathBuf {
        self.base_dir.join("mirrors.json")
    }

    /// Ensure the base directory exists
    pub fn ensure_directories(&self) -> AuditResult<()> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| AuditError::Io(format!("Failed to create base directory: {}", e)))
    }
}

#[cfg(not(windows))]
fn resolve_default_path() -> AuditResult<PathBuf> {
    let config_base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => {
            let home = std::env::var("HOME")
                .map_err(|_| AuditError::Config("HOME environment variable not set".into()))?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(config_base.join("change-audit"))
}

#[cfg(windows)]
fn resolve_default_path() -> AuditResult<PathBuf> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| AuditError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("change-audit"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AuditPaths::with_base_dir(temp_dir.path());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.events_file(), temp_dir.path().join("events.jsonl"));
        assert_eq!(paths.mirrors_file(), temp_dir.path().join("mirrors.json"));
    }

    #[test]
    fn test_env_var_override() {
        let temp_dir = TempDir::new().unwrap();
        env::set_var(DIR_ENV_VAR, temp_dir.path());

        let paths = AuditPaths::new().unwrap();
        assert_eq!(paths.base_dir(), temp_dir.path());

        env::remove_var(DIR_ENV_VAR);
    }

    #[test]
    fn test_settings_file_prefers_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AuditPaths::with_base_dir(temp_dir.path());
        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));

        std::fs::write(temp_dir.path().join("config.yaml"), "modules: [model]\n").unwrap();
        assert_eq!(paths.settings_file(), temp_dir.path().join("config.yaml"));
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AuditPaths::with_base_dir(temp_dir.path().join("nested"));

        paths.ensure_directories().unwrap();
        assert!(paths.base_dir().exists());
    }
}
