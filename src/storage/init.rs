//! Storage initialization
//!
//! Handles first-run setup: the base directory and a default settings file.

use crate::config::{AuditPaths, Settings};
use crate::error::{AuditError, AuditResult};

/// Initialize storage for a fresh installation
///
/// Returns `true` when a settings file was written.
pub fn initialize_storage(paths: &AuditPaths) -> AuditResult<bool> {
    paths.ensure_directories()?;

    let settings_file = paths.settings_file();
    if settings_file.exists() {
        return Ok(false);
    }

    let contents = serde_json::to_string_pretty(&Settings::default())
        .map_err(|e| AuditError::Json(format!("Failed to serialize settings: {}", e)))?;
    std::fs::write(&settings_file, contents).map_err(|e| {
        AuditError::Io(format!(
            "Failed to write {}: {}",
            settings_file.display(),
            e
        ))
    })?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_initialize_writes_default_settings_once() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AuditPaths::with_base_dir(temp_dir.path().join("audit"));

        assert!(initialize_storage(&paths).unwrap());
        assert!(paths.settings_file().exists());
        assert!(!initialize_storage(&paths).unwrap());

        let settings = Settings::load(&paths.settings_file()).unwrap();
        assert_eq!(settings.request.exclude.status, Settings::default().request.exclude.status);
    }
}
