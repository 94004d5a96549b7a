//! Storage layer for change-audit
//!
//! Provides the [`EventSink`] contract the pipeline writes to, an in-memory
//! sink, and the JSONL file store with atomic rewrites and retention.

pub mod file_io;
pub mod init;
pub mod jsonl;
pub mod sink;

pub use file_io::{read_json, write_json_atomic};
pub use init::initialize_storage;
pub use jsonl::JsonlStore;
pub use sink::{EventSink, MemorySink};

use crate::audit::MirrorRegistry;
use crate::config::{AuditPaths, Settings};
use crate::error::AuditResult;

/// Main storage coordinator: settings and the event store under one base
/// directory
pub struct Storage {
    paths: AuditPaths,
    pub events: JsonlStore,
}

impl Storage {
    /// Create a new Storage instance
    pub fn new(paths: AuditPaths) -> AuditResult<Self> {
        paths.ensure_directories()?;

        Ok(Self {
            events: JsonlStore::open(&paths),
            paths,
        })
    }

    /// Get the paths configuration
    pub fn paths(&self) -> &AuditPaths {
        &self.paths
    }

    /// Effective settings, defaults when no settings file exists
    pub fn settings(&self) -> AuditResult<Settings> {
        Settings::load_or_default(&self.paths.settings_file())
    }

    /// Mirror registry continuing from the persisted mirrors
    pub fn mirror_registry(&self) -> AuditResult<MirrorRegistry> {
        Ok(MirrorRegistry::from_set(self.events.read_mirrors()?))
    }

    /// Check if storage has been initialized (has a settings file)
    pub fn is_initialized(&self) -> bool {
        self.paths.settings_file().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_creation() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AuditPaths::with_base_dir(temp_dir.path().join("audit"));
        let storage = Storage::new(paths).unwrap();

        assert!(temp_dir.path().join("audit").exists());
        assert!(!storage.is_initialized());
        assert!(storage.settings().unwrap().is_enabled(crate::config::Module::Model));
        assert!(storage.mirror_registry().unwrap().snapshot().unwrap().is_empty());
    }
}
