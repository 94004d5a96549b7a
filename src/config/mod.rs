//! Configuration module for change-audit
//!
//! - XDG-compliant path resolution
//! - Settings loading (JSON or YAML) with defaults and the global scope merge
//! - Atomic settings snapshots for concurrent readers

pub mod paths;
pub mod settings;

pub use paths::AuditPaths;
pub use settings::{ConfigHandle, Module, PayloadDirection, Settings};
