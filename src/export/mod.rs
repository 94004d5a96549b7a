//! Export module for change-audit
//!
//! Provides event log export in multiple formats:
//! - CSV: one row per event, or one row per field modification
//! - JSON: machine-readable full export with mirrors
//! - YAML: human-readable full export with mirrors

pub mod csv;
pub mod json;
pub mod yaml;

pub use self::csv::{export_events_csv, export_modifications_csv, write_events_csv};
pub use json::{export_full_json, FullExport, EXPORT_SCHEMA_VERSION};
pub use yaml::export_full_yaml;
