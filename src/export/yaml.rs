//! YAML Export functionality
//!
//! Exports the event log to YAML format for human-readable review.

use std::io::Write;

use crate::error::{AuditError, AuditResult};
use crate::export::json::FullExport;
use crate::storage::Storage;

/// Export the full event log to YAML format
pub fn export_full_yaml<W: Write>(storage: &Storage, writer: &mut W) -> AuditResult<()> {
    let export = FullExport::from_storage(storage)?;

    let header = format!(
        "# change-audit event export\n# Generated: {}\n# App Version: {}\n# Events: {}\n\n",
        export.exported_at,
        export.app_version,
        export.events.len()
    );
    writer
        .write_all(header.as_bytes())
        .map_err(|e| AuditError::Export(e.to_string()))?;

    serde_yaml::to_writer(writer, &export).map_err(|e| AuditError::Export(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::json::tests::create_test_storage;

    #[test]
    fn test_yaml_export() {
        let (_temp_dir, storage) = create_test_storage();

        let mut yaml_output = Vec::new();
        export_full_yaml(&storage, &mut yaml_output).unwrap();
        let yaml_string = String::from_utf8(yaml_output).unwrap();

        assert!(yaml_string.starts_with("# change-audit event export"));
        assert!(yaml_string.contains("# Events: 2"));
        assert!(yaml_string.contains("kind: model"));
        assert!(yaml_string.contains("/orders"));
    }

    #[test]
    fn test_yaml_export_parses_back() {
        let (_temp_dir, storage) = create_test_storage();

        let mut yaml_output = Vec::new();
        export_full_yaml(&storage, &mut yaml_output).unwrap();
        let yaml_string = String::from_utf8(yaml_output).unwrap();

        let imported: FullExport = serde_yaml::from_str(&yaml_string).unwrap();
        assert_eq!(imported.events.len(), 2);
        assert_eq!(imported.events[0].as_model().unwrap().entity.label(), "shop.Order");
    }
}
