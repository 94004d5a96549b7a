//! CSV Export functionality
//!
//! Exports events (one row each) and field modifications (one row per
//! changed field) to CSV format.

use std::io::Write;

use crate::error::{AuditError, AuditResult};
use crate::models::{Event, EventKind};
use crate::storage::Storage;

const EVENT_HEADER: [&str; 9] = [
    "ID",
    "Created",
    "Kind",
    "User",
    "Operation",
    "Target",
    "Status",
    "Level",
    "Summary",
];

const MODIFICATION_HEADER: [&str; 8] = [
    "Event ID",
    "Created",
    "Entity",
    "Key",
    "Field",
    "Operation",
    "Previous",
    "Current",
];

fn export_error(e: csv::Error) -> AuditError {
    AuditError::Export(e.to_string())
}

/// One CSV row per event
fn event_row(event: &Event) -> [String; 9] {
    let (user, operation, target, status, level) = match &event.kind {
        EventKind::Model(model) => (
            model.user.clone(),
            model.operation.to_string(),
            format!("{} #{}", model.entity.label(), model.entity.primary_key),
            String::new(),
            String::new(),
        ),
        EventKind::Request(request) => (
            request.user.clone(),
            request.method.clone(),
            request.uri.clone(),
            request.status.to_string(),
            String::new(),
        ),
        EventKind::Unspecified(log) => (
            None,
            String::new(),
            log.file.clone().unwrap_or_default(),
            String::new(),
            log.level.to_string(),
        ),
    };

    [
        event.id.to_string(),
        event.created_at.to_rfc3339(),
        event.kind_name().to_string(),
        user.unwrap_or_default(),
        operation,
        target,
        status,
        level,
        event.summary(),
    ]
}

/// Write events to CSV
pub fn write_events_csv<W: Write>(events: &[Event], writer: W) -> AuditResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(EVENT_HEADER).map_err(export_error)?;

    for event in events {
        csv_writer.write_record(event_row(event)).map_err(export_error)?;
    }

    csv_writer
        .flush()
        .map_err(|e| AuditError::Export(e.to_string()))
}

/// Write every field modification of every model event to CSV
pub fn write_modifications_csv<W: Write>(events: &[Event], writer: W) -> AuditResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(MODIFICATION_HEADER)
        .map_err(export_error)?;

    for event in events {
        let Some(model) = event.as_model() else {
            continue;
        };

        for modification in &model.modifications {
            csv_writer
                .write_record([
                    event.id.to_string(),
                    event.created_at.to_rfc3339(),
                    model.entity.label(),
                    model.entity.primary_key.clone(),
                    modification.field_name.clone(),
                    modification.operation.to_string(),
                    modification.previous.clone().unwrap_or_default(),
                    modification.current.clone().unwrap_or_default(),
                ])
                .map_err(export_error)?;
        }
    }

    csv_writer
        .flush()
        .map_err(|e| AuditError::Export(e.to_string()))
}

/// Export all stored events to CSV
pub fn export_events_csv<W: Write>(storage: &Storage, writer: W) -> AuditResult<()> {
    write_events_csv(&storage.events.read_all()?, writer)
}

/// Export all stored field modifications to CSV
pub fn export_modifications_csv<W: Write>(storage: &Storage, writer: W) -> AuditResult<()> {
    write_modifications_csv(&storage.events.read_all()?, writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::json::tests::create_test_storage;

    fn read_rows(output: Vec<u8>) -> Vec<csv::StringRecord> {
        let mut reader = csv::Reader::from_reader(output.as_slice());
        reader.records().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_events_csv() {
        let (_temp_dir, storage) = create_test_storage();
        let mut output = Vec::new();
        export_events_csv(&storage, &mut output).unwrap();

        let text = String::from_utf8(output.clone()).unwrap();
        assert!(text.starts_with("ID,Created,Kind,User,Operation,Target,Status,Level,Summary"));

        let rows = read_rows(output);
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "model");
        assert_eq!(&rows[0][3], "alice");
        assert_eq!(&rows[0][4], "CREATE");
        assert_eq!(&rows[0][5], "shop.Order #1");
        assert_eq!(&rows[1][2], "request");
        assert_eq!(&rows[1][6], "201");
    }

    #[test]
    fn test_modifications_csv_quotes_values() {
        let (_temp_dir, storage) = create_test_storage();
        let mut output = Vec::new();
        export_modifications_csv(&storage, &mut output).unwrap();

        let text = String::from_utf8(output.clone()).unwrap();
        assert!(text.contains("\"paid, finally\""));

        let rows = read_rows(output);
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][4], "status");
        assert_eq!(&rows[0][6], "");
        assert_eq!(&rows[0][7], "paid, finally");
    }

    #[test]
    fn test_empty_log() {
        let mut output = Vec::new();
        write_events_csv(&[], &mut output).unwrap();
        assert_eq!(read_rows(output).len(), 0);
    }
}
