//! JSON Export functionality
//!
//! Exports the event log and its mirrors to JSON format with schema
//! versioning.

use std::collections::HashSet;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AuditError, AuditResult};
use crate::models::{Event, EventKind, MirrorSet};
use crate::storage::Storage;

/// Current export schema version
pub const EXPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Full event log export structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullExport {
    /// Schema version for compatibility checking
    pub schema_version: String,

    /// Export timestamp
    pub exported_at: DateTime<Utc>,

    /// Application version that created the export
    pub app_version: String,

    /// All events, oldest first
    pub events: Vec<Event>,

    /// Application, model and field mirrors
    pub mirrors: MirrorSet,

    /// Export metadata
    pub metadata: ExportMetadata,
}

/// Export metadata for reference
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub model_event_count: usize,
    pub request_event_count: usize,
    pub unspecified_event_count: usize,

    /// Creation time of the oldest event
    pub earliest_event: Option<DateTime<Utc>>,

    /// Creation time of the newest event
    pub latest_event: Option<DateTime<Utc>>,
}

impl ExportMetadata {
    fn from_events(events: &[Event]) -> Self {
        let mut metadata = Self {
            earliest_event: events.iter().map(|e| e.created_at).min(),
            latest_event: events.iter().map(|e| e.created_at).max(),
            ..Self::default()
        };

        for event in events {
            match event.kind {
                EventKind::Model(_) => metadata.model_event_count += 1,
                EventKind::Request(_) => metadata.request_event_count += 1,
                EventKind::Unspecified(_) => metadata.unspecified_event_count += 1,
            }
        }

        metadata
    }
}

impl FullExport {
    pub fn new(events: Vec<Event>, mirrors: MirrorSet) -> Self {
        Self {
            schema_version: EXPORT_SCHEMA_VERSION.to_string(),
            exported_at: Utc::now(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            metadata: ExportMetadata::from_events(&events),
            events,
            mirrors,
        }
    }

    /// Create a new full export from storage
    pub fn from_storage(storage: &Storage) -> AuditResult<Self> {
        let export = Self::new(storage.events.read_all()?, storage.events.read_mirrors()?);
        if let Err(problem) = export.validate() {
            warn!(%problem, "Exporting an event log with missing mirrors");
        }
        Ok(export)
    }

    /// Check that every model event points at known mirrors
    pub fn validate(&self) -> Result<(), String> {
        let models: HashSet<_> = self.mirrors.models.iter().map(|m| m.id).collect();
        let fields: HashSet<_> = self.mirrors.fields.iter().map(|f| f.id).collect();

        for event in &self.events {
            let Some(model) = event.as_model() else {
                continue;
            };

            if !models.contains(&model.entity.model) {
                return Err(format!(
                    "Event {} references unknown model {}",
                    event.id, model.entity.model
                ));
            }

            let field_ids = model
                .modifications
                .iter()
                .map(|m| m.field)
                .chain(model.relationships.iter().map(|r| r.field));
            for field in field_ids {
                if !fields.contains(&field) {
                    return Err(format!(
                        "Event {} references unknown field {}",
                        event.id, field
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Export the full event log to JSON
pub fn export_full_json<W: Write>(
    storage: &Storage,
    writer: &mut W,
    pretty: bool,
) -> AuditResult<()> {
    let export = FullExport::from_storage(storage)?;

    if pretty {
        serde_json::to_writer_pretty(writer, &export)
    } else {
        serde_json::to_writer(writer, &export)
    }
    .map_err(|e| AuditError::Export(e.to_string()))?;

    Ok(())
}
