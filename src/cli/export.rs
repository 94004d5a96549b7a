//! Event log export
//!
//! Writes the event log in CSV, JSON or YAML to a file or to stdout.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::ValueEnum;

use crate::error::{AuditError, AuditResult};
use crate::export::{csv, json, yaml};
use crate::storage::Storage;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// CSV format (one row per event)
    Csv,
    /// JSON format (events and mirrors)
    Json,
    /// YAML format (events and mirrors, human-readable)
    Yaml,
}

/// Options of `events export`
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub output: Option<PathBuf>,
    pub pretty: bool,
    /// CSV only: one row per field modification instead of per event
    pub modifications: bool,
}

/// Run an export
pub fn handle_export(storage: &Storage, options: ExportOptions) -> AuditResult<()> {
    match options.output {
        Some(ref output) => {
            let file = File::create(output).map_err(|e| {
                AuditError::Export(format!(
                    "Failed to create file {}: {}",
                    output.display(),
                    e
                ))
            })?;
            let mut writer = BufWriter::new(file);
            write_export(storage, &options, &mut writer)?;
            writer
                .flush()
                .map_err(|e| AuditError::Export(e.to_string()))?;

            let count = storage.events.entry_count()?;
            eprintln!("Exported {} events to: {}", count, output.display());
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_export(storage, &options, &mut writer)?;
        }
    }

    Ok(())
}

fn write_export<W: Write>(
    storage: &Storage,
    options: &ExportOptions,
    writer: &mut W,
) -> AuditResult<()> {
    match options.format {
        ExportFormat::Csv if options.modifications => {
            csv::export_modifications_csv(storage, writer)
        }
        ExportFormat::Csv => csv::export_events_csv(storage, writer),
        ExportFormat::Json => json::export_full_json(storage, writer, options.pretty),
        ExportFormat::Yaml => yaml::export_full_yaml(storage, writer),
    }
}
