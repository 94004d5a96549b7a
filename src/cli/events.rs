//! Event CLI commands
//!
//! Lists, shows, exports and purges recorded events.

use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};

use crate::config::settings::MAX_RETENTION_DAYS;
use crate::display::{format_event_details, format_event_list};
use crate::error::{AuditError, AuditResult};
use crate::models::Event;
use crate::storage::Storage;

use super::export::{handle_export, ExportFormat, ExportOptions};

/// Event kind filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindFilter {
    Model,
    Request,
    Unspecified,
}

impl KindFilter {
    fn name(self) -> &'static str {
        match self {
            KindFilter::Model => "model",
            KindFilter::Request => "request",
            KindFilter::Unspecified => "unspecified",
        }
    }
}

/// Event subcommands
#[derive(Subcommand)]
pub enum EventCommands {
    /// List the most recent events
    List {
        /// Only show events of this kind
        #[arg(short, long, value_enum)]
        kind: Option<KindFilter>,
        /// Number of events to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show one event in detail
    Show {
        /// Event ID (full UUID or the short `evt-` form)
        id: String,
    },
    /// Export the event log
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
        /// CSV: one row per field modification
        #[arg(long)]
        modifications: bool,
    },
    /// Delete events older than the given age
    Purge {
        /// Maximum age in days
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_RETENTION_DAYS)))]
        max_age_days: u32,
    },
}

/// Handle an events command
pub fn handle_events_command(storage: &Storage, cmd: EventCommands) -> AuditResult<()> {
    match cmd {
        EventCommands::List { kind, limit } => {
            let events = storage.events.read_all()?;
            let filtered: Vec<Event> = events
                .into_iter()
                .filter(|e| kind.map_or(true, |k| e.kind_name() == k.name()))
                .collect();
            let start = filtered.len().saturating_sub(limit);
            print!("{}", format_event_list(&filtered[start..]));
        }

        EventCommands::Show { id } => {
            let event = find_event(&storage.events.read_all()?, &id)
                .ok_or_else(|| AuditError::entity_not_found("Event", &id))?;
            print!("{}", format_event_details(&event));
        }

        EventCommands::Export {
            format,
            output,
            pretty,
            modifications,
        } => handle_export(
            storage,
            ExportOptions {
                format,
                output,
                pretty,
                modifications,
            },
        )?,

        EventCommands::Purge { max_age_days } => {
            let removed = storage
                .events
                .purge(chrono::Duration::days(i64::from(max_age_days)))?;
            println!(
                "Removed {} events older than {} days",
                removed, max_age_days
            );
        }
    }

    Ok(())
}

fn find_event(events: &[Event], id: &str) -> Option<Event> {
    events.iter().find(|e| e.id.is_named_by(id)).cloned()
}
