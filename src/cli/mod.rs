//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the storage layer.

pub mod config;
pub mod events;
pub mod export;
pub mod mirrors;

pub use config::{handle_config_command, ConfigCommands};
pub use events::{handle_events_command, EventCommands};
pub use export::{ExportFormat, ExportOptions};
pub use mirrors::{handle_mirrors_command, MirrorCommands};
