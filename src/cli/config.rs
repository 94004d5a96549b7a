//! Configuration CLI commands
//!
//! Shows the effective settings, validates settings files and writes the
//! default settings on first run.

use std::path::PathBuf;

use clap::Subcommand;

use crate::config::{Module, Settings};
use crate::error::AuditResult;
use crate::storage::{initialize_storage, Storage};

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show paths and the effective settings
    Show,
    /// Validate a settings file without using it
    Check {
        /// Path to a JSON or YAML settings file
        path: PathBuf,
    },
    /// Write the default settings file if none exists
    Init,
}

/// Handle a config command
pub fn handle_config_command(storage: &Storage, cmd: ConfigCommands) -> AuditResult<()> {
    match cmd {
        ConfigCommands::Show => {
            let paths = storage.paths();
            let settings = storage.settings()?;

            println!("change-audit Configuration");
            println!("==========================");
            println!("Base directory: {}", paths.base_dir().display());
            println!(
                "Settings file:  {}{}",
                paths.settings_file().display(),
                if storage.is_initialized() {
                    ""
                } else {
                    " (not present, using defaults)"
                }
            );
            println!("Event log:      {}", paths.events_file().display());
            println!("Mirrors:        {}", paths.mirrors_file().display());
            println!();
            print!("{}", settings.to_yaml()?);
        }

        ConfigCommands::Check { path } => {
            let settings = Settings::load(&path)?;
            let modules: Vec<&str> = [
                (Module::Request, "request"),
                (Module::Model, "model"),
                (Module::Unspecified, "unspecified"),
            ]
            .into_iter()
            .filter(|(module, _)| settings.is_enabled(*module))
            .map(|(_, name)| name)
            .collect();

            println!("{} is valid", path.display());
            println!("  Modules: {}", modules.join(", "));
            println!(
                "  Model exclusions: {} applications, {} models, {} fields",
                settings.model.exclude.applications.len(),
                settings.model.exclude.models.len(),
                settings.model.exclude.fields.len()
            );
            println!(
                "  Request exclusions: {} applications, {} methods, {} status codes",
                settings.request.exclude.applications.len(),
                settings.request.exclude.methods.len(),
                settings.request.exclude.status.len()
            );
            if let Some(days) = settings.retention.max_age_days {
                println!("  Retention: {} days", days);
            }
        }

        ConfigCommands::Init => {
            let paths = storage.paths();
            if initialize_storage(paths)? {
                println!("Wrote default settings to {}", paths.settings_file().display());
            } else {
                println!(
                    "Settings already present at {}",
                    paths.settings_file().display()
                );
            }
        }
    }

    Ok(())
}
