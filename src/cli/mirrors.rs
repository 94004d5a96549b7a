//! Mirror CLI commands

use clap::Subcommand;

use crate::display::format_mirror_tree;
use crate::error::AuditResult;
use crate::storage::Storage;

/// Mirror subcommands
#[derive(Subcommand)]
pub enum MirrorCommands {
    /// List recorded applications, models and fields
    List,
}

/// Handle a mirrors command
pub fn handle_mirrors_command(storage: &Storage, cmd: MirrorCommands) -> AuditResult<()> {
    match cmd {
        MirrorCommands::List => {
            print!("{}", format_mirror_tree(&storage.events.read_mirrors()?));
        }
    }

    Ok(())
}
