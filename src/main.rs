use anyhow::Result;
use clap::{Parser, Subcommand};

use change_audit::cli::{
    handle_config_command, handle_events_command, handle_mirrors_command, ConfigCommands,
    EventCommands, MirrorCommands,
};
use change_audit::config::AuditPaths;
use change_audit::logging::{init_logging, LogConfig};
use change_audit::storage::{initialize_storage, Storage};

#[derive(Parser)]
#[command(
    name = "change-audit",
    author = "Kaylee Beyene",
    version,
    about = "Inspect and maintain a change-audit event log",
    long_about = "change-audit records model changes, HTTP requests and log messages \
                  as a queryable history. This tool reads that history, exports it \
                  and manages the settings that control what gets recorded."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the audit directory and default settings
    Init,

    /// Settings commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Recorded event commands
    #[command(subcommand, alias = "ev")]
    Events(EventCommands),

    /// Mirror (application/model/field) commands
    #[command(subcommand)]
    Mirrors(MirrorCommands),
}

fn main() -> Result<()> {
    init_logging(&LogConfig::from_env()?)?;

    let cli = Cli::parse();

    let paths = AuditPaths::new()?;
    let storage = Storage::new(paths.clone())?;

    match cli.command {
        Some(Commands::Init) => {
            println!("Initializing change-audit at: {}", paths.base_dir().display());
            if initialize_storage(&paths)? {
                println!("Initialization complete!");
            } else {
                println!("Already initialized.");
            }
        }
        Some(Commands::Config(cmd)) => handle_config_command(&storage, cmd)?,
        Some(Commands::Events(cmd)) => handle_events_command(&storage, cmd)?,
        Some(Commands::Mirrors(cmd)) => handle_mirrors_command(&storage, cmd)?,
        None => {
            println!("change-audit v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Run 'change-audit --help' for usage information.");
            println!("Run 'change-audit events list' to see recent events.");
        }
    }

    Ok(())
}
