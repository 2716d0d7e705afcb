//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;

/// Record microphone takes, review them and play back saved recordings
#[derive(Parser)]
#[command(name = "recdeck")]
#[command(version)]
#[command(
    long_about = "Record microphone takes, review them before saving and play back saved\nrecordings with a progress view.\n\nDEFAULT COMMAND:\n    If no command is specified, 'record' is used by default.\n\nEXAMPLES:\n    # Record a take with a title\n    $ recdeck record -t \"Standup notes\"\n\n    # Finish a running recording from another program\n    $ pkill -USR1 recdeck\n\n    # Play recording #3\n    $ recdeck play 3"
)]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/recdeck/recdeck.toml\n    Recordings:         ~/.local/share/recdeck\n    Logs:               ~/.local/state/recdeck/recdeck.log.*"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a take, review it and save it (default)
    ///
    /// Space pauses and resumes, Enter finishes, Escape/q cancels.
    /// While reviewing: s saves, p previews, r records again, q discards.
    /// Sending SIGUSR1 finishes the recording like Enter.
    #[command(visible_alias = "r")]
    Record {
        /// Title to save the recording under
        #[arg(short, long)]
        title: Option<String>,
    },

    /// List saved recordings, newest first
    #[command(visible_alias = "ls")]
    List,

    /// Play a saved recording
    ///
    /// Space plays/pauses, arrow keys skip, s stops, d deletes, q quits.
    #[command(visible_alias = "p")]
    Play {
        /// Recording ID as shown by 'recdeck list'
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// Delete a saved recording
    #[command(visible_alias = "rm")]
    Delete {
        /// Recording ID as shown by 'recdeck list'
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in recdeck.toml.
    Devices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Open configuration file in your preferred editor
    ///
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   recdeck completions bash > recdeck.bash
    ///   recdeck completions zsh > _recdeck
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't need logging
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "recdeck", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::Devices) => return commands::handle_devices(),
        Some(Commands::Logs) => return commands::handle_logs(),
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        None => commands::handle_record(None).await,
        Some(Commands::Record { title }) => commands::handle_record(title).await,
        Some(Commands::List) => commands::handle_list().await,
        Some(Commands::Play { id }) => commands::handle_play(id).await,
        Some(Commands::Delete { id }) => commands::handle_delete(id).await,
        Some(Commands::Config) => commands::handle_config(),
        Some(Commands::Completions { .. }) | Some(Commands::Devices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }
}
