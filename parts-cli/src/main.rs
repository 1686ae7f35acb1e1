//! parts: device settings glue for Xiaomi msm8996 devices.
//!
//! # Usage
//!
//! ```text
//! parts init [--force]
//! parts boot [--no-service] [--json]
//! parts show [--json]
//! parts set <key> <value> [--no-service]
//! parts pocket [--apply] [--no-service] [--json]
//! parts search [--packages <file>] [--json]
//! parts key event <scan-code> [--key-code N] [--screen-off] [--setup-incomplete]
//! parts key swap|disable [on|off]
//! parts doze show|enable <bool>|set <key> <bool>
//! parts daemon start|stop|status
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    boot::BootArgs, daemon::DaemonCommand, doze::DozeCommand, init::InitArgs, key::KeyCommand,
    pocket::PocketArgs, search::SearchArgs, set::SetArgs, show::ShowArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "parts",
    version,
    about = "Sync device settings with kernel control nodes",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the built-in device profile to ~/.parts/profile.yaml.
    Init(InitArgs),

    /// Run the boot sequence: restore preferences to nodes.
    Boot(BootArgs),

    /// Show the button settings screen (read-only).
    Show(ShowArgs),

    /// Change one button setting.
    Set(SetArgs),

    /// Show or apply the pocket-mode decision.
    Pocket(PocketArgs),

    /// Print the search-index view (hidden keys, indexable screens).
    Search(SearchArgs),

    /// HOME key decisions and touch-panel key nodes.
    Key {
        #[command(subcommand)]
        command: KeyCommand,
    },

    /// Ambient display settings.
    Doze {
        #[command(subcommand)]
        command: DozeCommand,
    },

    /// Manage the service host daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    parts_daemon::init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Boot(args) => args.run(),
        Commands::Show(args) => args.run(),
        Commands::Set(args) => args.run(),
        Commands::Pocket(args) => args.run(),
        Commands::Search(args) => args.run(),
        Commands::Key { command } => commands::key::run(command),
        Commands::Doze { command } => commands::doze::run(command),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
