//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Engagement tracker.
///
/// Turns outgoing-message activity into per-contact engagement sessions,
/// finalizes them after a minute of inactivity and delivers them to a
/// configured endpoint.
#[derive(Debug, Parser)]
#[command(name = "et", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track sessions from activity events read as JSON lines on stdin.
    ///
    /// Badge updates are written to stdout as JSON lines. After stdin closes
    /// the tracker keeps running until every live session has been finalized.
    Run {
        /// Finalize all live sessions when interrupted instead of keeping them.
        #[arg(long)]
        flush_on_exit: bool,
    },

    /// Show the aggregate duration of live sessions.
    Status {
        /// Output as JSON badge message.
        #[arg(long)]
        json: bool,
    },

    /// List live sessions.
    Sessions {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Drop a contact's live session without delivering it.
    Clear {
        /// The contact whose session to drop.
        contact: String,
    },

    /// Finalize and deliver every live session now.
    Flush,

    /// Configure the delivery endpoint and operator label.
    Configure {
        /// Endpoint that receives finalized sessions.
        #[arg(long, conflicts_with = "clear_endpoint")]
        endpoint: Option<String>,

        /// Remove the configured endpoint, disabling delivery.
        #[arg(long)]
        clear_endpoint: bool,

        /// Operator label stamped on new sessions.
        #[arg(long)]
        operator: Option<String>,
    },
}
