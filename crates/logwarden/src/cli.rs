//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "logwarden")]
#[command(version, about = "Safe concurrent access to process log files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (.toml, .yaml, .yml or .json)
    #[arg(long, global = true, env = "LOGWARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rename a log to its backup name, replacing any older backup
    Backup {
        /// Log file
        file: PathBuf,

        /// Skip the backup if this log was already backed up in this session
        #[arg(long)]
        once: bool,
    },

    /// Create an empty log file
    Create {
        /// Log file
        file: PathBuf,
    },

    /// Delete a log file
    Delete {
        /// Log file
        file: PathBuf,
    },

    /// Move a log onto another, backing up the destination first
    Move {
        /// Log file to move
        source: PathBuf,
        /// Destination log file
        target: PathBuf,
    },

    /// Print a log file
    Cat(CatArgs),

    /// Append lines to a log file
    Append {
        /// Log file
        file: PathBuf,

        /// Lines to append
        #[arg(required = true)]
        lines: Vec<String>,
    },

    /// Follow a chunked process log until the process ends
    Watch(WatchArgs),

    /// Show or update key=value settings stored in a file
    Props(PropsArgs),
}

#[derive(Args)]
pub struct CatArgs {
    /// Log file
    pub file: PathBuf,

    /// Only show lines matching this regex
    #[arg(long)]
    pub grep: Option<String>,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Process log file
    pub file: PathBuf,

    /// Poll interval in milliseconds (defaults to the configured interval)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(Args)]
pub struct PropsArgs {
    /// Properties file
    pub file: PathBuf,

    /// Set a property (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Remove a property (repeatable)
    #[arg(long = "unset", value_name = "KEY")]
    pub unset: Vec<String>,
}
