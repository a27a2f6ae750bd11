use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "lockbox",
    about = "Encrypted keyed storage for sensitive byte blobs",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Encrypt a value and store it under an identifier.
    Save {
        id: String,
        /// Value to store; read from `--file` or stdin when absent.
        value: Option<String>,
        /// Read the value from this file instead.
        #[arg(long, conflicts_with = "value")]
        file: Option<PathBuf>,
    },
    /// Decrypt and print the value stored under an identifier.
    Load {
        id: String,
        /// Write the value to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Remove the value stored under an identifier.
    Delete { id: String },
    /// Store a value unencrypted.
    SaveRaw { key: String, value: String },
    /// Print an unencrypted value.
    LoadRaw { key: String },
    /// GET a URL and print the raw response body.
    Fetch { url: String },
    /// POST a body to a URL and print the raw response body.
    Post { url: String, body: String },
    /// Run a save/load/delete round trip against the encrypted store.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version and exit.
    Version,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
