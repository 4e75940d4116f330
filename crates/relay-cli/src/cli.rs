use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "relay", about = "Multi-tenant feature-flag relay proxy", version)]
pub struct Cli {
    /// Path to the relay's INI configuration file.
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load configuration, bring up every configured environment, and serve
    /// the relay's HTTP surface until terminated.
    Serve {
        /// How long to wait for every environment to report ready before
        /// giving up and exiting non-zero.
        #[arg(long, default_value_t = 10)]
        startup_timeout_secs: u64,
    },

    /// Load and validate configuration without starting the server.
    ValidateConfig,
}
