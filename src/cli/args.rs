//! CLI argument definitions using clap
//!
//! Commands:
//! - nimbus init --config <path>
//! - nimbus serve --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Nimbus - A self-hostable cloud-functions engine
#[derive(Parser, Debug)]
#[command(name = "nimbus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default config file and bootstrap the definition schema
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./nimbus.json")]
        config: PathBuf,
    },

    /// Start the Nimbus server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./nimbus.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
