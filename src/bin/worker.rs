//! Nimbus worker entry point
//!
//! Mirrors the main binary's discipline: parse arguments, delegate, print
//! errors, exit non-zero on failure.

use std::path::PathBuf;

use clap::Parser;

/// Nimbus sidecar execution worker
#[derive(Parser, Debug)]
#[command(name = "nimbus-worker")]
#[command(version, about, long_about = None)]
struct WorkerCli {
    /// Path to the configuration file shared with the host
    #[arg(long, default_value = "./nimbus.json")]
    config: PathBuf,
}

fn main() {
    let cli = WorkerCli::parse();
    if let Err(e) = nimbus::worker::run(&cli.config) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
