//! CLI argument parsing for the takeoff-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "takeoff-worker", about = "Takeoff CSV import worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Check a takeoff CSV without importing it; prints the result as JSON
    Validate {
        /// Path to the CSV file
        file: PathBuf,
    },
}
