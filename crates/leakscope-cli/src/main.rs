//! CLI tool for leakscope captures.
//!
//! Analyzes captures written by `Session::save_capture` outside the test
//! that produced them.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser)]
#[command(name = "cargo-leakscope")]
#[command(bin_name = "cargo leakscope")]
#[command(about = "Leaked task inspector", long_about = None)]
#[command(version)]
enum Cli {
    #[command(subcommand)]
    Leakscope(Commands),
}

#[derive(Parser)]
enum Commands {
    /// Report tasks in a capture that never terminated
    Analyze {
        /// Path to a saved capture
        capture: PathBuf,

        /// Extra task name suffixes to ignore (repeatable)
        #[arg(long = "allow", value_name = "PATTERN")]
        allow: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Fail unless exactly this many tasks leaked
        #[arg(long, value_name = "N")]
        expect: Option<usize>,
    },

    /// Dump the decoded event table
    Events {
        /// Path to a saved capture
        capture: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli::Leakscope(cmd) = Cli::parse();

    match cmd {
        Commands::Analyze {
            capture,
            allow,
            json,
            expect,
        } => commands::analyze(&capture, &allow, json, expect),
        Commands::Events { capture } => commands::events(&capture),
    }
}
