use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about = "Extract wiki entries together with their related entries")]
pub struct Cli {
    /// Configuration file (TOML, JSON or YAML).
    #[arg(short, long, global = true, env = "MEMEX_CONFIG")]
    pub config: Option<PathBuf>,
    /// Read from the entry store, but never write to it.
    #[arg(long, global = true)]
    pub dry_run: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl the entry index and store every entry.
    Crawl {
        /// First index page, instead of the configured one.
        #[arg(long)]
        start: Option<String>,
        /// Stop after this many entries.
        #[arg(long)]
        limit: Option<usize>,
        /// Don't extract the series pages entries are part of.
        #[arg(long)]
        no_parents: bool,
    },
    /// Extract the given entry pages and print them as JSON lines.
    Extract {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Print a stored entry as JSON.
    Show { url: String },
    /// Summarize the entry store.
    Stats,
}
