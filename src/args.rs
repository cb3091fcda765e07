use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::coverage::CoverageType;

#[derive(Parser, Debug)]
#[command(
    name = "pagelens",
    about = "Summarize colors, selectors, fonts, media queries and code coverage of a captured page",
    version,
    long_about = None
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of worker threads
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a CSS overview over a captured page
    Overview {
        /// Captured page JSON (document, snapshot, styleSheets, mediaQueries)
        capture: PathBuf,

        /// Number of entries to display per palette and font table
        #[arg(short, long, default_value_t = 10)]
        top: usize,

        /// Print the combined summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay coverage update batches and report usage
    Coverage {
        /// JSON-lines file, one update batch per line
        updates: PathBuf,

        /// Case-insensitive url filter
        #[arg(short, long, default_value = "")]
        filter: String,

        /// Restrict to a resource type: all, css or js
        #[arg(long = "type", default_value = "all")]
        type_filter: CoverageType,

        /// Include extension content scripts
        #[arg(long)]
        content_scripts: bool,

        /// Number of urls to display
        #[arg(short, long)]
        top: Option<usize>,

        /// Write the coverage export to this file
        #[arg(long)]
        export: Option<PathBuf>,

        /// Write the coverage export to a timestamped file in the current directory
        #[arg(long, conflicts_with = "export")]
        export_default: bool,
    },
}
