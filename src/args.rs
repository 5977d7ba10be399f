use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_DATABASE_PATH;

/// GitLab code frequency fetcher and reporter.
///
/// Runs code search queries in pairs (legacy pattern vs. design-system
/// pattern) to track how usage changes over time.
#[derive(Parser)]
#[clap(
    author,
    version,
    about,
    long_about = "Runs a number of code search queries on a GitLab instance in pairs, to track usage of code over time. Useful to generate analytics and reports on e.g. the adoption of the CRNT Design System."
)]
pub struct Args {
    /// Enable verbose logging, including API calls.
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Path of the SQLite results database.
    #[clap(long, global = true, default_value = DEFAULT_DATABASE_PATH)]
    pub database: PathBuf,

    /// TOML settings file with projects and query pairs.
    #[clap(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the queries and add the results to the database.
    Update {
        /// Run queries but do not persist the results in the database.
        #[clap(long)]
        dont_persist: bool,

        /// Drop the database and start with no data before saving.
        #[clap(long)]
        reset: bool,

        /// GitLab access token; falls back to the PRIVATE_TOKEN variable.
        #[clap(short, long)]
        token: Option<String>,

        /// Base URL of the GitLab API.
        #[clap(long, env = "GITLAB_BASE_URL")]
        base_url: Option<String>,

        /// Maximum number of concurrent query pairs.
        #[clap(short = 'c', long, value_name = "NUM")]
        workers: Option<usize>,

        /// Skip failing result pages after the first instead of aborting.
        #[clap(long)]
        lenient_pages: bool,
    },

    /// Generate a chart for all results or for the given query.
    GenerateChart {
        /// Query name, or "all".
        #[clap(default_value = "all")]
        query: String,

        /// Output HTML file; defaults to <QUERY>.html.
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}
