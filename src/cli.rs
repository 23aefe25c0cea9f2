use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_CONFIG_FILE;

/// Crawl reviews for partner stores, summarize them and translate the summary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Ignore previous crawl times and look back a full year
    #[arg(short, long)]
    pub force: bool,

    /// Path to the TOML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Process only this store id
    #[arg(long, value_name = "STORE_ID")]
    pub store: Option<i64>,

    /// Check that the review API is reachable, then exit
    #[arg(long, conflicts_with_all = ["force", "show"])]
    pub check: bool,

    /// Print the last crawl and stored translations of a store as JSON, then exit
    #[arg(long, value_name = "STORE_ID", conflicts_with = "force")]
    pub show: Option<i64>,

    /// With --show, print only the summary stored for this language code
    #[arg(long, value_name = "CODE", requires = "show")]
    pub lang: Option<String>,

    /// Also append log output to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}
