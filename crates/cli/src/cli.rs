use std::path::PathBuf;

use clap::Parser;

/// Progressively prefetch and reveal a categorized feed.
///
/// Loads the feed items and the category mapping, fetches each item's data
/// against the configured backend one category at a time, and prints the
/// revealed categories as JSON.
#[derive(Parser, Debug)]
#[command(name = "feedshelf", about = "Progressive category prefetch for feeds")]
pub struct CliArgs {
    /// JSON file holding the feed items (an array)
    #[arg(long, env = "FEEDSHELF_ITEMS")]
    pub items: PathBuf,

    /// TOML file holding the category mapping
    #[arg(long, env = "FEEDSHELF_CATEGORIES")]
    pub categories: PathBuf,

    /// Base URL for relative data sources (overrides FEEDSHELF_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Proximity rising edges to simulate after the initial window
    #[arg(long, default_value = "0")]
    pub scrolls: usize,

    /// Keep scrolling until every category is revealed
    #[arg(long)]
    pub all: bool,

    /// Interleave minor tiles around major and important ones
    #[arg(long)]
    pub interleave: bool,

    /// Print prefetch metrics to stderr when done
    #[arg(long)]
    pub metrics: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}
