use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_LINK_CLASS, DEFAULT_SITE};

#[derive(Debug, Parser)]
#[command(author, version, about, args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one discovery page and report what each link strategy finds.
    Probe(ProbeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Output directory for manuscript text files.
    #[arg(long, default_value = "data_naskah_sastra_org")]
    pub out: String,

    /// CSV log, one row per subcategory attempt.
    #[arg(long, default_value = "scraping_log.csv")]
    pub log_file: String,

    /// JSON checkpoint of completed subcategories.
    #[arg(long, default_value = "scraping_progress.json")]
    pub progress_file: String,

    /// Site root (must be http/https).
    #[arg(long, default_value = DEFAULT_SITE)]
    pub site: String,

    /// JSON category table replacing the built-in one.
    #[arg(long)]
    pub taxonomy: Option<String>,

    /// Only scrape these category ids (repeatable).
    #[arg(long = "category-id")]
    pub category_id: Vec<u32>,

    /// Match item links by href path fragment instead of the link class (repeatable).
    #[arg(long)]
    pub link_prefix: Vec<String>,

    /// CSS class marking item links in discovery responses.
    #[arg(long, default_value = DEFAULT_LINK_CLASS)]
    pub link_class: String,

    /// Delay between discovery pages.
    #[arg(long, default_value_t = 1000)]
    pub page_delay_ms: u64,

    /// Delay after each manuscript download.
    #[arg(long, default_value_t = 2000)]
    pub item_delay_ms: u64,

    /// Delay between subcategories.
    #[arg(long, default_value_t = 5000)]
    pub subcategory_delay_ms: u64,

    /// HTTP request timeout.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Download at most this many manuscripts per subcategory.
    #[arg(long)]
    pub max_items_per_subcategory: Option<usize>,

    /// Start without the confirmation prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ProbeArgs {
    /// Category id (`fc`).
    #[arg(long)]
    pub category_id: u32,

    /// Subcategory id (`fs`).
    #[arg(long)]
    pub subcategory_id: u32,

    /// Result offset (`ps`).
    #[arg(long, default_value_t = 0)]
    pub offset: u32,

    /// Site root (must be http/https).
    #[arg(long, default_value = DEFAULT_SITE)]
    pub site: String,

    /// CSS class marking item links.
    #[arg(long, default_value = DEFAULT_LINK_CLASS)]
    pub link_class: String,

    /// Path fragment for the prefix strategy (default: derived from the category name).
    #[arg(long)]
    pub link_prefix: Vec<String>,

    /// Save the raw response here.
    #[arg(long)]
    pub save_html: Option<String>,

    /// HTTP request timeout.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}
