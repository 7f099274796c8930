//! CLI arguments and subcommands for herakles-pcstat.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use herakles_pcstat::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-pcstat",
    about = "Page cache census for files, processes and the whole host",
    long_about = "Page cache census for files, processes and the whole host.\n\n\
                  Reports which pages of a file are resident in the Linux page cache using \
                  mincore(2). Files can be given explicitly, taken from the open descriptors \
                  of one process (--pid), or collected from every live process and ranked by \
                  cache occupancy (--top).",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/cansp-dev/herakles-pcstat — More info: https://www.herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Files to inspect (order is preserved in the report)
    pub files: Vec<PathBuf>,

    /// Show all open regular files of the given pid
    #[arg(long)]
    pub pid: Option<u32>,

    /// Show the top N cached files across all processes, in descending order
    #[arg(long, allow_negative_numbers = true)]
    pub top: Option<i64>,

    /// Show terse (CSV) output
    #[arg(long)]
    pub terse: bool,

    /// Omit the header from terse, text and plain output
    #[arg(long)]
    pub nohdr: bool,

    /// Return data in JSON format
    #[arg(long)]
    pub json: bool,

    /// Return data with unicode box characters
    #[arg(long)]
    pub unicode: bool,

    /// Return data with no box characters
    #[arg(long)]
    pub plain: bool,

    /// Include the per-page status in JSON output
    #[arg(long)]
    pub pps: bool,

    /// Print a simple histogram instead of raw data
    #[arg(long)]
    pub histo: bool,

    /// Convert paths to basename to narrow the output
    #[arg(long)]
    pub bname: bool,

    /// Log level (logs go to stderr)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Root of the proc filesystem
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Path prefixes never reported (comma-separated)
    #[arg(long)]
    pub exclude_prefixes: Option<String>,

    /// Include only processes matching these names (comma-separated)
    #[arg(long)]
    pub include_names: Option<String>,

    /// Exclude processes matching these names (comma-separated)
    #[arg(long)]
    pub exclude_names: Option<String>,

    /// Parallel scan threads (0 = auto)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Maximum number of processes to scan
    #[arg(long)]
    pub max_processes: Option<usize>,
}

impl Args {
    /// Output format selected by flags, if any.
    /// Precedence: json > terse > histo > unicode > plain.
    pub fn format_flag(&self) -> Option<OutputFormat> {
        if self.json {
            Some(OutputFormat::Json)
        } else if self.terse {
            Some(OutputFormat::Terse)
        } else if self.histo {
            Some(OutputFormat::Histogram)
        } else if self.unicode {
            Some(OutputFormat::Unicode)
        } else if self.plain {
            Some(OutputFormat::Plain)
        } else {
            None
        }
    }
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Check runtime requirements and permissions
    CheckRequirements,
}
