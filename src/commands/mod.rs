//! CLI command implementations for herakles-pcstat.
//!
//! This module provides implementations for CLI subcommands:
//! - `config`: Configuration file generation

pub mod config;

// Re-export command functions
pub use config::command_config;
