//! Configuration management for herakles-pcstat.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use herakles_pcstat::process::DEFAULT_EXCLUDED_PREFIXES;
use herakles_pcstat::{CensusOptions, OutputFormat, ProcessFilter, ReportOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Configuration file locations tried when no --config is given.
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "/etc/herakles/pcstat.yaml",
    "/etc/herakles/pcstat.yml",
    "/etc/herakles/pcstat.json",
    "./herakles-pcstat.yaml",
    "./herakles-pcstat.yml",
    "./herakles-pcstat.json",
];

/// Effective configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Discovery
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
    #[serde(alias = "excluded-prefixes")]
    pub excluded_prefixes: Option<Vec<String>>,
    #[serde(alias = "include-names")]
    pub include_names: Option<Vec<String>>,
    #[serde(alias = "exclude-names")]
    pub exclude_names: Option<Vec<String>>,
    #[serde(alias = "max-processes")]
    pub max_processes: Option<usize>,
    pub parallelism: Option<usize>,

    // Output
    pub format: Option<OutputFormat>,
    pub basename: Option<bool>,
    #[serde(alias = "per-page-status")]
    pub per_page_status: Option<bool>,
    #[serde(alias = "no-header")]
    pub no_header: Option<bool>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<LogLevel>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            excluded_prefixes: Some(
                DEFAULT_EXCLUDED_PREFIXES
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            include_names: None,
            exclude_names: None,
            max_processes: None,
            parallelism: None,
            format: Some(OutputFormat::Text),
            basename: Some(false),
            per_page_status: Some(false),
            no_header: Some(false),
            log_level: Some(LogLevel::Warn),
        }
    }
}

impl Config {
    /// Census tunables derived from this configuration.
    pub fn census_options(&self) -> CensusOptions {
        let defaults = CensusOptions::default();
        CensusOptions {
            proc_root: self.proc_root.clone().unwrap_or(defaults.proc_root),
            excluded_prefixes: self
                .excluded_prefixes
                .as_ref()
                .map(|v| v.iter().map(PathBuf::from).collect())
                .unwrap_or(defaults.excluded_prefixes),
            basename: self.basename.unwrap_or(false),
            parallelism: self.parallelism,
            max_processes: self.max_processes,
            filter: ProcessFilter {
                include_names: self.include_names.clone(),
                exclude_names: self.exclude_names.clone(),
            },
        }
    }

    /// Rendering switches derived from this configuration.
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            format: self.format.unwrap_or_default(),
            no_header: self.no_header.unwrap_or(false),
            per_page_status: self.per_page_status.unwrap_or(false),
        }
    }

    /// Whether residency checks must keep the per-page bitmap.
    pub fn needs_per_page(&self) -> bool {
        self.per_page_status.unwrap_or(false) || self.format.unwrap_or_default().needs_per_page()
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(root) = &cfg.proc_root {
        if !root.is_absolute() {
            return Err(format!("proc_root must be an absolute path, got '{}'", root.display()).into());
        }
    }

    if let Some(prefixes) = &cfg.excluded_prefixes {
        if let Some(bad) = prefixes.iter().find(|p| !Path::new(p).is_absolute()) {
            return Err(format!("excluded_prefixes entries must be absolute, got '{}'", bad).into());
        }
    }

    if cfg.max_processes == Some(0) {
        return Err("max_processes must be greater than 0 when set".into());
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(prefixes) = &args.exclude_prefixes {
        config.excluded_prefixes = Some(split_list(prefixes));
    }

    // Parse comma-separated include/exclude names
    if let Some(include_str) = &args.include_names {
        config.include_names = Some(split_list(include_str));
    }
    if let Some(exclude_str) = &args.exclude_names {
        config.exclude_names = Some(split_list(exclude_str));
    }

    if args.max_processes.is_some() {
        config.max_processes = args.max_processes;
    }
    if args.parallelism.is_some() {
        config.parallelism = args.parallelism;
    }

    // Output flags
    if let Some(format) = args.format_flag() {
        config.format = Some(format);
    }
    if args.bname {
        config.basename = Some(true);
    }
    if args.pps {
        config.per_page_status = Some(true);
    }
    if args.nohdr {
        config.no_header = Some(true);
    }

    if let Some(level) = args.log_level {
        config.log_level = Some(level);
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .map_err(|e| format!("cannot read config file {}: {}", path.display(), e))?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        // Default to YAML
        _ => serde_yaml::from_str(&content)?,
    };
    info!("Loaded configuration from: {}", path.display());

    Ok(merge_defaults(config))
}

/// Fills unset keys of a loaded file with built-in defaults.
fn merge_defaults(cfg: Config) -> Config {
    let d = Config::default();
    Config {
        proc_root: cfg.proc_root.or(d.proc_root),
        excluded_prefixes: cfg.excluded_prefixes.or(d.excluded_prefixes),
        include_names: cfg.include_names.or(d.include_names),
        exclude_names: cfg.exclude_names.or(d.exclude_names),
        max_processes: cfg.max_processes.or(d.max_processes),
        parallelism: cfg.parallelism.or(d.parallelism),
        format: cfg.format.or(d.format),
        basename: cfg.basename.or(d.basename),
        per_page_status: cfg.per_page_status.or(d.per_page_status),
        no_header: cfg.no_header.or(d.no_header),
        log_level: cfg.log_level.or(d.log_level),
    }
}

/// Renders configuration in the requested format
pub fn format_config(config: &Config, format: &ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", format_config(config, &format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["herakles-pcstat", "--no-config"];
        full.extend_from_slice(argv);
        Args::parse_from(full)
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_effective_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_relative_paths() {
        let cfg = Config {
            proc_root: Some(PathBuf::from("proc")),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            excluded_prefixes: Some(vec!["/dev".into(), "tmp".into()]),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_max_processes() {
        let cfg = Config {
            max_processes: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let cfg = resolve_config(&args(&[
            "--json",
            "--bname",
            "--include-names",
            "nginx, postgres",
            "--exclude-prefixes",
            "/dev,/proc,/sys",
            "--log-level",
            "debug",
        ]))
        .unwrap();

        assert_eq!(cfg.format, Some(OutputFormat::Json));
        assert_eq!(cfg.basename, Some(true));
        assert_eq!(
            cfg.include_names,
            Some(vec!["nginx".to_string(), "postgres".to_string()])
        );
        assert_eq!(cfg.log_level, Some(LogLevel::Debug));

        let opts = cfg.census_options();
        assert!(opts.basename);
        assert_eq!(opts.excluded_prefixes.len(), 3);
    }

    #[test]
    fn test_needs_per_page() {
        let cfg = resolve_config(&args(&["--histo"])).unwrap();
        assert!(cfg.needs_per_page());
        let cfg = resolve_config(&args(&["--pps", "--json"])).unwrap();
        assert!(cfg.needs_per_page());
        assert!(cfg.report_options().per_page_status);
        let cfg = resolve_config(&args(&[])).unwrap();
        assert!(!cfg.needs_per_page());
    }

    #[test]
    fn test_load_yaml_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcstat.yaml");
        fs::write(&path, "format: unicode\nmax-processes: 50\n").unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.format, Some(OutputFormat::Unicode));
        assert_eq!(cfg.max_processes, Some(50));
        assert_eq!(cfg.proc_root, Some(PathBuf::from(DEFAULT_PROC_ROOT)));
    }

    #[test]
    fn test_load_json_and_toml_config() {
        let dir = tempfile::tempdir().unwrap();

        let json = dir.path().join("pcstat.json");
        fs::write(&json, r#"{"basename": true, "log_level": "trace"}"#).unwrap();
        let cfg = load_config(Some(&json)).unwrap();
        assert_eq!(cfg.basename, Some(true));
        assert_eq!(cfg.log_level, Some(LogLevel::Trace));

        let toml_path = dir.path().join("pcstat.toml");
        fs::write(&toml_path, "parallelism = 2\nformat = \"terse\"\n").unwrap();
        let cfg = load_config(Some(&toml_path)).unwrap();
        assert_eq!(cfg.parallelism, Some(2));
        assert_eq!(cfg.format, Some(OutputFormat::Terse));
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.yaml"))).is_err());
    }

    #[test]
    fn test_format_config_roundtrips_yaml() {
        let text = format_config(&Config::default(), &ConfigFormat::Yaml).unwrap();
        let back: Config = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back.proc_root, Some(PathBuf::from(DEFAULT_PROC_ROOT)));
    }
}
