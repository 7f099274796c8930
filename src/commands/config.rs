//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{format_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = output.unwrap_or_else(|| PathBuf::from("herakles-pcstat.yaml"));

    let mut content = format_config(&Config::default(), &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Page Cache Census Configuration
# =========================================
#
# Discovery
# ---------
# proc_root: "/proc"               # Root of the proc filesystem
# excluded_prefixes: [/dev, /proc] # Targets under these roots are never reported
# include_names: null              # Only scan processes matching these names (--top)
# exclude_names: null              # Skip processes matching these names (--top)
# max_processes: null              # Maximum processes to scan (--top)
# parallelism: null                # Scan threads (null/0 = auto)
#
# Output
# ------
# format: text                     # text, unicode, plain, terse, json, histogram
# basename: false                  # Report base file names only
# per_page_status: false           # Per-page bitmap in JSON output
# no_header: false                 # Omit headers in text/plain/terse output
#
# Logging
# -------
# log_level: warn                  # off, error, warn, info, debug, trace

"#;
    format!("{}{}", comments, yaml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_config_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        command_config(Some(path.clone()), ConfigFormat::Yaml, true).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Herakles Page Cache Census Configuration"));
        let cfg: Config = serde_yaml::from_str(&content).unwrap();
        assert!(cfg.proc_root.is_some());
    }
}
