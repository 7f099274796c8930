//! herakles-pcstat - version 0.1.0
//!
//! Page cache census with tracing logging.
//! This is the main entry point that resolves configuration, runs one census
//! and renders the report to stdout. Logs go to stderr.

mod cli;
mod commands;
mod config;
mod startup_checks;

use clap::{CommandFactory, Parser};
use herakles_pcstat::{
    render, Census, CensusError, CensusRequest, MincoreChecker, ProcMountNamespace,
};
use std::io::Write;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};

use cli::{Args, Commands, LogLevel};
use commands::command_config;
use config::{resolve_config, show_config, validate_effective_config, Config};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) {
    let level = config.log_level.unwrap_or(LogLevel::Warn);
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    debug!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    if let Some(command) = &args.command {
        return match command {
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),

            Commands::CheckRequirements => {
                let config = load_validated_config(&args)?;
                setup_logging(&config);
                let census_options = config.census_options();

                match startup_checks::validate_requirements(&census_options.proc_root) {
                    Ok(()) => {
                        println!("✅ All requirements met");
                        Ok(())
                    }
                    Err(e) => {
                        eprintln!("❌ Requirements check failed: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        };
    }

    let config = load_validated_config(&args)?;
    setup_logging(&config);

    let request = CensusRequest::from_args(args.files.clone(), args.pid, args.top);
    let census_options = config.census_options();

    if !matches!(request, CensusRequest::Files(_)) {
        // Don't fail hard: a partial census is still useful.
        if let Err(e) = startup_checks::validate_requirements(&census_options.proc_root) {
            error!("Startup validation failed: {}", e);
            error!("   The census will run but may miss processes!");
        }
    }

    let census = Census::new(
        MincoreChecker::new(config.needs_per_page()),
        ProcMountNamespace::new(census_options.proc_root.clone()),
        census_options,
    );

    info!("Starting census: {:?}", request);
    let stats = match census.run(request) {
        Ok(stats) => stats,
        Err(CensusError::NoInputFiles) => {
            let mut stderr = std::io::stderr();
            Args::command().write_help(&mut stderr)?;
            std::process::exit(1);
        }
        Err(e) => {
            error!("Census failed: {}", e);
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render(&mut out, &stats, &config.report_options())?;
    out.flush()?;

    Ok(())
}
