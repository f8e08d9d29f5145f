use clap::Parser;
use anyhow::Result;
use std::path::PathBuf;
use log::debug;

/// Plugin Resolution Tool
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "plugin-resolver")]
#[command(about = "Loads a directory of plugin archives, resolves their dependency order and reports plugins, class attribution and discovered extensions")]
#[command(version)]
pub struct Args {
    /// Plugin root directory (defaults to the configured plugin-dir)
    pub plugin_dir: Option<PathBuf>,

    /// Skip dependency cycle detection and keep inspection order
    #[arg(long)]
    pub no_cycle_check: bool,

    /// Extension type to discover and report (repeatable)
    #[arg(long = "extension-type", value_name = "NAME")]
    pub extension_types: Vec<String>,

    /// Initialization worker threads
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Verbose output (debug level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log file path for file output
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL")]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Configuration section name
    #[arg(long, value_name = "SECTION")]
    pub config_name: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            plugin_dir: None,
            no_cycle_check: false,
            extension_types: Vec::new(),
            threads: None,
            verbose: false,
            quiet: false,
            debug: false,
            log_format: "text".to_string(),
            log_file: None,
            log_file_level: None,
            config_file: None,
            config_name: None,
        }
    }
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    let args = Args::parse();
    debug!("Parsed CLI arguments: {:?}", args);
    args
}

/// Validate CLI argument combinations
pub fn validate_args(args: &Args) -> Result<()> {
    let log_flags_count = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|&&flag| flag)
        .count();

    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified"
        ));
    }

    match args.log_format.to_lowercase().as_str() {
        "text" | "json" => {},
        _ => return Err(anyhow::anyhow!(
            "Invalid log format '{}'. Valid options: text, json", args.log_format
        )),
    }

    if let Some(ref level) = args.log_file_level {
        match level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {},
            _ => return Err(anyhow::anyhow!(
                "Invalid log file level '{}'. Valid levels: error, warn, info, debug, trace", level
            )),
        }
    }

    if args.log_file_level.is_some() && args.log_file.is_none() {
        return Err(anyhow::anyhow!(
            "--log-file-level requires --log-file to be specified"
        ));
    }

    if args.threads == Some(0) {
        return Err(anyhow::anyhow!("--threads must be greater than 0"));
    }

    if let Some(blank) = args.extension_types.iter().find(|t| t.trim().is_empty()) {
        return Err(anyhow::anyhow!("Invalid extension type '{}'", blank));
    }

    debug!("CLI arguments validated successfully");
    Ok(())
}
