use anyhow::{Context, Result};
use std::process;
use log::error;

use plugin_resolver::{app, cli, logging};

fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Application panicked: {}", panic_info);
        eprintln!("Panic: {}", panic_info);
    }));

    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args();
    cli::validate_args(&args)?;

    let config_manager = app::load_configuration(&args)?;

    let log_config = app::configure_logging(&args, &config_manager)?;
    logging::init_logger(log_config)?;

    let settings = app::resolver_settings(&args, &config_manager)?;
    let report = app::run_resolver(settings, &args.extension_types)?;

    let json = serde_json::to_string_pretty(&report)
        .context("Failed to serialize resolution report")?;
    println!("{}", json);
    Ok(())
}
