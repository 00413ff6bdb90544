use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

use pagemark::panic_handler::initialize_panic_handler;
use pagemark::scenario::{Scenario, replay};
use pagemark::settings;

/// Replay a recorded highlight session against the anchoring engine
#[derive(Parser, Debug)]
#[command(name = "pagemark", version, about)]
struct Cli {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Settings file to use instead of the user config
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "pagemark.log")]
    log_file: PathBuf,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    WriteLogger::init(
        cli.log_level.into(),
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("Failed to create log file {:?}", cli.log_file))?,
    )?;
    initialize_panic_handler();

    info!("Starting pagemark replay of {:?}", cli.scenario);

    match &cli.config {
        Some(path) => {
            settings::load_settings_from_path(path)?;
        }
        None => settings::load_settings(),
    }

    let json = fs::read_to_string(&cli.scenario)
        .with_context(|| format!("Failed to read scenario {:?}", cli.scenario))?;
    let scenario = Scenario::from_json(&json)
        .with_context(|| format!("Failed to parse scenario {:?}", cli.scenario))?;

    let report = replay(&scenario, settings::engine_config())?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("Replay finished on page {}", report.final_page);
    Ok(())
}
