//! Forex range strategies - main entry point
//!
//! This binary provides two subcommands:
//! - replay: Run a strategy over historical or synthetic bars
//! - init-config: Write a preset configuration file

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "forex-range-strategies")]
#[command(about = "Range-bound forex strategies with hedged sizing and layered risk gates", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a strategy over historical or synthetic bars
    Replay {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/basic.json")]
        config: String,

        /// CSV data file (datetime,open,high,low,close); synthetic bars
        /// are generated when omitted
        #[arg(short, long)]
        data: Option<String>,

        /// Number of synthetic bars when no data file is given
        #[arg(long, default_value = "2000")]
        bars: usize,

        /// Starting cash override
        #[arg(long)]
        cash: Option<f64>,

        /// Start date override (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// End date override (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },

    /// Write a preset configuration file
    InitConfig {
        /// Preset variant (basic or range_filtered)
        #[arg(long, default_value = "basic")]
        variant: String,

        /// Output path
        #[arg(short, long, default_value = "config.json")]
        output: String,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // File layer - same format but without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Replay { .. } => "replay",
        Commands::InitConfig { .. } => "init-config",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Replay {
            config,
            data,
            bars,
            cash,
            start,
            end,
        } => commands::replay::run(config, data, bars, cash, start, end),

        Commands::InitConfig { variant, output } => commands::init_config::run(variant, output),
    }
}
