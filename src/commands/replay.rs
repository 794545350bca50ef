//! Replay command implementation

use anyhow::{Context, Result};
use chrono::NaiveDate;
use forex_range_strategies::replay::ReplayEngine;
use forex_range_strategies::{data, Config};
use tracing::{info, warn};

/// Synthetic series shape when no data file is given: EURUSD-scale prices
/// oscillating through both entry lines every few hours of minute bars
const SYNTHETIC_MID: f64 = 1.1000;
const SYNTHETIC_AMPLITUDE: f64 = 0.0050;
const SYNTHETIC_CYCLE_BARS: usize = 240;

pub fn run(
    config_path: String,
    data_path: Option<String>,
    bars: usize,
    cash_override: Option<f64>,
    start_override: Option<String>,
    end_override: Option<String>,
) -> Result<()> {
    info!("Starting replay");

    // Load configuration
    let mut config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    // Apply overrides
    if let Some(cash) = cash_override {
        info!("Overriding starting cash to: ${:.2}", cash);
        config.account.starting_cash = cash;
    }

    if let Some(start) = start_override {
        let date = NaiveDate::parse_from_str(&start, "%Y-%m-%d")
            .context(format!("Invalid start date: {}", start))?;
        info!("Overriding start date to: {}", date);
        config.account.start_date = date;
    }

    if let Some(end) = end_override {
        let date = NaiveDate::parse_from_str(&end, "%Y-%m-%d")
            .context(format!("Invalid end date: {}", end))?;
        info!("Overriding end date to: {}", date);
        config.account.end_date = date;
    }

    config
        .validate()
        .context("Invalid configuration after overrides")?;

    // Load or synthesize bars
    let candles = match data_path {
        Some(path) => {
            info!("Loading data from: {}", path);
            let candles = data::load_csv(&path)?;

            let validation = data::validate_candles(&candles);
            for warning in &validation.warnings {
                warn!("{}", warning);
            }
            if !validation.is_valid() {
                anyhow::bail!(
                    "Data validation failed: {}",
                    validation.errors.join("; ")
                );
            }

            data::clip_to_window(candles, config.account.start_date, config.account.end_date)
        }
        None => {
            info!("No data file given, generating {} synthetic bars", bars);
            let start = config
                .account
                .start_date
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc();
            data::synthetic_range_series(
                start,
                bars,
                SYNTHETIC_MID,
                SYNTHETIC_AMPLITUDE,
                SYNTHETIC_CYCLE_BARS,
            )
        }
    };

    if candles.is_empty() {
        anyhow::bail!("No bars to replay in the configured window");
    }

    let symbol = config.account.symbol();
    let variant = config.strategy.variant;
    let starting_cash = config.account.starting_cash;

    info!("Running replay...");
    let report = ReplayEngine::new(config).run(&candles)?;

    // Print results
    println!("\n{}", "=".repeat(60));
    println!("REPLAY RESULTS");
    println!("{}", "=".repeat(60));
    println!("Strategy:           {}", variant);
    println!("Symbol:             {}", symbol);
    println!("Bars Processed:     {}", report.ticks);
    println!("Entries:            {}", report.entries);
    println!("Liquidations:       {}", report.liquidations);
    println!("Skipped Ticks:      {}", report.skips);
    println!("Starting Cash:      ${:.2}", starting_cash);
    println!("Final Value:        ${:.2}", report.final_value);
    println!("{}", "=".repeat(60));

    info!("Replay completed successfully");

    Ok(())
}
