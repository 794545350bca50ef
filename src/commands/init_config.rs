//! Init-config command implementation

use anyhow::{Context, Result};
use forex_range_strategies::Config;
use tracing::info;

pub fn run(variant: String, output: String) -> Result<()> {
    let config = match variant.as_str() {
        "basic" => Config::basic_preset(),
        "range_filtered" => Config::range_filtered_preset(),
        other => {
            anyhow::bail!(
                "Unknown variant: {}. Available variants: basic, range_filtered",
                other
            )
        }
    };

    let json =
        serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?;
    std::fs::write(&output, json).context(format!("Failed to write {}", output))?;

    info!("Wrote {} preset to {}", variant, output);
    println!("Wrote {} preset to {}", variant, output);

    Ok(())
}
