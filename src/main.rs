use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use cairn::produce_briefing;
use cairn_briefing::render_text;
use cairn_core::Config;
use cairn_store::SqliteForecastStore;

/// Exit status when the forecast store fails and no briefing is produced
const EXIT_STORE_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    cairn_core::init()?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let (config, _) = Config::load_validated(config_path.as_deref())?;

    let store_path = config.store_path();
    let store = SqliteForecastStore::new(&store_path)
        .with_context(|| format!("Failed to open forecast store {}", store_path.display()))?;

    if let Some(last) = store.list_runs(1)?.first() {
        tracing::info!(
            "Previous run {} at {}: {} new forecasts, {} zone(s) unavailable",
            last.run_id,
            last.started_at,
            last.records_inserted,
            last.zones_unavailable
        );
    }

    tracing::info!("Cairn briefing run started");

    let report = match produce_briefing(&config, &store, chrono::Utc::now()).await {
        Ok(report) => report,
        Err(e) if e.is_store_failure() => {
            tracing::error!("Forecast store failed, no briefing produced: {}", e);
            eprintln!("{}", e.user_message());
            return Ok(ExitCode::from(EXIT_STORE_FAILURE));
        }
        Err(e) => {
            tracing::error!("Briefing run failed: {}", e);
            anyhow::bail!("{}", e.user_message());
        }
    };

    println!("{}", render_text(&report));
    Ok(ExitCode::SUCCESS)
}
