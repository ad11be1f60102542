//! Drowsiness Monitor - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("DROWSY_CONFIG")
        .ok()
        .or_else(|| std::env::args().nth(1));

    let settings = Settings::load(config_path.as_deref()).context("loading configuration")?;
    init_logging(settings.server.log_json);

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Sampling every {} frames, drowsy after {} positive samples",
        settings.dms.sample_interval, settings.dms.drowsy_streak_threshold
    );

    run_server(settings).await
}
