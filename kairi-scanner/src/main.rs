//! KAIRI Scanner - oversold + buy-signal screener with ranked LLM commentary.

use anyhow::Result;
use kairi_common::config::Config;
use kairi_common::logging::init_logging;
use kairi_scanner::ScannerService;

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    // Load configuration
    let config = Config::load_with_env()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("KAIRI Scanner v{}", env!("CARGO_PKG_VERSION"));

    let service = ScannerService::new(config);

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
