//! Tracing initialization.
//!
//! Logs go to stdout through a `tracing-subscriber` fmt layer. The filter comes from `RUST_LOG`
//! when set, otherwise from the configured `log_level`, e.g.:
//!
//! ```bash
//! RUST_LOG="transmission_exporter=debug,tower_http=info" transmission-exporter
//! ```

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber. Fails if one is already installed.
pub fn init_telemetry(default_level: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}
