use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Filter directive for `-v` flags, falling back to the configured level.
#[must_use]
pub fn level_for(cfg: &LoggingConfig, verbose: u8) -> String {
    match verbose {
        0 => cfg.level.clone(),
        1 => "info".to_owned(),
        2 => "debug".to_owned(),
        _ => "trace".to_owned(),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// # Errors
/// Fails when a global subscriber is already installed.
pub fn init(cfg: &LoggingConfig, verbose: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(cfg, verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if cfg.json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
    } else {
        builder.try_init().map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}
