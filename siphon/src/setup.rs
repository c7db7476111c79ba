use anyhow::{Context, Result};
use siphon_config::{Config, Scheme};

/// Validates that the configuration can be used to deliver metrics.
pub fn check_config(config: &Config) -> Result<()> {
    config.credentials().context(
        "siphon has no credentials, which are required to submit metrics. \
         Set upstream.email and upstream.token, or SIPHON_EMAIL and SIPHON_TOKEN.",
    )?;

    if config.api().scheme() == Scheme::Http {
        siphon_log::warn!("submitting metrics over plain http to {}", config.api());
    }

    Ok(())
}

/// Initializes logging from the config.
pub fn init_logging(config: &Config) {
    siphon_log::init(config.logging());
}

/// Print spawn infos to the log.
pub fn dump_spawn_infos(config: &Config) {
    if config.path().as_os_str().is_empty() {
        siphon_log::info!("launching siphon without config folder");
    } else {
        siphon_log::info!(
            "launching siphon from config folder {}",
            config.path().display()
        );
    }

    siphon_log::info!("  metrics api: {}", config.api());
    match config.credentials() {
        Ok(credentials) => siphon_log::info!("  account: {}", credentials.email),
        Err(_) => siphon_log::info!("  account: -"),
    }
    match config.source() {
        Some(source) => siphon_log::info!("  source: {source}"),
        None => siphon_log::info!("  source: -"),
    }
    siphon_log::info!("  log level: {}", config.logging().level);
}
