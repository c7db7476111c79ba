use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use siphon_common::UnixTimestamp;
use siphon_config::{Config, OverridableConfig};
use siphon_metrics::{Flusher, MetricsSnapshot};
use siphon_upstream::UpstreamClient;

use crate::setup;

/// Forwards statsd metrics snapshots to the Librato metrics API.
#[derive(Debug, Parser)]
#[command(name = "siphon", version, max_term_width = 79)]
struct Cli {
    /// The path to the config folder.
    #[arg(long, short, global = true, value_name = "CONFIG", default_value = ".siphon")]
    config: PathBuf,

    /// The origin of the metrics API.
    #[arg(long, global = true, value_name = "URL", env = "SIPHON_API")]
    api: Option<String>,

    /// The account email used for authentication.
    #[arg(long, global = true, env = "SIPHON_EMAIL")]
    email: Option<String>,

    /// The API token used for authentication.
    #[arg(long, global = true, env = "SIPHON_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// The default source of all measurements.
    #[arg(long, global = true, env = "SIPHON_SOURCE")]
    source: Option<String>,

    /// A forward proxy for all requests to the metrics API.
    #[arg(long, global = true, value_name = "URL", env = "SIPHON_PROXY")]
    proxy: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn overrides(&self) -> OverridableConfig {
        OverridableConfig {
            api: self.api.clone(),
            email: self.email.clone(),
            token: self.token.clone(),
            source: self.source.clone(),
            proxy: self.proxy.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Flush a metrics snapshot to the metrics API.
    ///
    /// This runs a single flush cycle and waits until all batches have been delivered or dropped.
    /// The delivery statistics are printed afterwards.
    Flush {
        /// Path to a JSON metrics snapshot.
        snapshot: PathBuf,

        /// The flush time in seconds since the epoch. Defaults to now.
        #[arg(long)]
        timestamp: Option<UnixTimestamp>,
    },

    /// Manage the configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration with the API token redacted.
    Show,

    /// Write the effective configuration into a new config folder.
    ///
    /// Options given on the command line or in the environment, including credentials, are
    /// stored in the written file.
    Init,
}

/// Loads the config folder, falling back to defaults if it has no config file.
fn load_config(path: &Path) -> Result<Config> {
    if Config::config_exists(path) {
        Ok(Config::from_path(path)?)
    } else {
        Ok(Config::default())
    }
}

/// Runs the command line application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    config.apply_override(cli.overrides())?;
    setup::init_logging(&config);

    match cli.command {
        Command::Flush {
            snapshot,
            timestamp,
        } => flush(config, &snapshot, timestamp),
        Command::Config(ConfigCommand::Show) => show_config(config),
        Command::Config(ConfigCommand::Init) => init_config(config, &cli.config),
    }
}

fn flush(config: Config, path: &Path, timestamp: Option<UnixTimestamp>) -> Result<()> {
    setup::check_config(&config)?;
    setup::dump_spawn_infos(&config);

    let data = fs::read(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let snapshot = MetricsSnapshot::from_json(&data)
        .with_context(|| format!("invalid metrics snapshot {}", path.display()))?;

    let timestamp = timestamp.unwrap_or_else(UnixTimestamp::now);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("siphon-upstream")
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(run_flush(&config, &snapshot, timestamp))
}

#[allow(clippy::print_stdout)]
async fn run_flush(
    config: &Config,
    snapshot: &MetricsSnapshot,
    timestamp: UnixTimestamp,
) -> Result<()> {
    let client = UpstreamClient::new(config)?;
    let flusher = Flusher::new(config.flush_config().clone(), client.clone())?;

    let report = flusher.flush(timestamp, snapshot);
    siphon_log::info!(
        "flushed {} stats in {} batches at {}",
        report.num_stats,
        report.batches,
        report.measure_time
    );

    client.shutdown().await;

    for (name, value) in client.stats().status() {
        println!("{name}: {value}");
    }

    Ok(())
}

#[allow(clippy::print_stdout)]
fn show_config(mut config: Config) -> Result<()> {
    let yaml = config.redact_credentials().to_yaml_string()?;
    print!("{yaml}");
    Ok(())
}

fn init_config(mut config: Config, path: &Path) -> Result<()> {
    if Config::config_exists(path) {
        bail!("a config already exists in {}", path.display());
    }

    config.save_in_folder(path)?;
    siphon_log::info!("wrote config to {}", config.path().display());
    Ok(())
}
