use anyhow::Result;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use certwatch_server::app::{App, Command};
use certwatch_server::config::CertwatchConfig;

const DEFAULT_CONFIG_PATH: &str = "config/certwatch.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  certwatch update [config.toml]     Probe every monitor and store changed expiries");
    eprintln!("  certwatch insert [config.toml]     Import new monitors from the registry");
    eprintln!("  certwatch recheck [config.toml]    Re-probe expiring monitors and announce renewals");
    eprintln!("  certwatch notify [config.toml]     Alert on expired and expiring certificates");
    eprintln!();
    eprintln!("The config path defaults to {DEFAULT_CONFIG_PATH}.");
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install default CryptoProvider: {e:?}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("certwatch=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    let command = match args.get(1).map(|s| s.as_str()) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(name) => name.parse::<Command>().inspect_err(|_| print_usage())?,
    };

    let config_path = args
        .get(2)
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_CONFIG_PATH);
    let config = CertwatchConfig::load(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load config '{}': {}", config_path, e))?;
    let app = App::from_config(&config)?;

    tokio::select! {
        _ = app.run(command) => {}
        _ = signal::ctrl_c() => {
            tracing::warn!(%command, "Interrupted, in-flight probes cancelled");
        }
    }

    Ok(())
}
