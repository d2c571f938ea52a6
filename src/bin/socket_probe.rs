//! Socket probe
//!
//! Drives one `wiresockets` socket through connect, write, read and close,
//! then prints a JSON report.
//!
//! Usage:
//!   cargo run --bin socket_probe [config.yaml]
//!
//! The config path is the first argument if given, else
//! `SOCKET_PROBE_CONFIG`, else `config/socket_probe.yaml`.
//!
//! Optional environment variables:
//!   PROXY_USERNAME - Proxy username
//!   PROXY_PASSWORD - Proxy password

use anyhow::{Context, Result};
use socket_probe::bin_common::{
    init_tracing, load_config_from_env, parse_args, run_probe, ConfigType, ProbeConfig,
};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenv::dotenv().ok();

    let config_path = match parse_args().into_iter().next() {
        Some(path) => PathBuf::from(path),
        None => load_config_from_env(ConfigType::Probe),
    };

    let config = ProbeConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    init_tracing(&config.log_level);
    info!("Loaded configuration from {}", config_path.display());
    config.log();

    let report = run_probe(&config).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
