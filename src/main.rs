#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use otls::config::LoginConfig;
use otls::crypto::RsaDecryptor;
use otls::protocol::LoginService;
use otls::store::MemoryStore;
use otls::utils::logging::init_logging;
use otls::utils::metrics::Metrics;
use otls::utils::RateLimiter;

/// Login gateway for Tibia-protocol game clients
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path of the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Print an example configuration and exit
    #[arg(long)]
    print_example_config: bool,

    /// Validate the configuration and key, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_example_config {
        print!("{}", LoginConfig::example_config());
        return Ok(());
    }

    let config_found = args.config.exists();
    let mut config = if config_found {
        LoginConfig::from_file(&args.config)?
    } else {
        LoginConfig::default()
    };
    config.apply_env_overrides()?;
    config.validate_strict()?;

    init_logging(&config.logging)?;
    if !config_found {
        warn!(path = %args.config.display(), "Config file not found, using defaults");
    }
    for notice in config.warnings() {
        warn!("{notice}");
    }

    let rsa = RsaDecryptor::from_pem_file(&config.crypto.private_key)
        .with_context(|| format!("loading {}", config.crypto.private_key.display()))?;

    let store = match &config.store.accounts_file {
        Some(path) => MemoryStore::from_file(path)?,
        None => MemoryStore::new(),
    };

    if args.check {
        info!(
            worlds = config.worlds.len(),
            accounts = store.len(),
            "Configuration OK"
        );
        return Ok(());
    }

    let config = Arc::new(config);
    let listener = otls::transport::bind(config.server.address.as_str()).await?;
    info!(
        versions = %format!("{}-{}", config.version.min, config.version.max),
        worlds = config.worlds.len(),
        "Starting login gateway"
    );

    let limiter = Arc::new(RateLimiter::new(
        config.limits.connections.clone(),
        config.limits.authorizations.clone(),
    ));
    let metrics = Arc::new(Metrics::new());
    let service = Arc::new(
        LoginService::new(config.clone(), Arc::new(rsa), Arc::new(store))
            .with_limiter(limiter)
            .with_metrics(metrics),
    );
    otls::transport::start_server(listener, service).await?;

    info!("Login gateway stopped");
    Ok(())
}
