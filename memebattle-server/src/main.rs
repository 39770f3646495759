//! Meme battle server binary.
//!
//! Reads `memebattle.toml` (or the file named by `MEMEBATTLE_CONFIG`),
//! overlays secrets from the environment, and serves the API until Ctrl-C.
//! A rotating database backup is written on shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use memebattle_app::{Adapters, BattleService};
use memebattle_core::config::{GeneralConfig, MemeBattleConfig};
use memebattle_core::persistence::BattleStore;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(general: &GeneralConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&general.log_level));
    if general.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = PathBuf::from(std::env::var("MEMEBATTLE_CONFIG").unwrap_or_else(|_| "memebattle.toml".to_string()));
    let found = config_path.exists();
    let mut config = if found {
        MemeBattleConfig::from_file(&config_path)
            .with_context(|| format!("loading config from {}", config_path.display()))?
    } else {
        MemeBattleConfig::default()
    };
    config.apply_env(|key| std::env::var(key).ok());

    init_tracing(&config.general);
    if found {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        warn!(path = %config_path.display(), "Config file not found; using defaults");
    }

    let store = BattleStore::from_config(&config.persistence)
        .with_context(|| format!("opening database {}", config.persistence.path))?;
    let adapters = Adapters::from_config(&config).context("building external service adapters")?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("server.host / server.port do not form a socket address")?;
    let server_config = config.server.clone();
    let service = Arc::new(BattleService::new(config, store, adapters));
    let routes = memebattle_server::app(Arc::clone(&service), &server_config);

    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Could not listen for Ctrl-C");
            }
        })
        .with_context(|| format!("binding {addr}"))?;
    info!(%bound, "Meme battle server listening");

    server.await;

    info!("Shutting down");
    if let Err(e) = service.backup() {
        error!(error = %e, "Shutdown backup failed");
    }
    Ok(())
}
