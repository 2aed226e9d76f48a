use std::sync::Arc;

use anyhow::{Context, Result};
use resolutions::{
    cli::config_path_from_args, config::Config, logging::init_tracing,
    resolutions::ResolutionStore, server,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path_from_args()?;
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let _logging = init_tracing(&config.logging).context("failed to initialize logging")?;

    let store = if config.store.seed_defaults {
        ResolutionStore::with_seed_data()
    } else {
        ResolutionStore::new()
    };
    tracing::info!(target: "store", records = store.len(), "store_ready");

    server::run(&config.server, Arc::new(store)).await
}
