mod app;

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};

use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};
use microair_core::{
    config::{self, AppConfig},
    Airline, Api, FileStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config_path = config::ensure_default_config()?;
    let config = AppConfig::load()?;
    info!(
        config = %config_path.display(),
        store = %config.store_path.display(),
        player_id = %config.player_id,
        "starting microair"
    );

    let store = FileStore::new(config.store_path.clone());
    let api = Api::new(Airline::from_config(store, &config));

    let existing = api.get_player(&config.player_id);
    if existing.status == 404 {
        let created = api.post_player(&config.player_id);
        if !created.is_success() {
            anyhow::bail!(
                "failed to create player {}: {}",
                config.player_id,
                created.message_text().unwrap_or("unknown error")
            );
        }
        info!(player_id = %config.player_id, "created local player");
    } else if !existing.is_success() {
        anyhow::bail!(
            "failed to load player {}: {}",
            config.player_id,
            existing.message_text().unwrap_or("unknown error")
        );
    }

    let mut app = app::MicroairApp::new(api, config.player_id.clone());
    app.run().await
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("microair.log"))
        .context("failed to open log file")?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(std::sync::Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
