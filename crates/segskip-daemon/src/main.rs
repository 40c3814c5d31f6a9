mod core;
mod host;
mod http;
mod logging;
mod media_id;
mod mpv;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use segskip_core::config::{Config, ConfigStore};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::logging::{BufferLayer, LogBuffer};

/// Play videos in mpv and skip sponsored segments automatically.
#[derive(Parser, Debug)]
#[command(name = "segskip", version)]
struct Cli {
    /// Video URL to open on startup.
    url: Option<String>,

    /// Config file (defaults to ~/.config/segskip/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // File logging + in-memory WARN/ERROR buffer for /api/logs
    let logs = LogBuffer::default();
    let data_dir = segskip_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(BufferLayer::new(logs.clone()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,segskip_daemon=debug,segskip_core=debug")
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config_path = cli.config.unwrap_or_else(Config::config_path);
    let config = Config::load_from(&config_path)?;
    info!("Config loaded from: {:?}", config_path);

    let store = Arc::new(ConfigStore::new(config.clone(), Some(config_path)));

    // Event channel: all external inputs funnel into DaemonCore
    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<core::DaemonEvent>(256);
    core::spawn_config_forwarder(&store, event_tx.clone());

    if config.api.enabled {
        let _http_handle = http::start_server(
            config.api.bind_address.clone(),
            config.api.port,
            http::HttpState::new(store.clone(), logs.clone(), event_tx.clone()),
        );
    }

    let shutdown_tx = event_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(core::DaemonEvent::Shutdown).await;
        }
    });

    let daemon_core = core::DaemonCore::new(store, event_tx, cli.url);
    info!("Daemon initialised, running event loop");
    daemon_core.run(event_rx).await
}
