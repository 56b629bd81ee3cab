use anyhow::Result;
use helios::config::{Config, StoreKind};
use helios::driver::{ChargeDriver, DriverCommand};
use helios::store::{MemoryStateStore, SimpleApiStateStore, StateStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    config.validate()?;

    helios::logging::init_logging(&config.logging)?;
    info!(
        "Helios {} starting up (store: {:?})",
        env!("APP_VERSION"),
        config.store.kind
    );

    let store: Arc<dyn StateStore> = match config.store.kind {
        StoreKind::SimpleApi => Arc::new(SimpleApiStateStore::new(&config.store)?),
        StoreKind::Memory => {
            warn!("Using the in-memory store; no datapoints are shared with the host");
            Arc::new(MemoryStateStore::new())
        }
    };

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<DriverCommand>();
    let mut driver = ChargeDriver::new(config.clone(), store, cmd_rx);
    let web_task = spawn_web(&config, &driver, cmd_tx);

    let shutdown = driver.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            shutdown.send(()).ok();
        }
    });

    let result = driver.run().await;
    if let Some(task) = web_task {
        task.abort();
    }

    match result {
        Ok(()) => {
            info!("Driver shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Driver failed with error: {}", e);
            Err(anyhow::anyhow!("Driver error: {}", e))
        }
    }
}

#[cfg(feature = "web")]
fn spawn_web(
    config: &Config,
    driver: &ChargeDriver,
    commands_tx: mpsc::UnboundedSender<DriverCommand>,
) -> Option<JoinHandle<()>> {
    if !config.web.enabled {
        return None;
    }
    let state = helios::web::AppState {
        commands_tx,
        snapshot_rx: driver.subscribe_snapshot(),
        controls: Arc::new(config.controls.clone()),
    };
    let host = config.web.host.clone();
    let port = config.web.port;
    Some(tokio::spawn(async move {
        let web = helios::web::WebServer::new(state);
        if let Err(e) = web.start(&host, port).await {
            error!("Web server error: {}", e);
        }
    }))
}

#[cfg(not(feature = "web"))]
fn spawn_web(
    _config: &Config,
    _driver: &ChargeDriver,
    _commands_tx: mpsc::UnboundedSender<DriverCommand>,
) -> Option<JoinHandle<()>> {
    None
}
