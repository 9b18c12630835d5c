use anyhow::Result;
use log::{error, info, warn};
use lotwatch::api::{AppState, RestApi};
use lotwatch::config::{self, CameraDirectory, ZonePolicy};
use lotwatch::device_manager::AlertStreamConnector;
use lotwatch::services::{
    AlertNotifier, AlertService, Dispatcher, EventPipeline, LogNotifier, SnapshotStore,
};
use lotwatch::{db, messaging};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Config file location when no path is given on the command line
const CONFIG_ENV: &str = "LOTWATCH_CONFIG";

async fn run_app() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;

    // Initialize logging; RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.api.log_level.as_str()),
    )
    .init();
    info!("Starting lotwatch {}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file given, using defaults"),
    }

    let db = db::connect(&config.database).await?;
    let directory = Arc::new(CameraDirectory::new(config.cameras.clone())?);
    let policy = Arc::new(ZonePolicy::try_from(&config.policy)?);
    info!("{} camera(s) configured", directory.len());

    let mut notifiers: Vec<Arc<dyn AlertNotifier>> = vec![Arc::new(LogNotifier)];
    if config.message_broker.enabled {
        match messaging::create_message_broker(config.message_broker.clone()).await {
            Ok(broker) => {
                info!("Message broker initialized");
                notifiers.push(broker);
            }
            Err(e) => warn!("RabbitMQ unavailable, alerts will only be logged: {:#}", e),
        }
    }
    let alerts = Arc::new(AlertService::new(notifiers));

    let snapshots = SnapshotStore::new(&config.snapshots.dir);
    tokio::fs::create_dir_all(snapshots.dir()).await?;

    let dispatcher = Arc::new(Dispatcher::with_policy(db.clone(), policy, alerts));
    let pipeline = Arc::new(EventPipeline::new(
        db.clone(),
        directory.clone(),
        dispatcher,
        snapshots.clone(),
    ));

    let shutdown = CancellationToken::new();

    // One supervised alert stream per streaming camera
    let mut connectors = Vec::new();
    if config.streaming.enabled {
        for camera in directory.iter().filter(|camera| camera.stream) {
            match AlertStreamConnector::new(
                camera.clone(),
                pipeline.clone(),
                config.streaming.clone(),
            ) {
                Ok(connector) => connectors.push(tokio::spawn(connector.run(shutdown.clone()))),
                Err(e) => error!("[{}] Cannot start alert stream: {}", camera.id, e),
            }
        }
    }
    info!("{} alert stream(s) started", connectors.len());

    let http_server = RestApi::new(
        &config.api,
        AppState {
            db,
            pipeline,
            directory,
            snapshots,
            streaming: config.streaming.clone(),
        },
    );
    let mut server = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { http_server.run(shutdown).await }
    });

    // Wait for termination signals
    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutting down...");
            shutdown.cancel();
            server.await?
        }
        result = &mut server => {
            shutdown.cancel();
            result?
        }
    };

    for connector in connectors {
        if let Err(e) = connector.await {
            error!("Alert stream task failed: {}", e);
        }
    }

    result
}

fn main() {
    // Create a tokio runtime in the current thread
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    // Run our async main function
    if let Err(e) = runtime.block_on(run_app()) {
        eprintln!("Application error: {:#}", e);
        std::process::exit(1);
    }
}
