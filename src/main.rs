use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::error;
use log::info;
use monitor_cache::cache::ConfigCache;
use monitor_cache::cache::ConfigSyncer;
use monitor_cache::cache::FileConfigSource;
use monitor_cache::config::LoggingConfig;
use monitor_cache::config::Settings;
use monitor_cache::metrics;
use monitor_cache::preprocessing::MessageBus;
use monitor_cache::preprocessing::PreprocessingManager;
use monitor_cache::preprocessing::PreprocessingWorker;
use monitor_cache::preprocessing::TracingHistorySink;
use monitor_cache::utils::file_io::open_file_for_append;
use monitor_cache::Error;
use monitor_cache::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = Settings::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&settings.logging)?;
    info!("starting with {:?}", settings);

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let cache = Arc::new(ConfigCache::new(&settings));
    let source = Arc::new(FileConfigSource::new(settings.sync.source_path.clone()));
    let syncer = ConfigSyncer::new(
        cache.clone(),
        source,
        Duration::from_secs(settings.sync.interval_secs),
    );
    let syncer_handle = tokio::spawn(syncer.run(graceful_rx.clone()));

    if settings.monitoring.prometheus_enabled {
        tokio::spawn(metrics::start_server(
            settings.monitoring.prometheus_port,
            graceful_rx.clone(),
        ));
    }

    let (bus, events) = MessageBus::new();
    let manager = PreprocessingManager::new(
        cache.clone(),
        Arc::new(TracingHistorySink),
        settings.preprocessing.clone(),
        events,
    );
    let manager_handle = tokio::spawn(manager.run(graceful_rx.clone()));

    for id in 0..settings.preprocessing.workers {
        let worker = PreprocessingWorker::connect(id, &bus)?;
        let shutdown = graceful_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = worker.run(shutdown).await {
                error!("preprocessing worker #{} stopped: {:?}", id, e);
            }
        });
    }

    info!("Application started. Waiting for CTRL+C signal...");
    // Listen on Shutdown Signal
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    match manager_handle.await? {
        Ok(stats) => {
            info!("preprocessing manager finished: {:?}", stats);
            if let Err(e) = syncer_handle.await? {
                error!("config syncer stops: {:?}", e);
            }
        }
        Err(e) => {
            error!("preprocessing manager stops: {:?}", e);
            syncer_handle.abort();
            return Err(Error::Fatal(format!("preprocessing manager failed: {}", e)));
        }
    }
    drop(bus);

    println!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("Shutdown server..");
    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::SignalSenderClosed(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown completed");
    Ok(())
}

pub fn init_observability(logging: &LoggingConfig) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(&Path::new(&logging.log_dir).join(&logging.file_name))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
