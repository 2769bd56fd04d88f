use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::warn;
use warp::Filter;
use warp::Rejection;
use warp::Reply;


lazy_static! {
    pub static ref CONFIG_SYNC_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "config_sync_duration_seconds",
            "Histogram of configuration sync pass duration in seconds"
        )
        .buckets(exponential_buckets(0.001, 2.0, 16).expect("valid bucket layout"))
    )
    .expect("metric can not be created");

    pub static ref CONFIG_SYNC_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("config_sync_total", "Configuration sync passes by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref POLLER_QUEUE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("poller_queue_size", "Items waiting in each poller queue"),
        &["poller"]
    )
    .expect("metric can not be created");

    pub static ref PREPROCESSING_QUEUE_SIZE: IntGauge =
        IntGauge::new("preprocessing_queue_size", "Requests held by the preprocessing manager")
            .expect("metric can not be created");

    pub static ref PREPROCESSING_VALUES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("preprocessing_values_total", "Values accepted by the preprocessing manager"),
        &["path"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

pub(crate) fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(CONFIG_SYNC_DURATION_SECONDS.clone()),
        Box::new(CONFIG_SYNC_TOTAL.clone()),
        Box::new(POLLER_QUEUE_SIZE.clone()),
        Box::new(PREPROCESSING_QUEUE_SIZE.clone()),
        Box::new(PREPROCESSING_VALUES_TOTAL.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector can not be registered: {}", e);
        }
    }
}

pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    register_custom_metrics(&REGISTRY);

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(gather_metrics(&REGISTRY))
}

/// Text exposition of every metric in `registry`.
pub fn gather_metrics(registry: &Registry) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        warn!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            warn!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
