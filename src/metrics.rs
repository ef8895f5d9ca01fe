//! Prometheus metrics for the stats service.
//!
//! Exposes:
//! - `tg_chat_stats_cache_lookups_total` (counter with kind/result)
//! - `tg_chat_stats_query_duration_seconds` (histogram)
//! - `tg_chat_stats_query_total` (counter with status)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tg_chat_stats_cache_lookups_total",
        "Cache lookups by query kind and outcome",
        &["kind", "result"]
    )
    .expect("failed to register cache lookup counter")
});

static QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 1ms up to ~4 seconds.
    let buckets =
        prometheus::exponential_buckets(0.001, 2.0, 12).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "tg_chat_stats_query_duration_seconds",
        "Store aggregation duration in seconds",
        &["query"],
        buckets
    )
    .expect("failed to register query duration histogram")
});

static QUERY_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tg_chat_stats_query_total",
        "Total store aggregations by status",
        &["query", "status"]
    )
    .expect("failed to register query counter")
});

static COMMAND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 50ms up to ~3 minutes.
    let buckets =
        prometheus::exponential_buckets(0.05, 2.0, 12).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "tg_chat_stats_command_duration_seconds",
        "CLI command duration in seconds",
        &["command"],
        buckets
    )
    .expect("failed to register command duration histogram")
});

static COMMAND_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tg_chat_stats_command_total",
        "Total command executions by status",
        &["command", "status"]
    )
    .expect("failed to register command counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&CACHE_LOOKUPS);
    Lazy::force(&QUERY_DURATION);
    Lazy::force(&QUERY_TOTAL);
    Lazy::force(&COMMAND_DURATION);
    Lazy::force(&COMMAND_TOTAL);
}

/// Count a cache lookup outcome for a query kind.
pub fn record_cache_lookup(kind: &'static str, hit: bool) {
    init_collectors();
    CACHE_LOOKUPS
        .with_label_values(&[kind, if hit { "hit" } else { "miss" }])
        .inc();
}

/// Record a store aggregation with duration and status.
pub fn record_query(query: &'static str, duration: Duration, success: bool) {
    init_collectors();
    QUERY_DURATION
        .with_label_values(&[query])
        .observe(duration.as_secs_f64());
    QUERY_TOTAL
        .with_label_values(&[query, if success { "ok" } else { "error" }])
        .inc();
}

/// Record a CLI command with duration and status.
pub fn record_command(command: &'static str, duration: Duration, success: bool) {
    init_collectors();
    COMMAND_DURATION
        .with_label_values(&[command])
        .observe(duration.as_secs_f64());
    COMMAND_TOTAL
        .with_label_values(&[command, if success { "ok" } else { "error" }])
        .inc();
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::from("encode error"))
            .unwrap());
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, encoder.format_type())
        .body(Full::from(buffer))
        .unwrap())
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new()))
            .unwrap()),
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}
