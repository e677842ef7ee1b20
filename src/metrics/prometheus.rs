//! Prometheus metrics definitions and HTTP server

use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::index::OwnerIndex;

lazy_static::lazy_static! {
    /// Total number of reconciliations
    pub static ref RECONCILIATIONS: CounterVec = register_counter_vec!(
        "node_remediation_operator_reconciliations_total",
        "Total number of reconciliations",
        &["kind"]
    ).unwrap();

    /// Total number of reconciliation errors
    pub static ref RECONCILIATION_ERRORS: CounterVec = register_counter_vec!(
        "node_remediation_operator_reconciliation_errors_total",
        "Total number of reconciliation errors",
        &["kind"]
    ).unwrap();

    /// Reconciliation duration histogram
    pub static ref RECONCILE_DURATION: HistogramVec = register_histogram_vec!(
        "node_remediation_operator_reconcile_duration_seconds",
        "Duration of reconciliations in seconds",
        &["kind"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// NodeRemediations created, by owning template
    pub static ref REMEDIATIONS_CREATED: CounterVec = register_counter_vec!(
        "node_remediation_operator_remediations_created_total",
        "Total number of NodeRemediations created",
        &["template"]
    ).unwrap();

    /// NodeRemediations updated, by owning template
    pub static ref REMEDIATIONS_UPDATED: CounterVec = register_counter_vec!(
        "node_remediation_operator_remediations_updated_total",
        "Total number of NodeRemediations updated",
        &["template"]
    ).unwrap();

    /// NodeRemediations deleted, by owning template
    pub static ref REMEDIATIONS_DELETED: CounterVec = register_counter_vec!(
        "node_remediation_operator_remediations_deleted_total",
        "Total number of NodeRemediations deleted",
        &["template"]
    ).unwrap();

    /// Node events translated into template reconcile triggers
    pub static ref NODE_EVENTS_ROUTED: CounterVec = register_counter_vec!(
        "node_remediation_operator_node_events_routed_total",
        "Node events by whether they triggered at least one template",
        &["outcome"]
    ).unwrap();

    /// NodeRemediations currently attributed to a template by the owner index
    pub static ref OWNER_INDEX_SIZE: Gauge = register_gauge!(
        "node_remediation_operator_owner_index_size",
        "Number of NodeRemediations attributed to a template"
    ).unwrap();

    /// Operator health (1 = healthy, 0 = unhealthy)
    pub static ref OPERATOR_HEALTH: Gauge = register_gauge!(
        "node_remediation_operator_health",
        "Operator health status (1 = healthy, 0 = unhealthy)"
    ).unwrap();
}

/// Start the metrics HTTP server
///
/// `/readyz` reports ready once `index` has completed its initial list.
pub async fn serve(port: u16, index: OwnerIndex) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    // Set initial health
    OPERATOR_HEALTH.set(1.0);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let index = index.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let ready = index.is_ready();
                async move { handle_request(req, ready).await }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection: {}", e);
            }
        });
    }
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    ready: bool,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    Ok(route(req.uri().path(), ready))
}

fn route(path: &str, ready: bool) -> Response<Full<Bytes>> {
    match path {
        "/metrics" => metrics_response(),
        "/healthz" | "/health" => text_response(StatusCode::OK, "ok"),
        "/readyz" | "/ready" if ready => text_response(StatusCode::OK, "ok"),
        "/readyz" | "/ready" => text_response(StatusCode::SERVICE_UNAVAILABLE, "owner index syncing"),
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    }
}

/// Generate metrics response
fn metrics_response() -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics");
    }

    let mut response = Response::new(Full::new(Bytes::from(buffer)));
    if let Ok(content_type) = encoder.format_type().parse::<hyper::header::HeaderValue>() {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, content_type);
    }
    response
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
