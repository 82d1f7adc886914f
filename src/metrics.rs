use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use axum::{Router, routing::get};
use http::StatusCode;
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
use opentelemetry_sdk::metrics::{MetricError, SdkMeterProvider};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;

pub struct Metrics {
    registry: Arc<prometheus::Registry>,
    _provider: SdkMeterProvider,
    pub chain_name: String,

    // Analysis metrics
    pub analyses: Counter<u64>,
    pub analysis_latency: Histogram<f64>,
    pub logs_decoded: Counter<u64>,
    pub decode_errors: Counter<u64>,
    pub cache_hits: Counter<u64>,

    // RPC metrics
    pub rpc_requests: Counter<u64>,
    pub rpc_errors: Counter<u64>,
    pub rpc_latency: Histogram<f64>,
}

impl Metrics {
    pub fn new(chain_name: String) -> Result<Self, MetricError> {
        // Create a new prometheus registry
        let registry = prometheus::Registry::new();

        // Configure OpenTelemetry to use this registry
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        // Set up a meter to create instruments
        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("nft_analyzer_metrics");

        let analyses = meter
            .u64_counter("nft_analyzer_analyses")
            .with_description("Number of transaction analyses by outcome")
            .build();

        let analysis_latency = meter
            .f64_histogram("nft_analyzer_analysis_latency")
            .with_description("End-to-end analysis latency")
            .with_boundaries(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
            .with_unit("s")
            .build();

        let logs_decoded = meter
            .u64_counter("nft_analyzer_logs_decoded")
            .with_description("Number of receipt logs decoded")
            .build();

        let decode_errors = meter
            .u64_counter("nft_analyzer_decode_errors")
            .with_description("Number of logs that could not be decoded")
            .build();

        let cache_hits = meter
            .u64_counter("nft_analyzer_cache_hits")
            .with_description("Number of analyses served from cache")
            .build();

        let rpc_requests = meter
            .u64_counter("nft_analyzer_rpc_requests")
            .with_description("Number of RPC requests made")
            .build();

        let rpc_errors = meter
            .u64_counter("nft_analyzer_rpc_errors")
            .with_description("Number of RPC errors encountered")
            .build();

        let rpc_latency = meter
            .f64_histogram("nft_analyzer_rpc_latency")
            .with_description("RPC request latency")
            .with_boundaries(vec![
                0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 1.0, 5.0, 10.0,
            ])
            .with_unit("s")
            .build();

        Ok(Self {
            registry: Arc::new(registry),
            _provider: provider,
            chain_name,
            analyses,
            analysis_latency,
            logs_decoded,
            decode_errors,
            cache_hits,
            rpc_requests,
            rpc_errors,
            rpc_latency,
        })
    }

    fn chain_label(&self) -> KeyValue {
        KeyValue::new("chain", self.chain_name.clone())
    }

    pub fn record_rpc_call(&self, method: &'static str, elapsed_secs: f64, is_error: bool) {
        let labels = [self.chain_label(), KeyValue::new("method", method)];
        self.rpc_requests.add(1, &labels);
        self.rpc_latency.record(elapsed_secs, &labels);
        if is_error {
            self.rpc_errors.add(1, &labels);
        }
    }

    pub fn record_analysis(&self, outcome: &'static str, elapsed_secs: f64) {
        let labels = [self.chain_label(), KeyValue::new("outcome", outcome)];
        self.analyses.add(1, &labels);
        self.analysis_latency.record(elapsed_secs, &labels);
    }

    pub fn record_logs(&self, decoded: u64, errors: u64) {
        self.logs_decoded.add(decoded, &[self.chain_label()]);
        if errors > 0 {
            self.decode_errors.add(errors, &[self.chain_label()]);
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.add(1, &[self.chain_label()]);
    }

    pub fn encode(&self) -> Result<String> {
        encode_registry(&self.registry)
    }

    pub async fn start_metrics_server(&self, addr: &str, port: u16) -> Result<()> {
        let addr = format!("{addr}:{port}")
            .parse::<SocketAddr>()
            .context("invalid metrics address")?;
        let registry = self.registry.clone();

        let app = Router::new().route("/metrics", get(move || metrics_handler(registry.clone())));

        // Determine the access URL based on the binding address. Only used for logging.
        let access_url = if addr.ip().to_string() == "0.0.0.0" {
            format!("http://localhost:{port}/metrics")
        } else {
            format!("http://{}:{port}/metrics", addr.ip())
        };

        info!(
            "Starting metrics server - binding to {} (accessible at {})",
            addr, access_url
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("failed to bind metrics listener")?;

        // Spawn the server in a separate task
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Metrics server stopped: {}", e);
            }
        });

        Ok(())
    }
}

fn encode_registry(registry: &prometheus::Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

async fn metrics_handler(registry: Arc<prometheus::Registry>) -> Result<String, StatusCode> {
    encode_registry(&registry).map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
