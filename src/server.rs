use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
};
use http::StatusCode;
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use crate::analyzer::TransactionAnalyzer;
use crate::analyzer::rpc::ChainDataProvider;
use crate::models::datasets::transactions::NftTransactionData;
use crate::models::errors::AnalysisError;
use crate::utils::retry::{RetryConfig, retry};

#[derive(Serialize)]
struct AnalysisResponse {
    success: bool,
    data: NftTransactionData,
}

pub struct AppState<P> {
    pub analyzer: TransactionAnalyzer<P>,
    pub retry: RetryConfig,
}

pub fn router<P: ChainDataProvider + 'static>(state: Arc<AppState<P>>) -> Router {
    Router::new()
        .route("/health", get(health::<P>))
        .route(
            "/api/{network}/nft-transaction/{hash}",
            get(analyze_transaction::<P>),
        )
        .with_state(state)
}

async fn health<P: ChainDataProvider + 'static>(
    State(state): State<Arc<AppState<P>>>,
) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "network": state.analyzer.chain().name() }))
}

async fn analyze_transaction<P: ChainDataProvider + 'static>(
    State(state): State<Arc<AppState<P>>>,
    Path((network, hash)): Path<(String, String)>,
) -> Response {
    let chain = state.analyzer.chain();
    if !network.eq_ignore_ascii_case(chain.name()) {
        return error_response(
            StatusCode::NOT_FOUND,
            "unsupportedNetwork",
            format!("This service analyzes {} transactions, not {}", chain.name(), network),
        );
    }

    let result = retry(
        || state.analyzer.analyze(&hash),
        &state.retry,
        AnalysisError::is_retryable,
        "analyze_transaction",
    )
    .await;

    match result {
        Ok(data) => Json(AnalysisResponse {
            success: true,
            data,
        })
        .into_response(),
        Err(e) => {
            warn!("Analysis of {} failed: {}", hash, e);
            error_response(status_for(&e), e.kind(), e.to_string())
        }
    }
}

pub fn status_for(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AnalysisError::NotFound(_) => StatusCode::NOT_FOUND,
        AnalysisError::ProviderTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        AnalysisError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
    }
}

fn error_response(status: StatusCode, kind: &str, message: String) -> Response {
    let body = json!({ "success": false, "error": message, "kind": kind });
    (status, Json(body)).into_response()
}

/// Serve the API until Ctrl+C.
pub async fn serve(app: Router, address: &str, port: u16) -> Result<()> {
    let addr = format!("{address}:{port}")
        .parse::<SocketAddr>()
        .context("invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Serving NFT transaction analysis on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received Ctrl+C signal, shutting down...");
            }
        })
        .await
        .context("server error")
}
