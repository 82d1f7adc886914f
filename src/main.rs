use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};
use url::Url;

use nft_tx_analyzer::analyzer::TransactionAnalyzer;
use nft_tx_analyzer::analyzer::rpc::RpcChainDataProvider;
use nft_tx_analyzer::metrics::Metrics;
use nft_tx_analyzer::models::common::Chain;
use nft_tx_analyzer::models::errors::{AnalysisError, ProviderError};
use nft_tx_analyzer::server::{self, AppState};
use nft_tx_analyzer::utils::load_config;
use nft_tx_analyzer::utils::retry::{RetryConfig, retry};

const CONFIG_PATH_ENV: &str = "NFT_ANALYZER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = match load_config(&config_path) {
        Ok(config) => {
            info!("Config loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load config: {:#}", e);
            return Err(e);
        }
    };

    let chain = Chain::from_chain_id(config.chain_id)?;
    info!("Network: {} (chain ID {})", chain.name(), chain.chain_id());

    // Initialize optional metrics
    let metrics = if config.metrics.enabled {
        let metrics = Arc::new(Metrics::new(chain.name().to_string())?);
        metrics
            .start_metrics_server(&config.metrics.address, config.metrics.port)
            .await?;
        Some(metrics)
    } else {
        info!("Metrics are disabled");
        None
    };

    // Create RPC provider
    let rpc_url: Url = config
        .rpc_url
        .parse()
        .with_context(|| format!("invalid RPC URL: {}", config.rpc_url))?;
    let provider = RpcChainDataProvider::new(rpc_url, metrics.clone());

    let retry_config = RetryConfig::from(&config.retry);

    // Catch a misconfigured RPC endpoint before serving any request
    let remote_chain_id = retry(
        || provider.get_chain_id(),
        &retry_config,
        |_: &ProviderError| true,
        "get_chain_id",
    )
    .await?;
    if remote_chain_id != chain.chain_id() {
        return Err(anyhow!(
            "RPC endpoint reports chain ID {} but config expects {}",
            remote_chain_id,
            chain.chain_id()
        ));
    }

    let mut analyzer = TransactionAnalyzer::new(provider, chain)
        .with_request_timeout(Duration::from_secs(config.request_timeout_secs));
    if config.cache.enabled {
        analyzer = analyzer.with_cache(config.cache.max_entries, config.finality_confirmations);
    } else {
        warn!("Result cache is disabled");
    }
    if let Some(metrics) = metrics {
        analyzer = analyzer.with_metrics(metrics);
    }

    // One-shot mode: analyze the hash given on the command line and print JSON
    if let Some(hash) = std::env::args().nth(1) {
        let data = retry(
            || analyzer.analyze(&hash),
            &retry_config,
            AnalysisError::is_retryable,
            "analyze_transaction",
        )
        .await?;
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    let state = Arc::new(AppState {
        analyzer,
        retry: retry_config,
    });
    server::serve(
        server::router(state),
        &config.server.address,
        config.server.port,
    )
    .await
}
