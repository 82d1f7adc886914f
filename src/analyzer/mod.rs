pub mod cache;
pub mod rpc;
pub mod signatures;
pub mod transformations;

use alloy_primitives::B256;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::analyzer::cache::{AnalysisCache, is_final};
use crate::analyzer::rpc::ChainDataProvider;
use crate::analyzer::transformations::{
    aggregate::TransferAggregator, classify::classify, logs::LogDecoder,
};
use crate::metrics::Metrics;
use crate::models::common::Chain;
use crate::models::datasets::transactions::{NftTransactionData, RpcTransactionReceiptData};
use crate::models::errors::{AnalysisError, ProviderError};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Lifecycle of a single analysis. `Failed` is only reachable from
/// `Fetching`; once a receipt is in hand every later stage completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Fetching,
    Decoding,
    Classifying,
    Aggregating,
    Done,
    Failed,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::Decoding => "decoding",
            Self::Classifying => "classifying",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Parse a `0x`-prefixed, 64 hex digit transaction hash.
pub fn parse_transaction_hash(input: &str) -> Result<B256, AnalysisError> {
    if input.len() != 66 {
        return Err(AnalysisError::InvalidInput(format!(
            "expected 66 characters, got {}",
            input.len()
        )));
    }

    let digits = input
        .strip_prefix("0x")
        .ok_or_else(|| AnalysisError::InvalidInput("missing 0x prefix".to_string()))?;

    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AnalysisError::InvalidInput(
            "hash contains non-hex characters".to_string(),
        ));
    }

    input
        .parse::<B256>()
        .map_err(|e| AnalysisError::InvalidInput(e.to_string()))
}

pub struct TransactionAnalyzer<P> {
    provider: P,
    chain: Chain,
    request_timeout: Duration,
    finality_confirmations: u64,
    cache: Option<AnalysisCache>,
    metrics: Option<Arc<Metrics>>,
}

impl<P: ChainDataProvider> TransactionAnalyzer<P> {
    pub fn new(provider: P, chain: Chain) -> Self {
        Self {
            provider,
            chain,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            finality_confirmations: 0,
            cache: None,
            metrics: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Cache results once their block has `finality_confirmations`
    /// confirmations. A `max_entries` of zero leaves caching off.
    pub fn with_cache(mut self, max_entries: usize, finality_confirmations: u64) -> Self {
        self.cache = NonZeroUsize::new(max_entries).map(AnalysisCache::new);
        self.finality_confirmations = finality_confirmations;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn cache(&self) -> Option<&AnalysisCache> {
        self.cache.as_ref()
    }

    /// Analyze one transaction. The hash is validated before any provider
    /// call is made, and no retries are attempted here.
    pub async fn analyze(&self, tx_hash: &str) -> Result<NftTransactionData, AnalysisError> {
        let start = Instant::now();
        let result = self.run(tx_hash).await;

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "success",
                Err(e) => e.kind(),
            };
            metrics.record_analysis(outcome, start.elapsed().as_secs_f64());
        }

        result
    }

    async fn run(&self, tx_hash: &str) -> Result<NftTransactionData, AnalysisError> {
        let tx_hash = parse_transaction_hash(tx_hash)?;

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&tx_hash).await {
                debug!("Cache hit for transaction {:#x}", tx_hash);
                if let Some(metrics) = &self.metrics {
                    metrics.record_cache_hit();
                }
                return Ok(NftTransactionData::clone(&hit));
            }
        }

        debug!("Transaction {:#x}: {}", tx_hash, AnalysisStage::Fetching);
        let (receipt, timestamp) = match self.fetch(tx_hash).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(
                    "Transaction {:#x}: {} ({})",
                    tx_hash,
                    AnalysisStage::Failed,
                    e
                );
                return Err(e);
            }
        };

        let data = analyze_receipt(self.chain, receipt, timestamp);

        if let Some(metrics) = &self.metrics {
            let errors = data.all_events.iter().filter(|e| e.parsed.is_error()).count();
            metrics.record_logs(data.all_events.len() as u64, errors as u64);
        }

        info!(
            "Analyzed transaction {:#x}: {} logs, {} NFT transfers across {} contracts",
            tx_hash,
            data.all_events.len(),
            data.nft_analysis.total_nft_events,
            data.nft_analysis.nft_contracts
        );

        if let Some(cache) = &self.cache {
            self.cache_if_final(cache, &data).await;
        }

        Ok(data)
    }

    async fn fetch(
        &self,
        tx_hash: B256,
    ) -> Result<(RpcTransactionReceiptData, u64), AnalysisError> {
        let receipt = self
            .bounded(self.provider.get_transaction_receipt(tx_hash))
            .await?
            .ok_or(AnalysisError::NotFound(tx_hash))?;

        let timestamp = self
            .bounded(self.provider.get_block_timestamp(receipt.block_number))
            .await?
            .ok_or_else(|| {
                AnalysisError::ProviderUnavailable(format!(
                    "block {} of transaction {:#x} not found",
                    receipt.block_number, tx_hash
                ))
            })?;

        Ok((receipt, timestamp))
    }

    async fn cache_if_final(&self, cache: &AnalysisCache, data: &NftTransactionData) {
        let latest = match self.bounded(self.provider.get_latest_block_number()).await {
            Ok(latest) => latest,
            Err(e) => {
                warn!("Skipping cache for {:#x}: {}", data.transaction_hash, e);
                return;
            }
        };

        if is_final(data.block_number, latest, self.finality_confirmations) {
            cache.insert(Arc::new(data.clone())).await;
        } else {
            debug!(
                "Transaction {:#x} at block {} not final (tip {}), not caching",
                data.transaction_hash, data.block_number, latest
            );
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, AnalysisError> {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(|e| provider_fault(e, self.request_timeout)),
            Err(_) => Err(provider_fault(ProviderError::Timeout, self.request_timeout)),
        }
    }
}

fn provider_fault(err: ProviderError, timeout: Duration) -> AnalysisError {
    match err {
        ProviderError::Timeout => AnalysisError::ProviderTimeout {
            timeout_secs: timeout.as_secs(),
        },
        ProviderError::Unavailable(reason) => AnalysisError::ProviderUnavailable(reason),
    }
}

/// Run the decode, classify and aggregate stages over a fetched receipt.
/// Pure and deterministic: the same receipt always yields the same output.
pub fn analyze_receipt(
    chain: Chain,
    mut receipt: RpcTransactionReceiptData,
    timestamp: u64,
) -> NftTransactionData {
    let logs = std::mem::take(&mut receipt.logs);

    debug!("Transaction {:#x}: {}", receipt.tx_hash, AnalysisStage::Decoding);
    let events = logs.decode_logs();

    debug!("Transaction {:#x}: {}", receipt.tx_hash, AnalysisStage::Classifying);
    let classified: Vec<_> = events
        .into_iter()
        .map(|event| {
            let classification = classify(&event);
            (event, classification)
        })
        .collect();

    debug!("Transaction {:#x}: {}", receipt.tx_hash, AnalysisStage::Aggregating);
    let mut aggregator = TransferAggregator::with_capacity(classified.len());
    for (event, classification) in classified {
        aggregator.record(event, classification);
    }
    let data = aggregator.finish(chain, &receipt, timestamp);

    debug!("Transaction {:#x}: {}", receipt.tx_hash, AnalysisStage::Done);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transaction_hash() {
        let hash = format!("0x{}", "ab".repeat(32));
        assert_eq!(parse_transaction_hash(&hash).unwrap(), B256::repeat_byte(0xab));

        let upper = format!("0x{}", "AB".repeat(32));
        assert_eq!(parse_transaction_hash(&upper).unwrap(), B256::repeat_byte(0xab));
    }

    #[test]
    fn test_parse_transaction_hash_rejects_bad_input() {
        let short = format!("0x{}", "a".repeat(63));
        let no_prefix = "ab".repeat(33);
        let non_hex = format!("0x{}", "zz".repeat(32));

        for input in [short.as_str(), no_prefix.as_str(), non_hex.as_str(), ""] {
            assert!(
                matches!(parse_transaction_hash(input), Err(AnalysisError::InvalidInput(_))),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn test_provider_fault_mapping() {
        let timeout = Duration::from_secs(20);
        assert_eq!(
            provider_fault(ProviderError::Timeout, timeout),
            AnalysisError::ProviderTimeout { timeout_secs: 20 }
        );
        assert!(provider_fault(ProviderError::Unavailable("down".into()), timeout).is_retryable());
    }
}
