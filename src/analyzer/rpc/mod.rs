pub mod receipts;

use alloy_eips::BlockNumberOrTag;
use alloy_network::AnyNetwork;
use alloy_primitives::B256;
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_transport::TransportResult;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;
use url::Url;

use crate::analyzer::rpc::receipts::ReceiptParser;
use crate::metrics::Metrics;
use crate::models::datasets::transactions::RpcTransactionReceiptData;
use crate::models::errors::ProviderError;
use crate::utils::strip_html;

/// Source of on-chain data for the analyzer. `Ok(None)` means the node has
/// no record of the requested item.
pub trait ChainDataProvider: Send + Sync {
    fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = Result<Option<RpcTransactionReceiptData>, ProviderError>> + Send;

    fn get_block_timestamp(
        &self,
        block_number: u64,
    ) -> impl Future<Output = Result<Option<u64>, ProviderError>> + Send;

    fn get_latest_block_number(&self) -> impl Future<Output = Result<u64, ProviderError>> + Send;
}

impl<P: ChainDataProvider> ChainDataProvider for Arc<P> {
    fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = Result<Option<RpcTransactionReceiptData>, ProviderError>> + Send {
        (**self).get_transaction_receipt(tx_hash)
    }

    fn get_block_timestamp(
        &self,
        block_number: u64,
    ) -> impl Future<Output = Result<Option<u64>, ProviderError>> + Send {
        (**self).get_block_timestamp(block_number)
    }

    fn get_latest_block_number(&self) -> impl Future<Output = Result<u64, ProviderError>> + Send {
        (**self).get_latest_block_number()
    }
}

/// JSON-RPC backed provider.
#[derive(Clone)]
pub struct RpcChainDataProvider {
    provider: DynProvider<AnyNetwork>,
    metrics: Option<Arc<Metrics>>,
}

impl RpcChainDataProvider {
    pub fn new(rpc_url: Url, metrics: Option<Arc<Metrics>>) -> Self {
        let provider = ProviderBuilder::new()
            .network::<AnyNetwork>()
            .connect_http(rpc_url)
            .erased();
        Self { provider, metrics }
    }

    pub async fn get_chain_id(&self) -> Result<u64, ProviderError> {
        self.observe("get_chain_id", self.provider.get_chain_id()).await
    }

    async fn observe<T, C>(&self, method: &'static str, call: C) -> Result<T, ProviderError>
    where
        C: IntoFuture<Output = TransportResult<T>>,
    {
        let start = Instant::now();
        let result = call.await;

        // Record metrics if enabled
        if let Some(metrics) = &self.metrics {
            metrics.record_rpc_call(method, start.elapsed().as_secs_f64(), result.is_err());
        }

        result.map_err(|e| {
            warn!("Failed to {}. Error details:\n{:#?}", method, e);
            ProviderError::Unavailable(strip_html(&e.to_string()))
        })
    }
}

impl ChainDataProvider for RpcChainDataProvider {
    async fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<RpcTransactionReceiptData>, ProviderError> {
        let receipt = self
            .observe(
                "get_transaction_receipt",
                self.provider.get_transaction_receipt(tx_hash),
            )
            .await?;

        receipt
            .map(|receipt| receipt.parse_transaction_receipt())
            .transpose()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))
    }

    async fn get_block_timestamp(&self, block_number: u64) -> Result<Option<u64>, ProviderError> {
        let block = self
            .observe(
                "get_block_by_number",
                self.provider
                    .get_block_by_number(BlockNumberOrTag::Number(block_number)),
            )
            .await?;

        Ok(block.map(|block| block.header.timestamp))
    }

    async fn get_latest_block_number(&self) -> Result<u64, ProviderError> {
        self.observe("get_block_number", self.provider.get_block_number())
            .await
    }
}
