use alloy_primitives::{Address, B256, Bytes, U256, address, b256};
use alloy_sol_types::SolValue;
use axum::body::{Body, to_bytes};
use http::{Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;

use nft_tx_analyzer::analyzer::rpc::ChainDataProvider;
use nft_tx_analyzer::analyzer::{TransactionAnalyzer, analyze_receipt};
use nft_tx_analyzer::models::common::Chain;
use nft_tx_analyzer::models::datasets::logs::{RawLog, TokenStandard};
use nft_tx_analyzer::models::datasets::transactions::{
    RpcTransactionReceiptData, TransactionStatus,
};
use nft_tx_analyzer::models::errors::{AnalysisError, ProviderError};
use nft_tx_analyzer::server::{AppState, router};
use nft_tx_analyzer::utils::retry::RetryConfig;

const TRANSFER: B256 = b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");
const APPROVAL: B256 = b256!("8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925");
const TRANSFER_SINGLE: B256 =
    b256!("c3d58168c5ae7397731d063d5bbf3d657854427343f4c083240f7aacaa2d0f62");
const TRANSFER_BATCH: B256 =
    b256!("4a39dc06d4c0dbc64b70af90fd698a233a518aa5d07e595d983b8c0526c8f7fb");

const NFT_721: Address = address!("2953399124f0cbb46d2cbacd8a89cf0599974963");
const NFT_1155: Address = address!("a5f1ea7df861952863df2e8d1312f7305dabf215");
const ERC20: Address = address!("7ceb23fd6bc0add59e62ac25578270cff1b9f619");
const SENDER: Address = address!("1111111111111111111111111111111111111111");
const RECIPIENT: Address = address!("2222222222222222222222222222222222222222");

const BLOCK_NUMBER: u64 = 50_000_000;
const BLOCK_TIMESTAMP: u64 = 1_700_000_000;

fn tx_hash() -> B256 {
    B256::repeat_byte(0x42)
}

fn hash_str() -> String {
    format!("{:#x}", tx_hash())
}

fn address_topic(address: Address) -> B256 {
    address.into_word()
}

fn raw_log(address: Address, topics: Vec<B256>, data: Vec<u8>, log_index: u64) -> RawLog {
    RawLog {
        address,
        topics,
        data: Bytes::from(data),
        log_index,
    }
}

fn erc721_transfer(log_index: u64, token_id: u64) -> RawLog {
    raw_log(
        NFT_721,
        vec![
            TRANSFER,
            address_topic(Address::ZERO),
            address_topic(RECIPIENT),
            B256::from(U256::from(token_id)),
        ],
        vec![],
        log_index,
    )
}

fn erc20_transfer(log_index: u64, amount: u64) -> RawLog {
    raw_log(
        ERC20,
        vec![TRANSFER, address_topic(SENDER), address_topic(RECIPIENT)],
        U256::from(amount).abi_encode(),
        log_index,
    )
}

fn erc20_approval(log_index: u64) -> RawLog {
    raw_log(
        ERC20,
        vec![APPROVAL, address_topic(SENDER), address_topic(RECIPIENT)],
        U256::MAX.abi_encode(),
        log_index,
    )
}

fn transfer_single(log_index: u64, id: u64, value: u64) -> RawLog {
    raw_log(
        NFT_1155,
        vec![
            TRANSFER_SINGLE,
            address_topic(SENDER),
            address_topic(SENDER),
            address_topic(RECIPIENT),
        ],
        (U256::from(id), U256::from(value)).abi_encode_params(),
        log_index,
    )
}

fn transfer_batch(log_index: u64, ids: &[u64], values: &[u64]) -> RawLog {
    let ids: Vec<U256> = ids.iter().copied().map(U256::from).collect();
    let values: Vec<U256> = values.iter().copied().map(U256::from).collect();
    raw_log(
        NFT_1155,
        vec![
            TRANSFER_BATCH,
            address_topic(SENDER),
            address_topic(SENDER),
            address_topic(RECIPIENT),
        ],
        (ids, values).abi_encode_params(),
        log_index,
    )
}

fn unknown_log(log_index: u64) -> RawLog {
    raw_log(ERC20, vec![B256::repeat_byte(0x99)], vec![1, 2, 3], log_index)
}

fn receipt(logs: Vec<RawLog>) -> RpcTransactionReceiptData {
    RpcTransactionReceiptData {
        tx_hash: tx_hash(),
        block_number: BLOCK_NUMBER,
        status: TransactionStatus::Success,
        from: SENDER,
        to: Some(NFT_721),
        contract_address: None,
        gas_used: 150_000,
        effective_gas_price: 30_000_000_000,
        logs,
    }
}

// Logs intentionally out of logIndex order
fn mixed_receipt() -> RpcTransactionReceiptData {
    receipt(vec![
        erc721_transfer(3, 7),
        erc20_transfer(1, 1_000),
        erc20_approval(0),
        transfer_batch(4, &[1, 2, 3], &[10, 20, 30]),
        transfer_single(2, 9, 5),
        unknown_log(5),
    ])
}

#[derive(Default)]
struct MockProvider {
    receipt: Option<RpcTransactionReceiptData>,
    latest_block: u64,
    fail_with: Option<ProviderError>,
    transient_failures: AtomicUsize,
    delay: Option<Duration>,
    receipt_calls: AtomicUsize,
    block_calls: AtomicUsize,
    latest_calls: AtomicUsize,
}

impl MockProvider {
    fn with_receipt(receipt: RpcTransactionReceiptData) -> Self {
        Self {
            receipt: Some(receipt),
            latest_block: BLOCK_NUMBER + 1_000,
            ..Self::default()
        }
    }

    fn failing(err: ProviderError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::default()
        }
    }

    fn total_calls(&self) -> usize {
        self.receipt_calls.load(Ordering::SeqCst)
            + self.block_calls.load(Ordering::SeqCst)
            + self.latest_calls.load(Ordering::SeqCst)
    }
}

impl ChainDataProvider for MockProvider {
    async fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<RpcTransactionReceiptData>, ProviderError> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Unavailable("connection reset".to_string()));
        }
        Ok(self.receipt.clone().filter(|r| r.tx_hash == tx_hash))
    }

    async fn get_block_timestamp(&self, block_number: u64) -> Result<Option<u64>, ProviderError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        Ok((block_number == BLOCK_NUMBER).then_some(BLOCK_TIMESTAMP))
    }

    async fn get_latest_block_number(&self) -> Result<u64, ProviderError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.latest_block)
    }
}

fn analyzer(provider: &Arc<MockProvider>) -> TransactionAnalyzer<Arc<MockProvider>> {
    TransactionAnalyzer::new(Arc::clone(provider), Chain::Polygon)
}

#[tokio::test]
async fn test_mixed_transaction() {
    let provider = Arc::new(MockProvider::with_receipt(mixed_receipt()));
    let data = analyzer(&provider).analyze(&hash_str()).await.unwrap();

    assert_eq!(data.all_events.len(), 6);
    let log_indices: Vec<u64> = data.all_events.iter().map(|e| e.log_index).collect();
    assert_eq!(log_indices, vec![0, 1, 2, 3, 4, 5]);

    assert_eq!(data.nft_analysis.erc721_transfers, 1);
    assert_eq!(data.nft_analysis.erc1155_transfers, 4);
    assert_eq!(data.nft_analysis.total_nft_events, 5);
    assert_eq!(data.nft_analysis.nft_contracts, 2);
    assert_eq!(
        data.nft_analysis.contract_addresses.iter().copied().collect::<Vec<_>>(),
        vec![NFT_1155, NFT_721]
    );

    assert_eq!(data.nft_transfers[0].token_id, U256::from(7));
    assert_eq!(data.nft_transfers[0].from, Address::ZERO);
    assert_eq!(data.all_events[1].standard, TokenStandard::Erc20);
    assert_eq!(data.all_events[3].standard, TokenStandard::Erc721);
    assert_eq!(data.all_events[5].event_type, "unknown");

    assert_eq!(data.events_summary.get("transfer"), Some(&2));
    assert_eq!(data.events_summary.get("approval"), Some(&1));
    assert_eq!(data.events_summary.get("transferSingle"), Some(&1));
    assert_eq!(data.events_summary.get("transferBatch"), Some(&1));
    assert_eq!(data.events_summary.get("unknown"), Some(&1));

    assert_eq!(data.timestamp, BLOCK_TIMESTAMP);
    assert_eq!(data.transaction_fee_wei, U256::from(4_500_000_000_000_000u64));
    assert_eq!(data.transaction_fee, 0.0045);
    assert_eq!(data.network, "polygon");
    assert_eq!(data.chain_id, 137);
}

#[tokio::test]
async fn test_output_json_contract() {
    let provider = Arc::new(MockProvider::with_receipt(mixed_receipt()));
    let data = analyzer(&provider).analyze(&hash_str()).await.unwrap();
    let json = serde_json::to_value(&data).unwrap();

    assert_eq!(json["transactionHash"], hash_str());
    assert_eq!(json["blockNumber"], BLOCK_NUMBER);
    assert_eq!(json["gasUsed"], 150_000);
    // Dashboard renders transactionFee.toFixed(6), so it must be a number
    assert_eq!(json["transactionFee"].as_f64(), Some(0.0045));
    assert_eq!(json["transactionFeeWei"], "4500000000000000");
    assert_eq!(json["status"], "success");
    assert_eq!(json["nftAnalysis"]["totalNFTEvents"], 5);
    assert_eq!(
        json["nftAnalysis"]["contractAddresses"][1],
        "0x2953399124f0cbb46d2cbacd8a89cf0599974963"
    );
    assert_eq!(json["nftTransfers"][0]["tokenId"], "7");
    assert_eq!(json["nftTransfers"][0]["standard"], "ERC-721");
    assert_eq!(json["erc1155Transfers"][3]["value"], "30");
    assert_eq!(json["allEvents"][2]["parsed"]["kind"], "transferSingle");
    assert_eq!(json["allEvents"][5]["parsed"]["error"], "unrecognized signature");
    assert_eq!(
        json["explorer"],
        format!("https://polygonscan.com/tx/{}", hash_str())
    );
    assert!(json.get("contractAddress").is_none());
}

#[tokio::test]
async fn test_invalid_hash_makes_no_provider_calls() {
    let provider = Arc::new(MockProvider::with_receipt(mixed_receipt()));
    let analyzer = analyzer(&provider);

    let short = &hash_str()[..65];
    let err = analyzer.analyze(short).await.unwrap_err();

    assert!(matches!(err, AnalysisError::InvalidInput(_)));
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn test_missing_transaction_is_not_found() {
    let provider = Arc::new(MockProvider::default());
    let err = analyzer(&provider).analyze(&hash_str()).await.unwrap_err();

    assert_eq!(err, AnalysisError::NotFound(tx_hash()));
    assert!(!err.is_retryable());
    assert_eq!(provider.receipt_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.block_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_provider_failure_is_surfaced() {
    let provider = Arc::new(MockProvider::failing(ProviderError::Unavailable(
        "502 Bad Gateway".to_string(),
    )));
    let err = analyzer(&provider).analyze(&hash_str()).await.unwrap_err();

    assert_eq!(
        err,
        AnalysisError::ProviderUnavailable("502 Bad Gateway".to_string())
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let provider = Arc::new(MockProvider {
        delay: Some(Duration::from_millis(500)),
        ..MockProvider::with_receipt(mixed_receipt())
    });
    let err = analyzer(&provider)
        .with_request_timeout(Duration::from_millis(20))
        .analyze(&hash_str())
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::ProviderTimeout { .. }));
}

#[test]
fn test_batch_expands_per_pair() {
    let data = analyze_receipt(
        Chain::Ethereum,
        receipt(vec![transfer_batch(0, &[1, 2, 3], &[10, 20, 30])]),
        BLOCK_TIMESTAMP,
    );

    assert_eq!(data.erc1155_transfers.len(), 3);
    for (transfer, (id, value)) in data.erc1155_transfers.iter().zip([(1, 10), (2, 20), (3, 30)]) {
        assert_eq!(transfer.token_id, U256::from(id));
        assert_eq!(transfer.value, U256::from(value));
        assert_eq!(transfer.operator, SENDER);
        assert_eq!(transfer.to, RECIPIENT);
        assert_eq!(transfer.log_index, 0);
    }
}

#[test]
fn test_batch_length_mismatch_does_not_abort() {
    let data = analyze_receipt(
        Chain::Polygon,
        receipt(vec![
            transfer_batch(0, &[1, 2, 3], &[10, 20]),
            erc721_transfer(1, 11),
        ]),
        BLOCK_TIMESTAMP,
    );

    assert_eq!(data.all_events.len(), 2);
    let error = data.all_events[0].parsed.clone();
    assert!(error.is_error());
    assert_eq!(
        serde_json::to_value(&error).unwrap()["error"],
        "array length mismatch: 3 ids, 2 values"
    );
    assert!(data.erc1155_transfers.is_empty());
    assert_eq!(data.nft_transfers.len(), 1);
    // The failed batch is still an ERC-1155 log, so its contract counts
    assert_eq!(data.all_events[0].standard, TokenStandard::Erc1155);
    assert_eq!(
        data.nft_analysis.contract_addresses.iter().copied().collect::<Vec<_>>(),
        vec![NFT_1155, NFT_721]
    );
}

#[test]
fn test_dirty_erc721_transfer_is_still_erc721() {
    let mut topics = erc721_transfer(0, 42).topics;
    topics[2] = B256::repeat_byte(0xff);
    let data = analyze_receipt(
        Chain::Polygon,
        receipt(vec![raw_log(NFT_721, topics, vec![], 0)]),
        BLOCK_TIMESTAMP,
    );

    assert!(data.all_events[0].parsed.is_error());
    assert_eq!(data.all_events[0].standard, TokenStandard::Erc721);
    assert!(data.nft_transfers.is_empty());
    assert_eq!(
        data.nft_analysis.contract_addresses.iter().copied().collect::<Vec<_>>(),
        vec![NFT_721]
    );
}

#[test]
fn test_invariants_hold() {
    let receipts = [
        mixed_receipt(),
        receipt(vec![]),
        receipt(vec![unknown_log(0), unknown_log(1)]),
        receipt(vec![erc721_transfer(0, 1), erc721_transfer(1, 2), erc721_transfer(2, 3)]),
        receipt(vec![transfer_batch(0, &[1, 2], &[1]), erc20_transfer(1, 5)]),
    ];

    for receipt in receipts {
        let log_count = receipt.logs.len();
        let data = analyze_receipt(Chain::Polygon, receipt, BLOCK_TIMESTAMP);

        assert_eq!(data.all_events.len(), log_count);
        assert_eq!(
            data.nft_analysis.total_nft_events,
            data.nft_transfers.len() + data.erc1155_transfers.len()
        );
        assert_eq!(data.events_summary.values().sum::<usize>(), log_count);
        assert_eq!(
            data.nft_analysis.nft_contracts,
            data.nft_analysis.contract_addresses.len()
        );
        let mut nft_logs: Vec<Address> = Vec::new();
        for event in data.all_events.iter().filter(|e| e.standard.is_nft()) {
            if !nft_logs.contains(&event.address) {
                nft_logs.push(event.address);
            }
        }
        assert_eq!(
            data.nft_analysis.contract_addresses.iter().copied().collect::<Vec<_>>(),
            nft_logs
        );
        assert!(data.nft_transfers.is_sorted_by_key(|t| t.log_index));
        assert!(data.erc1155_transfers.is_sorted_by_key(|t| t.log_index));
    }
}

#[tokio::test]
async fn test_analysis_is_idempotent() {
    let provider = Arc::new(MockProvider::with_receipt(mixed_receipt()));
    let analyzer = analyzer(&provider);

    let hash = hash_str();

    let first = serde_json::to_vec(&analyzer.analyze(&hash).await.unwrap()).unwrap();
    let concurrent = futures::future::join_all((0..4).map(|_| analyzer.analyze(&hash))).await;

    for result in concurrent {
        assert_eq!(serde_json::to_vec(&result.unwrap()).unwrap(), first);
    }
}

#[tokio::test]
async fn test_final_result_is_cached() {
    let provider = Arc::new(MockProvider::with_receipt(mixed_receipt()));
    let analyzer = analyzer(&provider).with_cache(16, 64);

    let first = analyzer.analyze(&hash_str()).await.unwrap();
    let calls_after_first = provider.total_calls();
    let second = analyzer.analyze(&hash_str()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(provider.total_calls(), calls_after_first);
    assert_eq!(provider.latest_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_recent_result_is_not_cached() {
    let provider = Arc::new(MockProvider {
        latest_block: BLOCK_NUMBER + 3,
        ..MockProvider::with_receipt(mixed_receipt())
    });
    let analyzer = analyzer(&provider).with_cache(16, 64);

    analyzer.analyze(&hash_str()).await.unwrap();
    analyzer.analyze(&hash_str()).await.unwrap();

    assert_eq!(provider.receipt_calls.load(Ordering::SeqCst), 2);
    assert!(analyzer.cache().unwrap().is_empty().await);
}

fn app(provider: &Arc<MockProvider>) -> axum::Router {
    router(Arc::new(AppState {
        analyzer: analyzer(provider),
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            exponential: 2.0,
        },
    }))
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_route_success() {
    let provider = Arc::new(MockProvider::with_receipt(mixed_receipt()));
    let (status, body) = get(
        app(&provider),
        &format!("/api/polygon/nft-transaction/{}", hash_str()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["nftAnalysis"]["totalNFTEvents"], 5);
}

#[tokio::test]
async fn test_route_error_statuses() {
    let provider = Arc::new(MockProvider::default());

    let (status, body) = get(app(&provider), "/api/polygon/nft-transaction/0x1234").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "invalidInput");

    let (status, body) = get(
        app(&provider),
        &format!("/api/polygon/nft-transaction/{}", hash_str()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "notFound");
    // Not retried
    assert_eq!(provider.receipt_calls.load(Ordering::SeqCst), 1);

    let (status, body) = get(
        app(&provider),
        &format!("/api/ethereum/nft-transaction/{}", hash_str()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "unsupportedNetwork");
}

#[tokio::test]
async fn test_route_retries_transient_failures() {
    let provider = Arc::new(MockProvider {
        transient_failures: AtomicUsize::new(2),
        ..MockProvider::with_receipt(mixed_receipt())
    });
    let (status, _) = get(
        app(&provider),
        &format!("/api/polygon/nft-transaction/{}", hash_str()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(provider.receipt_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_route_gives_up_on_persistent_failure() {
    let provider = Arc::new(MockProvider::failing(ProviderError::Unavailable(
        "node down".to_string(),
    )));
    let (status, body) = get(
        app(&provider),
        &format!("/api/polygon/nft-transaction/{}", hash_str()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "providerUnavailable");
    assert_eq!(provider.receipt_calls.load(Ordering::SeqCst), 3);
}
