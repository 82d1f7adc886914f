use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::datasets::logs::{DecodedEvent, RawLog};
use crate::models::datasets::transfers::{Transfer721, Transfer1155};
use crate::utils::u256_decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failed,
    // Pre-Byzantium receipts carry a state root instead of a status flag
    Unknown,
}

////////////////////////////////////// RPC Data ////////////////////////////////////////
// Everything the analyzer needs from the chain for one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcTransactionReceiptData {
    pub tx_hash: B256,
    pub block_number: u64,
    pub status: TransactionStatus,
    pub from: Address,
    pub to: Option<Address>,
    pub contract_address: Option<Address>,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    pub logs: Vec<RawLog>,
}

/////////////////////////////////// Transformed Data ///////////////////////////////////
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NftAnalysis {
    #[serde(rename = "totalNFTEvents")]
    pub total_nft_events: usize,
    pub erc721_transfers: usize,
    pub erc1155_transfers: usize,
    pub nft_contracts: usize,
    pub contract_addresses: IndexSet<Address>,
}

// Final output format
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NftTransactionData {
    pub transaction_hash: B256,
    pub chain_id: u64,
    pub block_number: u64,
    pub block_time: Option<DateTime<Utc>>,
    pub gas_used: u64,
    pub gas_price: u128,
    // Whole native units (ETH, POL, ...) as a JSON number
    pub transaction_fee: f64,
    #[serde(with = "u256_decimal")]
    pub transaction_fee_wei: U256,
    pub transaction_fee_native: String,
    pub status: TransactionStatus,
    pub from: Address,
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    pub nft_analysis: NftAnalysis,
    pub nft_transfers: Vec<Transfer721>,
    pub erc1155_transfers: Vec<Transfer1155>,
    pub all_events: Vec<DecodedEvent>,
    pub events_summary: BTreeMap<String, usize>,
    pub network: String,
    pub explorer: String,
    pub timestamp: u64,
}
