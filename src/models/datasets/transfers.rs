use alloy_primitives::{Address, U256};
use serde::Serialize;

use crate::models::datasets::logs::TokenStandard;
use crate::utils::u256_decimal;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer721 {
    pub log_index: u64,
    pub contract: Address,
    pub from: Address,
    pub to: Address,
    #[serde(with = "u256_decimal")]
    pub token_id: U256,
    pub standard: TokenStandard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer1155 {
    pub log_index: u64,
    pub contract: Address,
    pub operator: Address,
    pub from: Address,
    pub to: Address,
    #[serde(with = "u256_decimal")]
    pub token_id: U256,
    #[serde(with = "u256_decimal")]
    pub value: U256,
    pub standard: TokenStandard,
}

/// A single NFT movement produced by the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NftTransfer {
    Erc721(Transfer721),
    Erc1155(Transfer1155),
}
