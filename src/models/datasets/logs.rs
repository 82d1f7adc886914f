use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::utils::{u256_decimal, u256_decimal_vec};

////////////////////////////////////// RPC Data ////////////////////////////////////////
// A log exactly as emitted in the receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub log_index: u64,
}

impl RawLog {
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }

    /// Number of topics after the event signature.
    pub fn indexed_topic_count(&self) -> usize {
        self.topics.len().saturating_sub(1)
    }
}

/////////////////////////////////// Decoded Data ///////////////////////////////////////
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenStandard {
    #[serde(rename = "ERC-20")]
    Erc20,
    #[serde(rename = "ERC-721")]
    Erc721,
    #[serde(rename = "ERC-1155")]
    Erc1155,
    Unknown,
}

impl TokenStandard {
    pub fn is_nft(&self) -> bool {
        matches!(self, TokenStandard::Erc721 | TokenStandard::Erc1155)
    }
}

// Typed arguments of a recognized event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DecodedFields {
    // `amount` is the ERC-20 value or the ERC-721 token id, depending on
    // whether it came from the data payload or the third topic
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "u256_decimal")]
        amount: U256,
    },
    Approval {
        owner: Address,
        spender: Address,
        #[serde(with = "u256_decimal")]
        amount: U256,
    },
    ApprovalForAll {
        owner: Address,
        operator: Address,
        approved: bool,
    },
    TransferSingle {
        operator: Address,
        from: Address,
        to: Address,
        #[serde(with = "u256_decimal")]
        id: U256,
        #[serde(with = "u256_decimal")]
        value: U256,
    },
    TransferBatch {
        operator: Address,
        from: Address,
        to: Address,
        #[serde(with = "u256_decimal_vec")]
        ids: Vec<U256>,
        #[serde(with = "u256_decimal_vec")]
        values: Vec<U256>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Parsed {
    Decoded(DecodedFields),
    Error { error: String },
}

impl Parsed {
    pub fn fields(&self) -> Option<&DecodedFields> {
        match self {
            Parsed::Decoded(fields) => Some(fields),
            Parsed::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Parsed::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedEvent {
    pub log_index: u64,
    pub address: Address,
    pub event_type: String,
    pub standard: TokenStandard,
    pub indexed_topics: usize,
    pub parsed: Parsed,
}
