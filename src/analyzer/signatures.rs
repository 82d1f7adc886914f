//! Known event signatures, keyed by topic0.
//!
//! `Transfer` and `Approval` hash identically for ERC-20 and ERC-721; the
//! entries below carry the ERC-20 shape and the classifier upgrades them to
//! ERC-721 when the third argument is indexed.

use alloy_primitives::B256;
use alloy_sol_types::SolEvent;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::models::datasets::logs::TokenStandard;

mod abi {
    use alloy_sol_types::sol;

    sol! {
        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);
        event ApprovalForAll(address indexed owner, address indexed operator, bool approved);
        event TransferSingle(
            address indexed operator,
            address indexed from,
            address indexed to,
            uint256 id,
            uint256 value
        );
        event TransferBatch(
            address indexed operator,
            address indexed from,
            address indexed to,
            uint256[] ids,
            uint256[] values
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Transfer,
    Approval,
    ApprovalForAll,
    TransferSingle,
    TransferBatch,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSignature {
    pub topic0: B256,
    pub name: &'static str,
    pub event_type: &'static str,
    pub kind: EventKind,
    pub standard: TokenStandard,
    pub indexed_field_count: usize,
}

impl EventSignature {
    pub fn is_unknown(&self) -> bool {
        self.kind == EventKind::Unknown
    }
}

pub static UNKNOWN_SIGNATURE: EventSignature = EventSignature {
    topic0: B256::ZERO,
    name: "unknown",
    event_type: "unknown",
    kind: EventKind::Unknown,
    standard: TokenStandard::Unknown,
    indexed_field_count: 0,
};

static REGISTRY: Lazy<HashMap<B256, EventSignature>> = Lazy::new(|| {
    [
        signature::<abi::Transfer>("transfer", EventKind::Transfer, TokenStandard::Erc20, 2),
        signature::<abi::Approval>("approval", EventKind::Approval, TokenStandard::Erc20, 2),
        signature::<abi::ApprovalForAll>(
            "approvalForAll",
            EventKind::ApprovalForAll,
            TokenStandard::Unknown,
            2,
        ),
        signature::<abi::TransferSingle>(
            "transferSingle",
            EventKind::TransferSingle,
            TokenStandard::Erc1155,
            3,
        ),
        signature::<abi::TransferBatch>(
            "transferBatch",
            EventKind::TransferBatch,
            TokenStandard::Erc1155,
            3,
        ),
    ]
    .into_iter()
    .map(|signature| (signature.topic0, signature))
    .collect()
});

fn signature<E: SolEvent>(
    event_type: &'static str,
    kind: EventKind,
    standard: TokenStandard,
    indexed_field_count: usize,
) -> EventSignature {
    EventSignature {
        topic0: E::SIGNATURE_HASH,
        name: E::SIGNATURE,
        event_type,
        kind,
        standard,
        indexed_field_count,
    }
}

/// Resolve a topic0 hash. Unrecognized hashes map to [`UNKNOWN_SIGNATURE`].
pub fn lookup(topic0: &B256) -> &'static EventSignature {
    REGISTRY.get(topic0).unwrap_or(&UNKNOWN_SIGNATURE)
}

/// Same as [`lookup`], treating anonymous (topic-less) logs as unknown.
pub fn lookup_topic(topic0: Option<&B256>) -> &'static EventSignature {
    topic0.map(lookup).unwrap_or(&UNKNOWN_SIGNATURE)
}

pub fn known_signatures() -> impl Iterator<Item = &'static EventSignature> {
    REGISTRY.values()
}
