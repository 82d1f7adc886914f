use crate::analyzer::signatures::{self, EventKind};
use crate::models::datasets::logs::{DecodedEvent, DecodedFields, TokenStandard};
use crate::models::datasets::transfers::{NftTransfer, Transfer721, Transfer1155};

// Transfer/Approval carry tokenId as a third indexed topic only on ERC-721
const ERC721_INDEXED_TOPICS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub standard: TokenStandard,
    pub transfers: Vec<NftTransfer>,
}

impl Classification {
    fn label(standard: TokenStandard) -> Self {
        Self {
            standard,
            transfers: Vec::new(),
        }
    }
}

/// Resolve the token standard of a decoded event and expand it into NFT
/// transfers. Undecodable events keep their registry label and yield nothing.
pub fn classify(event: &DecodedEvent) -> Classification {
    let Some(fields) = event.parsed.fields() else {
        return Classification::label(fallback_standard(event));
    };

    match fields {
        DecodedFields::Transfer { from, to, amount } => {
            if owner_pair_standard(event) == TokenStandard::Erc721 {
                Classification {
                    standard: TokenStandard::Erc721,
                    transfers: vec![NftTransfer::Erc721(Transfer721 {
                        log_index: event.log_index,
                        contract: event.address,
                        from: *from,
                        to: *to,
                        token_id: *amount,
                        standard: TokenStandard::Erc721,
                    })],
                }
            } else {
                Classification::label(TokenStandard::Erc20)
            }
        }
        DecodedFields::Approval { .. } => Classification::label(owner_pair_standard(event)),
        // Identical shape on ERC-721 and ERC-1155 contracts
        DecodedFields::ApprovalForAll { .. } => Classification::label(TokenStandard::Unknown),
        DecodedFields::TransferSingle {
            operator,
            from,
            to,
            id,
            value,
        } => Classification {
            standard: TokenStandard::Erc1155,
            transfers: vec![NftTransfer::Erc1155(Transfer1155 {
                log_index: event.log_index,
                contract: event.address,
                operator: *operator,
                from: *from,
                to: *to,
                token_id: *id,
                value: *value,
                standard: TokenStandard::Erc1155,
            })],
        },
        DecodedFields::TransferBatch {
            operator,
            from,
            to,
            ids,
            values,
        } => Classification {
            standard: TokenStandard::Erc1155,
            transfers: ids
                .iter()
                .zip(values)
                .map(|(id, value)| {
                    NftTransfer::Erc1155(Transfer1155 {
                        log_index: event.log_index,
                        contract: event.address,
                        operator: *operator,
                        from: *from,
                        to: *to,
                        token_id: *id,
                        value: *value,
                        standard: TokenStandard::Erc1155,
                    })
                })
                .collect(),
        },
    }
}

fn owner_pair_standard(event: &DecodedEvent) -> TokenStandard {
    if event.indexed_topics == ERC721_INDEXED_TOPICS {
        TokenStandard::Erc721
    } else {
        TokenStandard::Erc20
    }
}

// The topic count alone settles ERC-20 vs ERC-721 for Transfer/Approval, even
// when an argument failed to decode
fn fallback_standard(event: &DecodedEvent) -> TokenStandard {
    match lookup_event_kind(&event.event_type) {
        Some(EventKind::Transfer | EventKind::Approval) => owner_pair_standard(event),
        _ => event.standard,
    }
}

fn lookup_event_kind(event_type: &str) -> Option<EventKind> {
    signatures::known_signatures()
        .find(|signature| signature.event_type == event_type)
        .map(|signature| signature.kind)
}
