use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{
    SolType,
    sol_data::{Array, Bool, Uint},
};

use crate::analyzer::signatures::{self, EventKind, EventSignature};
use crate::models::datasets::logs::{DecodedEvent, DecodedFields, Parsed, RawLog};
use crate::models::errors::LogDecodeError;

type AmountPayload = Uint<256>;
type SinglePayload = (Uint<256>, Uint<256>);
type BatchPayload = (Array<Uint<256>>, Array<Uint<256>>);

pub trait LogDecoder {
    /// Decode every log in ascending `logIndex` order. Always yields one
    /// event per log.
    fn decode_logs(self) -> Vec<DecodedEvent>;
}

impl LogDecoder for Vec<RawLog> {
    fn decode_logs(mut self) -> Vec<DecodedEvent> {
        self.sort_by_key(|log| log.log_index);
        self.iter()
            .map(|log| decode(log, signatures::lookup_topic(log.topic0())))
            .collect()
    }
}

/// Decode one log against its registry entry. Failures are reported in
/// `parsed`, never returned.
pub fn decode(raw: &RawLog, signature: &EventSignature) -> DecodedEvent {
    let parsed = match decode_fields(raw, signature) {
        Ok(fields) => Parsed::Decoded(fields),
        Err(e) => Parsed::Error {
            error: e.to_string(),
        },
    };

    DecodedEvent {
        log_index: raw.log_index,
        address: raw.address,
        event_type: signature.event_type.to_string(),
        standard: signature.standard,
        indexed_topics: raw.indexed_topic_count(),
        parsed,
    }
}

fn decode_fields(
    raw: &RawLog,
    signature: &EventSignature,
) -> Result<DecodedFields, LogDecodeError> {
    let indexed = raw.topics.get(1..).unwrap_or_default();

    match signature.kind {
        EventKind::Unknown => Err(LogDecodeError::UnrecognizedSignature),
        EventKind::Transfer => {
            let (from, to, amount) = decode_owner_pair(signature, indexed, raw)?;
            Ok(DecodedFields::Transfer { from, to, amount })
        }
        EventKind::Approval => {
            let (owner, spender, amount) = decode_owner_pair(signature, indexed, raw)?;
            Ok(DecodedFields::Approval {
                owner,
                spender,
                amount,
            })
        }
        EventKind::ApprovalForAll => {
            expect_topic_count(signature, indexed, "2")?;
            let approved = Bool::abi_decode(&raw.data).map_err(malformed)?;
            Ok(DecodedFields::ApprovalForAll {
                owner: topic_address(indexed, 0)?,
                operator: topic_address(indexed, 1)?,
                approved,
            })
        }
        EventKind::TransferSingle => {
            expect_topic_count(signature, indexed, "3")?;
            let (id, value) = SinglePayload::abi_decode_params(&raw.data).map_err(malformed)?;
            Ok(DecodedFields::TransferSingle {
                operator: topic_address(indexed, 0)?,
                from: topic_address(indexed, 1)?,
                to: topic_address(indexed, 2)?,
                id,
                value,
            })
        }
        EventKind::TransferBatch => {
            expect_topic_count(signature, indexed, "3")?;
            let (ids, values) = BatchPayload::abi_decode_params(&raw.data).map_err(malformed)?;
            if ids.len() != values.len() {
                return Err(LogDecodeError::ArrayLengthMismatch {
                    ids: ids.len(),
                    values: values.len(),
                });
            }
            Ok(DecodedFields::TransferBatch {
                operator: topic_address(indexed, 0)?,
                from: topic_address(indexed, 1)?,
                to: topic_address(indexed, 2)?,
                ids,
                values,
            })
        }
    }
}

// Transfer and Approval: two indexed addresses, then the amount either as a
// third topic (ERC-721) or in the data payload (ERC-20)
fn decode_owner_pair(
    signature: &EventSignature,
    indexed: &[B256],
    raw: &RawLog,
) -> Result<(Address, Address, U256), LogDecodeError> {
    let amount = match indexed.len() {
        2 => AmountPayload::abi_decode(&raw.data).map_err(malformed)?,
        3 => U256::from_be_bytes(indexed[2].0),
        got => {
            return Err(LogDecodeError::UnexpectedTopicCount {
                event: signature.name,
                expected: "2 or 3",
                got,
            });
        }
    };
    Ok((topic_address(indexed, 0)?, topic_address(indexed, 1)?, amount))
}

fn expect_topic_count(
    signature: &EventSignature,
    indexed: &[B256],
    expected: &'static str,
) -> Result<(), LogDecodeError> {
    if indexed.len() == signature.indexed_field_count {
        Ok(())
    } else {
        Err(LogDecodeError::UnexpectedTopicCount {
            event: signature.name,
            expected,
            got: indexed.len(),
        })
    }
}

fn topic_address(indexed: &[B256], index: usize) -> Result<Address, LogDecodeError> {
    // Reported positions count topic0, matching the on-chain topic numbering
    let position = index + 1;
    let topic = indexed
        .get(index)
        .ok_or(LogDecodeError::InvalidAddressTopic { position })?;
    if topic[..12].iter().any(|byte| *byte != 0) {
        return Err(LogDecodeError::InvalidAddressTopic { position });
    }
    Ok(Address::from_word(*topic))
}

fn malformed(e: alloy_sol_types::Error) -> LogDecodeError {
    LogDecodeError::MalformedData {
        reason: e.to_string(),
    }
}
