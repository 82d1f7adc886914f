use alloy_primitives::{Address, U256, utils::format_ether};
use chrono::DateTime;
use indexmap::IndexSet;
use std::collections::BTreeMap;

use crate::analyzer::transformations::classify::Classification;
use crate::models::common::Chain;
use crate::models::datasets::logs::DecodedEvent;
use crate::models::datasets::transactions::{
    NftAnalysis, NftTransactionData, RpcTransactionReceiptData,
};
use crate::models::datasets::transfers::{NftTransfer, Transfer721, Transfer1155};

/// Accumulates classified events for one transaction. Events must be
/// recorded in ascending `logIndex` order.
#[derive(Debug, Default)]
pub struct TransferAggregator {
    all_events: Vec<DecodedEvent>,
    nft_transfers: Vec<Transfer721>,
    erc1155_transfers: Vec<Transfer1155>,
    // First-seen order keeps the output stable across runs
    contract_addresses: IndexSet<Address>,
}

impl TransferAggregator {
    pub fn with_capacity(events: usize) -> Self {
        Self {
            all_events: Vec::with_capacity(events),
            ..Self::default()
        }
    }

    pub fn record(&mut self, mut event: DecodedEvent, classification: Classification) {
        event.standard = classification.standard;

        if classification.standard.is_nft() {
            self.contract_addresses.insert(event.address);
        }

        for transfer in classification.transfers {
            match transfer {
                NftTransfer::Erc721(transfer) => self.nft_transfers.push(transfer),
                NftTransfer::Erc1155(transfer) => self.erc1155_transfers.push(transfer),
            }
        }

        self.all_events.push(event);
    }

    pub fn finish(
        self,
        chain: Chain,
        receipt: &RpcTransactionReceiptData,
        timestamp: u64,
    ) -> NftTransactionData {
        let mut events_summary = BTreeMap::new();
        for event in &self.all_events {
            *events_summary.entry(event.event_type.clone()).or_insert(0) += 1;
        }

        let nft_analysis = NftAnalysis {
            total_nft_events: self.nft_transfers.len() + self.erc1155_transfers.len(),
            erc721_transfers: self.nft_transfers.len(),
            erc1155_transfers: self.erc1155_transfers.len(),
            nft_contracts: self.contract_addresses.len(),
            contract_addresses: self.contract_addresses,
        };

        let fee_wei = U256::from(receipt.gas_used) * U256::from(receipt.effective_gas_price);
        let fee_native = format_ether(fee_wei);

        NftTransactionData {
            transaction_hash: receipt.tx_hash,
            chain_id: chain.chain_id(),
            block_number: receipt.block_number,
            block_time: i64::try_from(timestamp)
                .ok()
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            gas_used: receipt.gas_used,
            gas_price: receipt.effective_gas_price,
            // format_ether always yields a plain decimal
            transaction_fee: fee_native.parse().unwrap_or_default(),
            transaction_fee_wei: fee_wei,
            transaction_fee_native: fee_native,
            status: receipt.status,
            from: receipt.from,
            to: receipt.to,
            contract_address: receipt.contract_address,
            nft_analysis,
            nft_transfers: self.nft_transfers,
            erc1155_transfers: self.erc1155_transfers,
            all_events: self.all_events,
            events_summary,
            network: chain.name().to_string(),
            explorer: chain.explorer_tx_url(&receipt.tx_hash),
            timestamp,
        }
    }
}
