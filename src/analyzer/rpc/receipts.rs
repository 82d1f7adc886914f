use alloy_consensus::Eip658Value;
use alloy_network::AnyTransactionReceipt;
use alloy_rpc_types_eth::Log;

use crate::models::datasets::logs::RawLog;
use crate::models::datasets::transactions::{RpcTransactionReceiptData, TransactionStatus};
use crate::models::errors::ReceiptError;

pub trait ReceiptParser {
    fn parse_transaction_receipt(self) -> Result<RpcTransactionReceiptData, ReceiptError>;
}

impl ReceiptParser for AnyTransactionReceipt {
    fn parse_transaction_receipt(self) -> Result<RpcTransactionReceiptData, ReceiptError> {
        // Access the inner ReceiptWithBloom through the AnyReceiptEnvelope
        let receipt_with_bloom = &self.inner.inner.inner;

        let status = match receipt_with_bloom.receipt.status {
            Eip658Value::Eip658(true) => TransactionStatus::Success,
            Eip658Value::Eip658(false) => TransactionStatus::Failed,
            Eip658Value::PostState(_) => TransactionStatus::Unknown,
        };

        let block_number = self.inner.block_number.ok_or_else(|| ReceiptError::MissingField {
            field: "blockNumber".to_string(),
        })?;

        let logs = receipt_with_bloom
            .receipt
            .logs
            .iter()
            .enumerate()
            .map(|(position, log)| parse_log(log, position))
            .collect();

        Ok(RpcTransactionReceiptData {
            tx_hash: self.inner.transaction_hash,
            block_number,
            status,
            from: self.inner.from,
            to: self.inner.to,
            contract_address: self.inner.contract_address,
            gas_used: self.inner.gas_used,
            effective_gas_price: self.inner.effective_gas_price,
            logs,
        })
    }
}

// Falls back to the receipt position when the node omits logIndex
fn parse_log(log: &Log, position: usize) -> RawLog {
    RawLog {
        address: log.inner.address,
        topics: log.inner.data.topics().to_vec(),
        data: log.inner.data.data.clone(),
        log_index: log.log_index.unwrap_or(position as u64),
    }
}
