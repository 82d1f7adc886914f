use alloy_primitives::B256;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::datasets::transactions::NftTransactionData;

/// Finalized analyses keyed by transaction hash. The least recently used
/// entry is evicted once `capacity` is reached.
pub struct AnalysisCache {
    entries: RwLock<LruCache<B256, Arc<NftTransactionData>>>,
}

impl AnalysisCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    // Write lock: a hit refreshes the entry's recency
    pub async fn get(&self, tx_hash: &B256) -> Option<Arc<NftTransactionData>> {
        self.entries.write().await.get(tx_hash).cloned()
    }

    pub async fn insert(&self, data: Arc<NftTransactionData>) {
        self.entries.write().await.put(data.transaction_hash, data);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// A block is treated as final once `confirmations` blocks (itself included)
/// sit at or below the chain tip. A zero threshold accepts any block, even
/// one reported ahead of a lagging node's tip.
pub fn is_final(block_number: u64, latest_block: u64, confirmations: u64) -> bool {
    if confirmations == 0 {
        return true;
    }
    latest_block >= block_number && latest_block - block_number + 1 >= confirmations
}
