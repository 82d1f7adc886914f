use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::models::errors::ChainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chain_id: u64,
    pub rpc_url: String,
    pub request_timeout_secs: u64,
    // Blocks behind the tip before a result is treated as final and cached
    pub finality_confirmations: u64,
    pub cache: CacheConfig,
    pub server: ServerConfig,
    pub metrics: MetricsConfig,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Ethereum,
    Optimism,
    Polygon,
    Base,
    Arbitrum,
}

impl Chain {
    pub fn from_chain_id(chain_id: u64) -> Result<Self, ChainError> {
        match chain_id {
            1 => Ok(Self::Ethereum),
            10 => Ok(Self::Optimism),
            137 => Ok(Self::Polygon),
            8453 => Ok(Self::Base),
            42161 => Ok(Self::Arbitrum),
            _ => Err(ChainError::UnsupportedChainId { chain_id }),
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Ethereum => 1,
            Self::Optimism => 10,
            Self::Polygon => 137,
            Self::Base => 8453,
            Self::Arbitrum => 42161,
        }
    }

    /// Network slug used in API paths and in the `network` output field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Optimism => "optimism",
            Self::Polygon => "polygon",
            Self::Base => "base",
            Self::Arbitrum => "arbitrum",
        }
    }

    fn explorer_base_url(&self) -> &'static str {
        match self {
            Self::Ethereum => "https://etherscan.io",
            Self::Optimism => "https://optimistic.etherscan.io",
            Self::Polygon => "https://polygonscan.com",
            Self::Base => "https://basescan.org",
            Self::Arbitrum => "https://arbiscan.io",
        }
    }

    pub fn explorer_tx_url(&self, tx_hash: &B256) -> String {
        format!("{}/tx/{:#x}", self.explorer_base_url(), tx_hash)
    }
}
