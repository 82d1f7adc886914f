use alloy_primitives::B256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Unsupported chain ID: {chain_id}")]
    UnsupportedChainId { chain_id: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReceiptError {
    #[error("Missing required field in receipt: {field}")]
    MissingField { field: String },
}

/// Faults reported by a chain-data provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider request timed out")]
    Timeout,
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Failures that abort a whole transaction analysis.
///
/// Per-log problems never end up here; they are carried inline as
/// [`LogDecodeError`] text on the affected event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Invalid transaction hash: {0}")]
    InvalidInput(String),
    #[error("Transaction not found: {0}")]
    NotFound(B256),
    #[error("Provider timed out after {timeout_secs}s")]
    ProviderTimeout { timeout_secs: u64 },
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl AnalysisError {
    /// Only provider-layer faults are worth retrying. Bad input and missing
    /// transactions will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::ProviderTimeout { .. } | AnalysisError::ProviderUnavailable(_)
        )
    }

    /// Stable identifier used in API error bodies and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::InvalidInput(_) => "invalidInput",
            AnalysisError::NotFound(_) => "notFound",
            AnalysisError::ProviderTimeout { .. } => "providerTimeout",
            AnalysisError::ProviderUnavailable(_) => "providerUnavailable",
        }
    }
}

impl From<ReceiptError> for AnalysisError {
    fn from(err: ReceiptError) -> Self {
        AnalysisError::ProviderUnavailable(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogDecodeError {
    #[error("unrecognized signature")]
    UnrecognizedSignature,
    #[error("{event}: expected {expected} indexed topics, got {got}")]
    UnexpectedTopicCount {
        event: &'static str,
        expected: &'static str,
        got: usize,
    },
    #[error("topic {position} is not a left-padded address")]
    InvalidAddressTopic { position: usize },
    #[error("malformed data: {reason}")]
    MalformedData { reason: String },
    #[error("array length mismatch: {ids} ids, {values} values")]
    ArrayLengthMismatch { ids: usize, values: usize },
}
