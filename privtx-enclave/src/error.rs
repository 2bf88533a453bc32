//! Enclave error types.

use privtx_crypto::CryptoError;
use thiserror::Error;

/// Result type for enclave operations.
pub type EnclaveResult<T> = Result<T, EnclaveError>;

/// Errors that can occur in enclave operations.
#[derive(Debug, Error)]
pub enum EnclaveError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("no private key held for public key {0}")]
    KeyNotFound(String),

    #[error("enclave is stopped")]
    Stopped,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unlock worker failed: {0}")]
    Worker(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
